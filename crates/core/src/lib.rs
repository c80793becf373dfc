//! `invoicer-core` — shared building blocks for the invoice service.
//!
//! Typed identifiers and the error taxonomy every layer reports through.
//! No IO lives here.

pub mod error;
pub mod id;

pub use error::{ServiceError, ServiceResult};
pub use id::{ClientId, InvoiceId, InvoiceItemId, ProductId};

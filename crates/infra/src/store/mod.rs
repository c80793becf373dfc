//! Relational store boundary.
//!
//! `InvoiceStore` hands out transactions; `InvoiceTx` is the typed data-access
//! interface the service runs its lookups and writes through.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInvoiceStore;
pub use postgres::PostgresInvoiceStore;
pub use r#trait::{InvoiceStore, InvoiceTx, NewInvoiceItemRow, NewInvoiceRow, StoreError};

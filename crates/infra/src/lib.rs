//! Infrastructure layer: storage backends, service orchestration, config.

pub mod config;
pub mod invoice_service;
pub mod store;

pub use invoice_service::InvoiceService;

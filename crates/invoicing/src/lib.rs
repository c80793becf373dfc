//! Invoicing domain module.
//!
//! Entities, request/response models, request validation and the totals
//! arithmetic for invoices. Pure logic: no IO, no HTTP, no storage.

pub mod invoice;
pub mod totals;

pub use invoice::{
    Client, CreateInvoice, CreateInvoiceItem, InvoiceHeader, InvoiceItemView, InvoiceSummary, InvoiceView,
    Product,
};
pub use totals::{Totals, line_subtotal};

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

use invoicer_core::{ClientId, InvoiceId, InvoiceItemId, ProductId, ServiceError};
use invoicer_invoicing::{Client, InvoiceHeader, InvoiceItemView, InvoiceSummary, Product};

/// Invoice row ready to be inserted (id assigned by the store).
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceRow {
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client_id: ClientId,
    pub tax: f64,
    pub total: f64,
}

/// Invoice item row ready to be inserted (id assigned by the store).
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItemRow {
    pub invoice_id: InvoiceId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Store operation error.
///
/// These are infrastructure failures. Business outcomes ("client missing",
/// "invoice number taken") are decided by the service from query results,
/// with one exception: `UniqueViolation` surfaces a uniqueness constraint the
/// store itself enforced, which the service turns into a conflict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0}")]
    Database(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        ServiceError::Internal(format!("Database error: {value}"))
    }
}

/// Transactional relational store holding clients, products, invoices and
/// invoice items.
///
/// Every service operation runs inside exactly one transaction obtained from
/// `begin()`. Nothing written through an `InvoiceTx` is observable by other
/// transactions until `commit()` succeeds; dropping a transaction without
/// committing rolls it back. Implementations must provide at least
/// read-committed isolation and must reject a second invoice with the same
/// `invoice_no` with `StoreError::UniqueViolation`.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InvoiceTx>, StoreError>;
}

#[async_trait]
impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn InvoiceTx>, StoreError> {
        (**self).begin().await
    }
}

/// A single open transaction.
#[async_trait]
pub trait InvoiceTx: Send {
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, StoreError>;

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Id of the invoice carrying `invoice_no`, if any.
    async fn find_invoice_by_no(&mut self, invoice_no: &str) -> Result<Option<InvoiceId>, StoreError>;

    async fn invoice_exists(&mut self, id: InvoiceId) -> Result<bool, StoreError>;

    async fn insert_invoice(&mut self, row: &NewInvoiceRow) -> Result<InvoiceId, StoreError>;

    async fn insert_item(&mut self, row: &NewInvoiceItemRow) -> Result<InvoiceItemId, StoreError>;

    /// Invoice columns joined with its client. `None` if the invoice (or its
    /// client) does not exist.
    async fn load_header(&mut self, id: InvoiceId) -> Result<Option<InvoiceHeader>, StoreError>;

    /// Items of an invoice joined with their product's current name, in
    /// insertion order. Items whose product row is gone are not returned.
    async fn load_items(&mut self, id: InvoiceId) -> Result<Vec<InvoiceItemView>, StoreError>;

    /// All invoices joined with their client name, most recently created first.
    async fn list_summaries(&mut self) -> Result<Vec<InvoiceSummary>, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_items(&mut self, id: InvoiceId) -> Result<u64, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

//! Invoice service: the four operations exposed over HTTP.
//!
//! Each operation runs in exactly one store transaction:
//!
//! ```text
//! create: validate → client exists? → invoice_no free? → price each item
//!         → insert invoice + items → read back → commit
//! list:   summaries (newest first)
//! get:    header + items → recompute subtotal / tax
//! delete: exists? → delete items → delete invoice → commit
//! ```
//!
//! Any early return drops the open transaction, which rolls it back, so a
//! failed create or delete never leaves partial rows behind. Store failures
//! are not retried.

use tracing::{info, instrument};

use invoicer_core::{InvoiceId, ServiceError, ServiceResult};
use invoicer_invoicing::{CreateInvoice, InvoiceSummary, InvoiceView, Totals};

use crate::store::{InvoiceStore, InvoiceTx, NewInvoiceItemRow, NewInvoiceRow, StoreError};

fn invoice_not_found() -> ServiceError {
    ServiceError::not_found("Invoice not found")
}

fn duplicate_invoice_no(invoice_no: &str) -> ServiceError {
    ServiceError::conflict(format!("Invoice number {invoice_no} already exists"))
}

/// Invoice operations over any transactional `InvoiceStore`.
#[derive(Debug, Clone)]
pub struct InvoiceService<S> {
    store: S,
}

impl<S> InvoiceService<S>
where
    S: InvoiceStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create an invoice and its items atomically.
    ///
    /// Checks run in a fixed order and the first failure wins: client,
    /// invoice number, then each item's product in input order. Unit prices
    /// are copied from the products as they are at this moment.
    #[instrument(
        skip(self, req),
        fields(invoice_no = %req.invoice_no, client_id = %req.client_id, items = req.items.len())
    )]
    pub async fn create(&self, req: CreateInvoice) -> ServiceResult<InvoiceView> {
        req.validate()?;

        let mut tx = self.store.begin().await?;

        if tx.find_client(req.client_id).await?.is_none() {
            return Err(ServiceError::not_found(format!(
                "Client with id {} not found",
                req.client_id
            )));
        }

        if tx.find_invoice_by_no(&req.invoice_no).await?.is_some() {
            return Err(duplicate_invoice_no(&req.invoice_no));
        }

        let mut priced = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let product = tx.find_product(item.product_id).await?.ok_or_else(|| {
                ServiceError::not_found(format!("Product with id {} not found", item.product_id))
            })?;
            priced.push((item.product_id, item.quantity, product.price));
        }

        let totals = Totals::from_lines(priced.iter().map(|&(_, q, price)| (price, q)), req.tax);
        if !totals.is_finite() {
            return Err(ServiceError::validation(
                "invoice amounts are too large to be represented",
            ));
        }

        let invoice_id = tx
            .insert_invoice(&NewInvoiceRow {
                invoice_no: req.invoice_no.clone(),
                issue_date: req.issue_date,
                due_date: req.due_date,
                client_id: req.client_id,
                tax: req.tax,
                total: totals.total,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => duplicate_invoice_no(&req.invoice_no),
                other => other.into(),
            })?;

        for (product_id, quantity, unit_price) in priced {
            tx.insert_item(&NewInvoiceItemRow {
                invoice_id,
                product_id,
                quantity,
                unit_price,
            })
            .await?;
        }

        let view = load_view(tx.as_mut(), invoice_id).await?.ok_or_else(|| {
            ServiceError::internal(format!(
                "invoice {invoice_id} was inserted but could not be read back"
            ))
        })?;

        tx.commit().await?;

        info!(invoice_id = %view.id, total = view.total, "invoice created");
        Ok(view)
    }

    /// All invoices, most recently created first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> ServiceResult<Vec<InvoiceSummary>> {
        let mut tx = self.store.begin().await?;
        let summaries = tx.list_summaries().await?;
        tx.commit().await?;
        Ok(summaries)
    }

    /// One invoice with client and items joined in.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn get(&self, id: InvoiceId) -> ServiceResult<InvoiceView> {
        let mut tx = self.store.begin().await?;
        let view = load_view(tx.as_mut(), id).await?.ok_or_else(invoice_not_found)?;
        tx.commit().await?;
        Ok(view)
    }

    /// Delete an invoice and all of its items atomically.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn delete(&self, id: InvoiceId) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;

        if !tx.invoice_exists(id).await? {
            return Err(invoice_not_found());
        }

        let items = tx.delete_items(id).await?;
        tx.delete_invoice(id).await?;
        tx.commit().await?;

        info!(invoice_id = %id, items, "invoice deleted");
        Ok(())
    }
}

async fn load_view(tx: &mut dyn InvoiceTx, id: InvoiceId) -> Result<Option<InvoiceView>, StoreError> {
    let Some(header) = tx.load_header(id).await? else {
        return Ok(None);
    };
    let items = tx.load_items(id).await?;
    Ok(Some(InvoiceView::assemble(header, items)))
}

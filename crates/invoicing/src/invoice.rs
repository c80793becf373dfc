use chrono::NaiveDate;
use serde::Serialize;

use invoicer_core::{ClientId, InvoiceId, InvoiceItemId, ProductId, ServiceError, ServiceResult};

use crate::totals::{Totals, line_subtotal};

/// Client row (read-only from the invoice service's point of view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub address: String,
    pub company_registration_no: String,
}

/// Product row (read-only from the invoice service's point of view).
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
}

/// One requested line of a new invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoiceItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Request to create an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInvoice {
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client_id: ClientId,
    pub items: Vec<CreateInvoiceItem>,
    /// Tax percentage, e.g. `10.0` for 10%.
    pub tax: f64,
}

impl CreateInvoice {
    /// Field-level checks that need no store access.
    pub fn validate(&self) -> ServiceResult<()> {
        if !self.tax.is_finite() || self.tax < 0.0 {
            return Err(ServiceError::validation(
                "tax must be greater than or equal to 0",
            ));
        }

        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(ServiceError::validation(format!(
                    "items[{idx}].quantity must be greater than 0"
                )));
            }
        }

        Ok(())
    }
}

/// Invoice line as returned to callers.
///
/// `unit_price` is the price captured when the invoice was created;
/// `product_name` is the product's current name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceItemView {
    pub id: InvoiceItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub subtotal: f64,
}

impl InvoiceItemView {
    pub fn new(
        id: InvoiceItemId,
        product_id: ProductId,
        product_name: String,
        quantity: i32,
        unit_price: f64,
    ) -> Self {
        Self {
            id,
            product_id,
            product_name,
            quantity,
            unit_price,
            subtotal: line_subtotal(unit_price, quantity),
        }
    }
}

/// Full invoice with the client and items joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceView {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client: Client,
    pub items: Vec<InvoiceItemView>,
    pub tax: f64,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Stored invoice columns, before the items are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceHeader {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client: Client,
    pub tax: f64,
    pub total: f64,
}

impl InvoiceView {
    /// Build the view from stored rows.
    ///
    /// `subtotal` and `tax_amount` are recomputed from the items and the
    /// stored tax rate. `total` is the stored column and is not reconciled
    /// against the recomputation.
    pub fn assemble(header: InvoiceHeader, items: Vec<InvoiceItemView>) -> Self {
        let totals = Totals::from_lines(
            items.iter().map(|i| (i.unit_price, i.quantity)),
            header.tax,
        );

        Self {
            id: header.id,
            invoice_no: header.invoice_no,
            issue_date: header.issue_date,
            due_date: header.due_date,
            client: header.client,
            items,
            tax: header.tax,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total: header.total,
        }
    }
}

/// Row of the invoice listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSummary {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client_name: String,
    pub total: f64,
}

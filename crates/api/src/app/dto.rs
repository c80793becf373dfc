use chrono::NaiveDate;
use serde::Deserialize;

use invoicer_core::{ClientId, ProductId};
use invoicer_invoicing::{CreateInvoice, CreateInvoiceItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct InvoiceItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub invoice_no: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub client_id: i64,
    pub items: Vec<InvoiceItemRequest>,
    /// Tax percentage, e.g. `10` for 10%.
    pub tax: f64,
}

impl CreateInvoiceRequest {
    pub fn into_command(self) -> CreateInvoice {
        CreateInvoice {
            invoice_no: self.invoice_no,
            issue_date: self.issue_date,
            due_date: self.due_date,
            client_id: ClientId::new(self.client_id),
            items: self
                .items
                .into_iter()
                .map(|i| CreateInvoiceItem {
                    product_id: ProductId::new(i.product_id),
                    quantity: i.quantity,
                })
                .collect(),
            tax: self.tax,
        }
    }
}

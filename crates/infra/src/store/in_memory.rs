use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use invoicer_core::{ClientId, InvoiceId, InvoiceItemId, ProductId};
use invoicer_invoicing::{Client, InvoiceHeader, InvoiceItemView, InvoiceSummary, Product};

use super::r#trait::{InvoiceStore, InvoiceTx, NewInvoiceItemRow, NewInvoiceRow, StoreError};

#[derive(Debug, Clone)]
struct InvoiceRow {
    id: InvoiceId,
    invoice_no: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    client_id: ClientId,
    tax: f64,
    total: f64,
    /// Logical creation clock; stands in for a `created_at` column.
    created_seq: u64,
}

#[derive(Debug, Clone)]
struct ItemRow {
    id: InvoiceItemId,
    invoice_id: InvoiceId,
    product_id: ProductId,
    quantity: i32,
    unit_price: f64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    clients: BTreeMap<ClientId, Client>,
    products: BTreeMap<ProductId, Product>,
    invoices: BTreeMap<InvoiceId, InvoiceRow>,
    items: BTreeMap<InvoiceItemId, ItemRow>,

    last_client_id: i64,
    last_product_id: i64,
    last_invoice_id: i64,
    last_item_id: i64,
    last_seq: u64,
}

fn bump(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory relational store for tests/dev.
///
/// Transactions are serializable: `begin()` takes the table lock for the
/// lifetime of the transaction and works on a private copy of the tables.
/// `commit()` publishes the copy; dropping the transaction discards it.
/// Not optimized for performance.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInvoiceStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a client row.
    pub async fn add_client(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
        company_registration_no: impl Into<String>,
    ) -> Client {
        let mut tables = self.tables.lock().await;
        let id = ClientId::new(bump(&mut tables.last_client_id));
        let client = Client {
            id,
            name: name.into(),
            address: address.into(),
            company_registration_no: company_registration_no.into(),
        };
        tables.clients.insert(id, client.clone());
        client
    }

    /// Seed a product row.
    pub async fn add_product(&self, name: impl Into<String>, price: f64) -> Product {
        let mut tables = self.tables.lock().await;
        let id = ProductId::new(bump(&mut tables.last_product_id));
        let product = Product {
            id,
            name: name.into(),
            price,
        };
        tables.products.insert(id, product.clone());
        product
    }

    /// Change a product's name and price in place. Returns `false` if the
    /// product does not exist.
    pub async fn update_product(&self, id: ProductId, name: impl Into<String>, price: f64) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(&id) {
            Some(p) => {
                p.name = name.into();
                p.price = price;
                true
            }
            None => false,
        }
    }

    pub async fn remove_product(&self, id: ProductId) -> bool {
        self.tables.lock().await.products.remove(&id).is_some()
    }

    pub async fn remove_client(&self, id: ClientId) -> bool {
        self.tables.lock().await.clients.remove(&id).is_some()
    }

    pub async fn invoice_count(&self) -> usize {
        self.tables.lock().await.invoices.len()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn begin(&self) -> Result<Box<dyn InvoiceTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryInvoiceTx { guard, working }))
    }
}

/// Open transaction over an `InMemoryInvoiceStore`.
pub struct InMemoryInvoiceTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl InvoiceTx for InMemoryInvoiceTx {
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.working.clients.get(&id).cloned())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn find_invoice_by_no(&mut self, invoice_no: &str) -> Result<Option<InvoiceId>, StoreError> {
        Ok(self
            .working
            .invoices
            .values()
            .find(|r| r.invoice_no == invoice_no)
            .map(|r| r.id))
    }

    async fn invoice_exists(&mut self, id: InvoiceId) -> Result<bool, StoreError> {
        Ok(self.working.invoices.contains_key(&id))
    }

    async fn insert_invoice(&mut self, row: &NewInvoiceRow) -> Result<InvoiceId, StoreError> {
        let t = &mut self.working;
        if t.invoices.values().any(|r| r.invoice_no == row.invoice_no) {
            return Err(StoreError::UniqueViolation(format!(
                "invoices.invoice_no = {}",
                row.invoice_no
            )));
        }
        if !t.clients.contains_key(&row.client_id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: invoices.client_id = {}",
                row.client_id
            )));
        }

        let id = InvoiceId::new(bump(&mut t.last_invoice_id));
        t.last_seq += 1;
        t.invoices.insert(
            id,
            InvoiceRow {
                id,
                invoice_no: row.invoice_no.clone(),
                issue_date: row.issue_date,
                due_date: row.due_date,
                client_id: row.client_id,
                tax: row.tax,
                total: row.total,
                created_seq: t.last_seq,
            },
        );
        Ok(id)
    }

    async fn insert_item(&mut self, row: &NewInvoiceItemRow) -> Result<InvoiceItemId, StoreError> {
        let t = &mut self.working;
        if !t.invoices.contains_key(&row.invoice_id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: invoice_items.invoice_id = {}",
                row.invoice_id
            )));
        }
        if !t.products.contains_key(&row.product_id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: invoice_items.product_id = {}",
                row.product_id
            )));
        }

        let id = InvoiceItemId::new(bump(&mut t.last_item_id));
        t.items.insert(
            id,
            ItemRow {
                id,
                invoice_id: row.invoice_id,
                product_id: row.product_id,
                quantity: row.quantity,
                unit_price: row.unit_price,
            },
        );
        Ok(id)
    }

    async fn load_header(&mut self, id: InvoiceId) -> Result<Option<InvoiceHeader>, StoreError> {
        let t = &self.working;
        let Some(row) = t.invoices.get(&id) else {
            return Ok(None);
        };
        let Some(client) = t.clients.get(&row.client_id) else {
            return Ok(None);
        };

        Ok(Some(InvoiceHeader {
            id: row.id,
            invoice_no: row.invoice_no.clone(),
            issue_date: row.issue_date,
            due_date: row.due_date,
            client: client.clone(),
            tax: row.tax,
            total: row.total,
        }))
    }

    async fn load_items(&mut self, id: InvoiceId) -> Result<Vec<InvoiceItemView>, StoreError> {
        let t = &self.working;
        Ok(t.items
            .values()
            .filter(|i| i.invoice_id == id)
            .filter_map(|i| {
                let product = t.products.get(&i.product_id)?;
                Some(InvoiceItemView::new(
                    i.id,
                    i.product_id,
                    product.name.clone(),
                    i.quantity,
                    i.unit_price,
                ))
            })
            .collect())
    }

    async fn list_summaries(&mut self) -> Result<Vec<InvoiceSummary>, StoreError> {
        let t = &self.working;
        let mut rows: Vec<&InvoiceRow> = t.invoices.values().collect();
        rows.sort_by(|a, b| b.created_seq.cmp(&a.created_seq));

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let client = t.clients.get(&r.client_id)?;
                Some(InvoiceSummary {
                    id: r.id,
                    invoice_no: r.invoice_no.clone(),
                    issue_date: r.issue_date,
                    due_date: r.due_date,
                    client_name: client.name.clone(),
                    total: r.total,
                })
            })
            .collect())
    }

    async fn delete_items(&mut self, id: InvoiceId) -> Result<u64, StoreError> {
        let before = self.working.items.len();
        self.working.items.retain(|_, i| i.invoice_id != id);
        Ok((before - self.working.items.len()) as u64)
    }

    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<u64, StoreError> {
        if self.working.items.values().any(|i| i.invoice_id == id) {
            return Err(StoreError::Database(format!(
                "foreign key violation: invoice_items still reference invoice {id}"
            )));
        }
        Ok(u64::from(self.working.invoices.remove(&id).is_some()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryInvoiceTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

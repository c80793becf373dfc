//! Postgres-backed invoice store.
//!
//! Expects the tables described in `schema.sql` at the crate root. All
//! statements are parameterized and run on the `sqlx::Transaction` owned by a
//! `PostgresInvoiceTx`; sqlx rolls the transaction back when it is dropped
//! without `commit()`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|-----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | any other | `Database` |
//! | PoolClosed / PoolTimedOut / Io / other | N/A | `Database` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;

use invoicer_core::{ClientId, InvoiceId, InvoiceItemId, ProductId};
use invoicer_invoicing::{Client, InvoiceHeader, InvoiceItemView, InvoiceSummary, Product};

use super::r#trait::{InvoiceStore, InvoiceTx, NewInvoiceItemRow, NewInvoiceRow, StoreError};

/// Postgres-backed invoice store.
///
/// Cheap to clone; the pool is reference-counted internally.
#[derive(Debug, Clone)]
pub struct PostgresInvoiceStore {
    pool: PgPool,
}

impl PostgresInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl InvoiceStore for PostgresInvoiceStore {
    async fn begin(&self) -> Result<Box<dyn InvoiceTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresInvoiceTx { tx }))
    }
}

/// Open transaction over a `PostgresInvoiceStore`.
pub struct PostgresInvoiceTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(Debug, FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    address: String,
    company_registration_no: String,
}

impl From<ClientRow> for Client {
    fn from(r: ClientRow) -> Self {
        Client {
            id: ClientId::new(r.id),
            name: r.name,
            address: r.address,
            company_registration_no: r.company_registration_no,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: f64,
}

#[derive(Debug, FromRow)]
struct HeaderRow {
    id: i64,
    invoice_no: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    tax: f64,
    total: f64,
    client_id: i64,
    client_name: String,
    client_address: String,
    client_registration_no: String,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: f64,
    product_name: String,
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    invoice_no: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    total: f64,
    client_name: String,
}

#[async_trait]
impl InvoiceTx for PostgresInvoiceTx {
    #[instrument(skip(self), fields(client_id = %id), err)]
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let row: Option<ClientRow> = sqlx::query_as(
            r#"
            SELECT id, name, address, company_registration_no
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_client", e))?;

        Ok(row.map(Client::from))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, price
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product", e))?;

        Ok(row.map(|r| Product {
            id: ProductId::new(r.id),
            name: r.name,
            price: r.price,
        }))
    }

    #[instrument(skip(self), err)]
    async fn find_invoice_by_no(&mut self, invoice_no: &str) -> Result<Option<InvoiceId>, StoreError> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM invoices WHERE invoice_no = $1")
            .bind(invoice_no)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_invoice_by_no", e))?;

        Ok(id.map(InvoiceId::new))
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn invoice_exists(&mut self, id: InvoiceId) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM invoices WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("invoice_exists", e))?;

        Ok(found.is_some())
    }

    #[instrument(skip(self, row), fields(invoice_no = %row.invoice_no), err)]
    async fn insert_invoice(&mut self, row: &NewInvoiceRow) -> Result<InvoiceId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoices (invoice_no, issue_date, due_date, client_id, tax, total)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&row.invoice_no)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(row.client_id.get())
        .bind(row.tax)
        .bind(row.total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        Ok(InvoiceId::new(id))
    }

    #[instrument(skip(self, row), fields(invoice_id = %row.invoice_id, product_id = %row.product_id), err)]
    async fn insert_item(&mut self, row: &NewInvoiceItemRow) -> Result<InvoiceItemId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_items (invoice_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(row.invoice_id.get())
        .bind(row.product_id.get())
        .bind(row.quantity)
        .bind(row.unit_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;

        Ok(InvoiceItemId::new(id))
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn load_header(&mut self, id: InvoiceId) -> Result<Option<InvoiceHeader>, StoreError> {
        let row: Option<HeaderRow> = sqlx::query_as(
            r#"
            SELECT
                i.id,
                i.invoice_no,
                i.issue_date,
                i.due_date,
                i.tax,
                i.total,
                c.id AS client_id,
                c.name AS client_name,
                c.address AS client_address,
                c.company_registration_no AS client_registration_no
            FROM invoices i
            JOIN clients c ON i.client_id = c.id
            WHERE i.id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_header", e))?;

        Ok(row.map(|r| InvoiceHeader {
            id: InvoiceId::new(r.id),
            invoice_no: r.invoice_no,
            issue_date: r.issue_date,
            due_date: r.due_date,
            client: Client {
                id: ClientId::new(r.client_id),
                name: r.client_name,
                address: r.client_address,
                company_registration_no: r.client_registration_no,
            },
            tax: r.tax,
            total: r.total,
        }))
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn load_items(&mut self, id: InvoiceId) -> Result<Vec<InvoiceItemView>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT
                ii.id,
                ii.product_id,
                ii.quantity,
                ii.unit_price,
                p.name AS product_name
            FROM invoice_items ii
            JOIN products p ON ii.product_id = p.id
            WHERE ii.invoice_id = $1
            ORDER BY ii.id ASC
            "#,
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        Ok(rows
            .into_iter()
            .map(|r| {
                InvoiceItemView::new(
                    InvoiceItemId::new(r.id),
                    ProductId::new(r.product_id),
                    r.product_name,
                    r.quantity,
                    r.unit_price,
                )
            })
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn list_summaries(&mut self) -> Result<Vec<InvoiceSummary>, StoreError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT
                i.id,
                i.invoice_no,
                i.issue_date,
                i.due_date,
                i.total,
                c.name AS client_name
            FROM invoices i
            JOIN clients c ON i.client_id = c.id
            ORDER BY i.created_at DESC, i.id DESC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_summaries", e))?;

        Ok(rows
            .into_iter()
            .map(|r| InvoiceSummary {
                id: InvoiceId::new(r.id),
                invoice_no: r.invoice_no,
                issue_date: r.issue_date,
                due_date: r.due_date,
                client_name: r.client_name,
                total: r.total,
            })
            .collect())
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn delete_items(&mut self, id: InvoiceId) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_items", e))?;
        Ok(res.rows_affected())
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;
        Ok(res.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Database(format!("sqlx error in {}: {}", operation, other)),
    }
}

use std::sync::Arc;

use invoicer_infra::{
    InvoiceService,
    config::{AppConfig, StoreBackend},
    store::{InMemoryInvoiceStore, InvoiceStore, PostgresInvoiceStore, StoreError},
};

/// Store handle shared by all requests.
pub type SharedStore = Arc<dyn InvoiceStore>;

/// Services shared by all handlers (installed as an `Extension`).
#[derive(Clone)]
pub struct AppServices {
    invoices: InvoiceService<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            invoices: InvoiceService::new(store),
        }
    }

    pub fn invoices(&self) -> &InvoiceService<SharedStore> {
        &self.invoices
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.store {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => build_persistent_services(database_url, *max_connections).await,
        StoreBackend::InMemory => Ok(build_in_memory_services().await),
    }
}

async fn build_persistent_services(
    database_url: &str,
    max_connections: u32,
) -> Result<AppServices, StoreError> {
    let store = PostgresInvoiceStore::connect(database_url, max_connections).await?;
    tracing::info!(max_connections, "using postgres invoice store");
    Ok(AppServices::new(Arc::new(store)))
}

async fn build_in_memory_services() -> AppServices {
    // In-memory wiring (dev): seed one client and one product so the
    // endpoints are usable without a database.
    let store = InMemoryInvoiceStore::new();
    let client = store.add_client("Acme", "1 Main St", "REG-001").await;
    let product = store.add_product("Widget", 10.0).await;
    tracing::warn!(
        client_id = %client.id,
        product_id = %product.id,
        "USE_PERSISTENT_STORES is not set; using in-memory invoice store with demo data"
    );
    AppServices::new(Arc::new(store))
}

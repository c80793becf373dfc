use std::sync::Arc;

use async_trait::async_trait;
use invoicer_api::app::{build_app, services::AppServices};
use invoicer_core::ClientId;
use invoicer_infra::store::{InMemoryInvoiceStore, InvoiceStore, InvoiceTx, StoreError};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(store: Arc<dyn InvoiceStore>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(AppServices::new(store)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Store whose every transaction fails to open.
struct UnavailableStore;

#[async_trait]
impl InvoiceStore for UnavailableStore {
    async fn begin(&self) -> Result<Box<dyn InvoiceTx>, StoreError> {
        Err(StoreError::Database("connection refused".to_string()))
    }
}

/// Store seeded with client 1 "Acme" and products 1 "Widget" (10.0), 2 "Gadget" (2.5).
async fn seeded_store() -> InMemoryInvoiceStore {
    let store = InMemoryInvoiceStore::new();
    store.add_client("Acme", "1 Main St", "REG-001").await;
    store.add_product("Widget", 10.0).await;
    store.add_product("Gadget", 2.5).await;
    store
}

async fn spawn_seeded() -> (TestServer, InMemoryInvoiceStore) {
    let store = seeded_store().await;
    let srv = TestServer::spawn(Arc::new(store.clone())).await;
    (srv, store)
}

fn invoice_body(invoice_no: &str, client_id: i64, items: serde_json::Value, tax: f64) -> serde_json::Value {
    json!({
        "invoice_no": invoice_no,
        "issue_date": "2024-01-01",
        "due_date": "2024-01-31",
        "client_id": client_id,
        "items": items,
        "tax": tax,
    })
}

async fn post_invoice(
    client: &reqwest::Client,
    srv: &TestServer,
    body: &serde_json::Value,
) -> reqwest::Response {
    client
        .post(srv.url("/invoices"))
        .json(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (srv, _store) = spawn_seeded().await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_returns_full_invoice_with_totals() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 3 }]), 10.0),
    )
    .await;

    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().contains_key("x-request-id"));

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["invoice_no"], "INV-1");
    assert_eq!(body["issue_date"], "2024-01-01");
    assert_eq!(body["due_date"], "2024-01-31");
    assert_eq!(body["client"]["id"], 1);
    assert_eq!(body["client"]["name"], "Acme");
    assert_eq!(body["client"]["address"], "1 Main St");
    assert_eq!(body["client"]["company_registration_no"], "REG-001");
    assert_eq!(body["items"][0]["product_id"], 1);
    assert_eq!(body["items"][0]["product_name"], "Widget");
    assert_eq!(body["items"][0]["quantity"], 3);
    assert_eq!(body["items"][0]["unit_price"], 10.0);
    assert_eq!(body["items"][0]["subtotal"], 30.0);
    assert_eq!(body["tax"], 10.0);
    assert_eq!(body["subtotal"], 30.0);
    assert_eq!(body["tax_amount"], 3.0);
    assert_eq!(body["total"], 33.0);
}

#[tokio::test]
async fn get_returns_what_create_returned() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = post_invoice(
        &client,
        &srv,
        &invoice_body(
            "INV-1",
            1,
            json!([{ "product_id": 1, "quantity": 2 }, { "product_id": 2, "quantity": 5 }]),
            7.5,
        ),
    )
    .await
    .json()
    .await
    .unwrap();

    let id = created["id"].as_i64().unwrap();
    let res = client
        .get(srv.url(&format!("/invoices/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let fetched: serde_json::Value = res.json().await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn unknown_client_is_404_and_nothing_is_written() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 99, json!([{ "product_id": 1, "quantity": 1 }]), 0.0),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "Client with id 99 not found");
    assert_eq!(store.invoice_count().await, 0);
}

#[tokio::test]
async fn duplicate_invoice_no_is_400() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();
    let body = invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 1 }]), 0.0);

    assert_eq!(post_invoice(&client, &srv, &body).await.status(), StatusCode::CREATED);

    let res = post_invoice(&client, &srv, &body).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["message"], "Invoice number INV-1 already exists");
    assert_eq!(store.invoice_count().await, 1);
    assert_eq!(store.item_count().await, 1);
}

#[tokio::test]
async fn unknown_product_is_404_and_nothing_is_written() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body(
            "INV-1",
            1,
            json!([{ "product_id": 1, "quantity": 1 }, { "product_id": 42, "quantity": 1 }]),
            0.0,
        ),
    )
    .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["message"], "Product with id 42 not found");
    assert_eq!(store.invoice_count().await, 0);
    assert_eq!(store.item_count().await, 0);

    let list: serde_json::Value = client
        .get(srv.url("/invoices"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn invalid_quantity_or_tax_is_422() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 0 }]), 0.0),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 1 }]), -5.0),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.invoice_count().await, 0);
}

#[tokio::test]
async fn overflowing_amounts_are_422_and_nothing_is_written() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 2_000_000_000 }]), 1e300),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");
    assert_eq!(store.invoice_count().await, 0);
}

#[tokio::test]
async fn invoice_of_removed_client_is_404_unlisted_and_deletable() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 1 }]), 0.0),
    )
    .await
    .json()
    .await
    .unwrap();
    let id = created["id"].as_i64().unwrap();

    assert!(store.remove_client(ClientId::new(1)).await);

    let res = client.get(srv.url(&format!("/invoices/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let list: serde_json::Value = client
        .get(srv.url("/invoices"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list, json!([]));

    let res = client.delete(srv.url(&format!("/invoices/{id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.invoice_count().await, 0);
}

#[tokio::test]
async fn malformed_body_is_rejected_with_json_error() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = post_invoice(&client, &srv, &json!({ "invoice_no": "INV-1" })).await;
    assert!(res.status().is_client_error());
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_body");
}

#[tokio::test]
async fn list_is_most_recent_first() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    for no in ["A", "B", "C"] {
        let res = post_invoice(
            &client,
            &srv,
            &invoice_body(no, 1, json!([{ "product_id": 2, "quantity": 4 }]), 0.0),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client.get(srv.url("/invoices")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: Vec<serde_json::Value> = res.json().await.unwrap();

    let numbers: Vec<&str> = list.iter().map(|s| s["invoice_no"].as_str().unwrap()).collect();
    assert_eq!(numbers, ["C", "B", "A"]);
    assert_eq!(list[0]["client_name"], "Acme");
    assert_eq!(list[0]["total"], 10.0);
    assert_eq!(list[0]["issue_date"], "2024-01-01");
}

#[tokio::test]
async fn delete_then_get_and_delete_again_are_404() {
    let (srv, store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = post_invoice(
        &client,
        &srv,
        &invoice_body("INV-1", 1, json!([{ "product_id": 1, "quantity": 1 }]), 0.0),
    )
    .await
    .json()
    .await
    .unwrap();
    let url = srv.url(&format!("/invoices/{}", created["id"]));

    let res = client.delete(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.item_count().await, 0);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["message"], "Invoice not found");

    let res = client.delete(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_id_is_400() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/invoices/abc")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_id");
}

#[tokio::test]
async fn store_failure_is_500_with_forwarded_message() {
    let srv = TestServer::spawn(Arc::new(UnavailableStore)).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/invoices")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "internal_error");
    assert_eq!(err["message"], "Database error: connection refused");

    let res = client.delete(srv.url("/invoices/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let (srv, _store) = spawn_seeded().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/invoices"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-42");
}

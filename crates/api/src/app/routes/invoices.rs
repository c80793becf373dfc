use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use invoicer_core::InvoiceId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/:id", get(get_invoice).delete(delete_invoice))
}

fn parse_invoice_id(raw: &str) -> Result<InvoiceId, axum::response::Response> {
    raw.parse::<InvoiceId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateInvoiceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => {
            return errors::json_error(rejection.status(), "invalid_body", rejection.body_text());
        }
    };

    match services.invoices().create(body.into_command()).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_invoices(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.invoices().list().await {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices().get(id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices().delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

//! HTTP API over the shelfcrawl product store.
//!
//! Every write goes through [`shelfcrawl::Catalog`], so records merged here
//! are deduplicated exactly like records merged by the crawler.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use shelfcrawl::{Catalog, Record, RecordStore};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;
/// Largest accepted request body.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared catalog behind every handler.
pub type SharedCatalog<S> = Arc<Mutex<Catalog<S>>>;

/// Build the router with all endpoints.
pub fn router<S: RecordStore + 'static>(catalog: Catalog<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/guardar", post(save_all::<S>))
        .route("/api/agregar", post(append::<S>))
        .route("/api/productos-guardados", get(list::<S>))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(Arc::new(Mutex::new(catalog)))
}

/// Serve `router` on `port` until the process ends.
pub async fn serve(port: u16, router: Router) -> anyhow::Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API listening on http://localhost:{port}");
    axum::serve(listener, router).await?;
    Ok(())
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// Accept only a JSON array of records.
fn parse_records(body: Value) -> Result<Vec<Record>, Response> {
    if !body.is_array() {
        return Err(bad_request("expected an array of products"));
    }
    serde_json::from_value(body).map_err(|e| bad_request(format!("invalid product: {e}")))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/guardar`: replace the whole store.
async fn save_all<S: RecordStore + 'static>(
    State(catalog): State<SharedCatalog<S>>,
    Json(body): Json<Value>,
) -> Response {
    let records = match parse_records(body) {
        Ok(records) => records,
        Err(response) => return response,
    };
    let count = records.len();

    let mut catalog = catalog.lock().await;
    match catalog.replace(records) {
        Ok(()) => {
            tracing::info!(count, "Store replaced");
            Json(json!({ "message": "Products saved", "count": count })).into_response()
        }
        Err(e) => {
            tracing::warn!("Could not write {}, keeping products in memory: {e}", catalog.describe());
            Json(json!({
                "message": "Products kept in memory only; storage is not writable",
                "count": count,
                "warning": "read-only-fs",
            }))
            .into_response()
        }
    }
}

/// `POST /api/agregar`: merge into the store with crawler dedup rules.
async fn append<S: RecordStore + 'static>(
    State(catalog): State<SharedCatalog<S>>,
    Json(body): Json<Value>,
) -> Response {
    let records = match parse_records(body) {
        Ok(records) => records,
        Err(response) => return response,
    };

    let report = catalog.lock().await.merge(records);
    tracing::info!(
        added = report.outcome.added,
        updated = report.outcome.updated,
        "Merged products. Total in store: {}",
        report.total
    );

    let mut response = json!({
        "message": "Products merged",
        "total": report.total,
        "agregados": report.outcome.added,
        "actualizados": report.outcome.updated,
    });
    if !report.persisted {
        response["message"] = json!("Products merged in memory only; storage is not writable");
        response["warning"] = json!("read-only-fs");
    }
    Json(response).into_response()
}

/// `GET /api/productos-guardados`: the current store.
async fn list<S: RecordStore + 'static>(State(catalog): State<SharedCatalog<S>>) -> Json<Vec<Record>> {
    let mut catalog = catalog.lock().await;
    if let Err(e) = catalog.refresh() {
        tracing::warn!("Serving cached products, re-read failed: {e}");
    }
    Json(catalog.records().to_vec())
}

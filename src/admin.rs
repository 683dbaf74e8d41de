//! HTTP transport for the numbering operations.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `GET /health` - `{ "ok": true, "prefix": "REC" }`.
//! - `POST /owners/:owner/allocate` - next number in the current year.
//! - `GET /owners/:owner/diagnosis?year=YYYY` - read-only diagnosis.
//! - `POST /owners/:owner/repair` - renumber every year of the owner.
//! - `POST /owners/:owner/reset?year=YYYY` - zero a counter and renumber.
//!   Requires `x-confirm-reset: <owner>`; anything else is rejected with 412
//!   before any mutation.
//!
//! `year` defaults to the current UTC year.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::allocator::AllocateError;
use crate::lock::ScopeLockManager;
use crate::numbering::Numbering;
use crate::receipt::ScopeKey;
use crate::store::DocumentStore;

/// Header that must repeat the owner id for a reset to proceed.
pub const CONFIRM_RESET_HEADER: &str = "x-confirm-reset";

#[derive(Debug, Default, Deserialize)]
struct ScopeQuery {
    year: Option<i32>,
}

impl ScopeQuery {
    fn scope(&self, owner: String) -> ScopeKey {
        match self.year {
            Some(year) => ScopeKey::new(owner, year),
            None => ScopeKey::current(owner),
        }
    }
}

/// Build an axum `Router` serving the given numbering instance.
pub fn router<S, L>(numbering: Arc<Numbering<S, L>>) -> Router
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<S, L>))
        .route("/owners/:owner/allocate", post(allocate_handler::<S, L>))
        .route("/owners/:owner/diagnosis", get(diagnosis_handler::<S, L>))
        .route("/owners/:owner/repair", post(repair_handler::<S, L>))
        .route("/owners/:owner/reset", post(reset_handler::<S, L>))
        .with_state(numbering)
}

/// Serve over HTTP at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve<S, L>(numbering: Arc<Numbering<S, L>>, addr: &str) -> Result<(), std::io::Error>
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    let app = router(numbering);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "admin surface listening");
    axum::serve(listener, app).await
}

async fn health_handler<S, L>(State(numbering): State<Arc<Numbering<S, L>>>) -> impl IntoResponse
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    Json(json!({ "ok": true, "prefix": numbering.config().prefix }))
}

async fn allocate_handler<S, L>(
    State(numbering): State<Arc<Numbering<S, L>>>,
    Path(owner): Path<String>,
) -> impl IntoResponse
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    match numbering.allocate(&owner) {
        Ok(allocation) => (
            StatusCode::OK,
            Json(json!({
                "receipt_number": allocation.number.to_string(),
                "mode": allocation.mode,
            })),
        )
            .into_response(),
        Err(err) => {
            let status = match err {
                AllocateError::Exhausted(_) => StatusCode::CONFLICT,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn diagnosis_handler<S, L>(
    State(numbering): State<Arc<Numbering<S, L>>>,
    Path(owner): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> impl IntoResponse
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    match numbering.diagnose_scope(&query.scope(owner)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn repair_handler<S, L>(
    State(numbering): State<Arc<Numbering<S, L>>>,
    Path(owner): Path<String>,
) -> impl IntoResponse
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    Json(numbering.repair(&owner))
}

async fn reset_handler<S, L>(
    State(numbering): State<Arc<Numbering<S, L>>>,
    Path(owner): Path<String>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
) -> impl IntoResponse
where
    S: DocumentStore + 'static,
    L: ScopeLockManager + 'static,
{
    let confirmed = headers
        .get(CONFIRM_RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == owner);
    if !confirmed {
        let body = json!({
            "success": false,
            "message": format!("reset requires header {}: {}", CONFIRM_RESET_HEADER, owner),
        });
        return (StatusCode::PRECONDITION_FAILED, Json(body)).into_response();
    }

    let result = numbering.reset(&query.scope(owner));
    (StatusCode::OK, Json(result)).into_response()
}

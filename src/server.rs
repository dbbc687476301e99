//! HTTP API shell over the resolution pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness message |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/resources` | Run the pipeline for `?query=` and/or `?image_path=` |
//!
//! # Error Contract
//!
//! `400` when both `query` and `image_path` are missing or empty; `500` only
//! for unexpected internal failures. Bodies carry a machine-readable shape:
//!
//! ```json
//! { "error": "Either query or image_path must be provided" }
//! { "error": "Internal server error", "message": "…" }
//! ```
//!
//! Logical empty states ("no courses", "no matching resources") are `200`
//! responses carrying the pipeline's synthetic records — callers distinguish
//! "ran but found nothing" from "crashed" by the status code plus the
//! `error` field inside the array.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::models::Findings;
use crate::pipeline::Pipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(config: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/resources", get(handle_resources))
        .layer(cors)
        .with_state(AppState { pipeline });

    info!("listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    error: String,
    message: Option<String>,
}

/// JSON error body: `{ "error": …, "message"?: … }`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        error: message.into(),
        message: None,
    }
}

/// Constructs a 500 Internal Server Error.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error: "Internal server error".to_string(),
        message: Some(message.into()),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: String,
}

/// Handler for `GET /` — liveness message.
async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Study Scout API is running. Use the /resources endpoint to find learning resources."
            .to_string(),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /resources ============

#[derive(Deserialize)]
struct ResourceParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    image_path: Option<String>,
}

/// Handler for `GET /resources`.
///
/// Validates that at least one of `query`/`image_path` is present, then runs
/// the pipeline. The pipeline never fails on collaborator errors, so a `500`
/// here means an actual bug.
async fn handle_resources(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
) -> Result<Json<Findings>, AppError> {
    let query = params.query.unwrap_or_default();
    let image_path = params.image_path.filter(|p| !p.is_empty());

    if query.trim().is_empty() && image_path.is_none() {
        return Err(bad_request("Either query or image_path must be provided"));
    }

    info!(
        query = query.as_str(),
        image = image_path.as_deref().unwrap_or("-"),
        "processing resource request"
    );

    let image = image_path.as_ref().map(Path::new);
    let findings = state
        .pipeline
        .find_resources(&query, image)
        .await
        .map_err(|e| {
            error!(error = %e, "pipeline failed unexpectedly");
            internal(e.to_string())
        })?;

    Ok(Json(findings))
}

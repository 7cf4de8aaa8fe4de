//! HTTP schema delivery server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/schemas/{name}/{revision?}` | Raw schema text for one source |
//! | `GET`  | `/catalog` | The persisted catalog as JSON |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The revision segment is optional and restricted to digits and `-`;
//! an empty segment (trailing slash) means "no revision", in which case
//! the newest registered revision is served. Resolution is bounded by the
//! configured timeout and never retried; a client that hits a failure
//! must re-issue the request.
//!
//! # Error Contract
//!
//! Failure responses carry a JSON envelope:
//!
//! ```json
//! { "error": { "code": "unavailable", "message": "no source registered for bar@2020-01-01" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (504), `unavailable` (500),
//! `read_failure` (500). Every failure is terminal within the timeout
//! bound; partial bodies are never sent.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::models::{is_valid_revision, Catalog, SourceFormat, SourceIdentifier};
use crate::repository::{ResolveError, SharedSourceRepository};
use crate::store::CatalogStore;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor. The repository handle is injected once at
/// construction; there is no global accessor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    repository: Arc<SharedSourceRepository>,
    store: Arc<dyn CatalogStore>,
}

/// Starts the schema delivery server.
///
/// Binds to the configured address/port and serves until the process is
/// terminated. The caller is expected to have registered all listeners
/// and loaded the cache before this point, so the catalog is complete
/// when the first request arrives.
pub async fn run_server(
    config: &Config,
    repository: Arc<SharedSourceRepository>,
    store: Arc<dyn CatalogStore>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind();
    let state = AppState {
        config: Arc::new(config.clone()),
        repository,
        store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/schemas/{*source}", get(handle_get_schema))
        .route("/catalog", get(handle_get_catalog))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("schema server listening on http://{}", bind_addr);
    println!("Schema server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"timeout"`, `"unavailable"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 504 for a resolution that exceeded the timeout bound.
fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::GATEWAY_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 for a source the repository could not produce.
fn unavailable_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "unavailable".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 for content that could not be read or decoded.
fn read_failure(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "read_failure".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /catalog ============

/// Handler for `GET /catalog`.
///
/// Returns the persisted catalog. Before the first merge the catalog is
/// empty: no modules, empty module set id.
async fn handle_get_catalog(State(state): State<AppState>) -> Result<Json<Catalog>, AppError> {
    let catalog = state
        .store
        .load()
        .await
        .map_err(|e| read_failure(format!("failed to load catalog: {}", e)))?
        .unwrap_or_else(Catalog::empty);
    Ok(Json(catalog))
}

// ============ GET /schemas/{name}/{revision?} ============

/// Parses the path remainder after `/schemas/` into a source identifier.
///
/// Accepted shapes: `{name}`, `{name}/` (both mean "no revision") and
/// `{name}/{revision}` with the revision restricted to `[0-9-]+`.
fn parse_schema_path(source: &str) -> Result<SourceIdentifier, AppError> {
    let (name, revision) = match source.split_once('/') {
        None => (source, None),
        Some((name, rest)) => {
            if rest.contains('/') {
                return Err(bad_request(format!("unexpected path segment in: {}", source)));
            }
            if rest.is_empty() {
                // Trailing separator: explicitly "no revision".
                (name, None)
            } else if is_valid_revision(rest) {
                (name, Some(rest.to_string()))
            } else {
                return Err(bad_request(format!("invalid revision segment: {}", rest)));
            }
        }
    };

    if name.is_empty() {
        return Err(bad_request("missing schema name"));
    }
    Ok(SourceIdentifier::new(name, revision))
}

/// Handler for `GET /schemas/{name}/{revision?}`.
///
/// Asks the repository to resolve the text representation of the source
/// and waits up to the configured bound. The response is the raw schema
/// text; all failures map to terminal error responses.
async fn handle_get_schema(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Response, AppError> {
    let identifier = parse_schema_path(&source)?;

    let resolved = tokio::time::timeout(
        state.config.server.resolve_timeout(),
        state.repository.resolve(&identifier, SourceFormat::Text),
    )
    .await
    .map_err(|_| timeout_error(format!("schema resolution timed out for {}", identifier)))?;

    let bytes = resolved.map_err(|e| match e {
        ResolveError::Unavailable(_) => unavailable_error(e.to_string()),
        ResolveError::Provider { .. } => read_failure(e.to_string()),
    })?;

    let text = String::from_utf8(bytes)
        .map_err(|_| read_failure(format!("schema {} is not valid UTF-8", identifier)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

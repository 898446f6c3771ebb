//! Read-only HTTP API over a loaded object snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::detect::DeviceAggregator;
use crate::detect::DeviceReport;
use crate::detect::RolePatternMatcher;
use crate::objects::enums_of;
use crate::objects::Objects;
use crate::tree::build_tree;
use crate::tree::TreeError;
use crate::tree::TreeNode;
use crate::tree::TreeOptions;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    objects: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("No device on channel '{0}'")]
    DeviceNotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Tree(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        };
        tracing::debug!(%status, "Request failed: {}", self);
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
pub struct AppState {
    version: &'static str,
    objects: Objects,
    enums: Objects,
    tree: TreeOptions,
    namespaces: Vec<String>,
    aggregator: Mutex<DeviceAggregator<RolePatternMatcher>>,
}

impl AppState {
    pub fn new(config: &Config, objects: Objects) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            enums: enums_of(&objects),
            objects,
            tree: config.tree.clone(),
            namespaces: config.detect.namespaces.clone(),
            aggregator: Mutex::new(DeviceAggregator::new(config.matcher())),
        }
    }

    async fn scan(&self) -> Vec<DeviceReport> {
        self.aggregator
            .lock()
            .await
            .scan(&self.objects, &self.enums, &self.namespaces, false)
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            objects: state.objects.len(),
        }),
    )
}

#[tracing::instrument(skip(state))]
async fn tree(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TreeNode>>, ApiError> {
    let nodes = build_tree(&state.objects, &state.tree)?;
    tracing::debug!(nodes = nodes.len(), "Built tree");
    Ok(Json(nodes))
}

#[tracing::instrument(skip(state))]
async fn devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceReport>> {
    Json(state.scan().await)
}

#[tracing::instrument(skip(state))]
async fn device(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<DeviceReport>, ApiError> {
    state
        .scan()
        .await
        .into_iter()
        .find(|report| report.device.channel_id == channel_id)
        .map(Json)
        .ok_or(ApiError::DeviceNotFound(channel_id))
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/tree", get(tree))
        .route("/v1/devices", get(devices))
        .route("/v1/devices/:channel_id", get(device))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

//! Health check HTTP server for Kubernetes probes.
//!
//! Provides `/healthz` (liveness) and `/readyz` (readiness) endpoints.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tenant_registry::TenantRegistry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared state for health check endpoints.
pub struct HealthState {
    /// Whether the operator has completed startup.
    started: AtomicBool,
    /// Registry whose reachability gates readiness.
    registry: Arc<dyn TenantRegistry>,
}

impl HealthState {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            started: AtomicBool::new(false),
            registry,
        }
    }

    /// Mark the operator as started and ready.
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::SeqCst);
        info!("Health check: operator marked as started");
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// Run the health check HTTP server until `shutdown` is cancelled.
///
/// The operator is marked as started only after the listener is bound, so a
/// readiness probe can never succeed before the server is reachable.
pub async fn run_health_server(
    state: Arc<HealthState>,
    port: u16,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state.clone());

    let listener = TcpListener::bind(listen_addr(port)).await?;

    info!(port = port, "Health check server listening");
    state.mark_started();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Kubelet probes connect to the pod IP, so listen on every interface
fn listen_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Liveness probe endpoint.
async fn healthz() -> StatusCode {
    debug!("Liveness probe: OK");
    StatusCode::OK
}

/// Readiness probe endpoint.
///
/// Returns 503 Service Unavailable if:
/// - Startup has not completed
/// - The tenant registry is unreachable
async fn readyz(State(state): State<Arc<HealthState>>) -> StatusCode {
    if !state.is_started() {
        debug!("Readiness probe: NOT READY (startup incomplete)");
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match state.registry.health_check().await {
        Ok(()) => {
            debug!("Readiness probe: OK");
            StatusCode::OK
        }
        Err(e) => {
            warn!(error = %e, "Readiness probe: NOT READY (registry unreachable)");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

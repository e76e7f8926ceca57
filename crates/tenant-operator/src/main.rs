use std::sync::Arc;

use anyhow::{Context, Result};
use kube::Client;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tenant_operator::client::KubeClusterClient;
use tenant_operator::config::OperatorConfig;
use tenant_operator::controllers::ReconcileContext;
use tenant_operator::health::{run_health_server, HealthState};
use tenant_operator::reconciler;
use tenant_registry::{create_registry, RegistryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON formatting for production
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("tenant-operator starting");

    let config = OperatorConfig::from_env().context("Invalid operator configuration")?;

    info!(
        registry_url = %config.registry_url(),
        gitops_namespace = %config.gitops_namespace(),
        interval_secs = config.reconcile_interval().as_secs(),
        deletion_timeout_secs = config.deletion_timeout().as_secs(),
        "Loaded configuration"
    );

    let kube_client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    info!("Connected to Kubernetes cluster");

    let registry_config = RegistryConfig::from_url(config.registry_url())
        .context("Invalid TENANT_REGISTRY_URL")?;
    let registry = create_registry(&registry_config).context("Failed to open tenant registry")?;

    info!(backend = ?registry_config.backend, "Opened tenant registry");

    let shutdown = CancellationToken::new();

    let health_state = Arc::new(HealthState::new(registry.clone()));
    let health_port = config.health_port();
    let health_shutdown = shutdown.clone();
    let health = tokio::spawn(async move {
        if let Err(e) = run_health_server(health_state, health_port, health_shutdown).await {
            error!(error = %e, port = health_port, "Health server failed");
        }
    });

    let ctx = ReconcileContext::new(
        Arc::new(KubeClusterClient::new(kube_client)),
        registry,
        &config,
    );

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    reconciler::run(&ctx, config.reconcile_interval(), shutdown.clone()).await;

    // Loop only returns once shutdown is cancelled; let the health server drain
    shutdown.cancel();
    if let Err(e) = health.await {
        error!(error = %e, "Health server task failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Cancel `token` on the first SIGTERM or SIGINT
async fn cancel_on_signal(token: CancellationToken) {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Failed to install signal handlers, shutting down");
            token.cancel();
            return;
        }
    };

    select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
    }

    token.cancel();
}

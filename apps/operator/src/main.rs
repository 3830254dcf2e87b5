//! # LiteLLM Operator
//!
//! Keeps accounts, teams, virtual keys, team memberships and model
//! registrations declared as Kubernetes records in sync with LiteLLM
//! gateways.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Operator Process                               │
//! │                                                                         │
//! │  watch(kind) ──► Dispatcher(kind) ──► Controller<Adapter> ──► gateway   │
//! │       │                                     │                           │
//! │       │                                     ▼                           │
//! │       │                                KubePlane (status, finalizers,   │
//! │       │                                           generated secrets)    │
//! │       ▼                                                                 │
//! │  HealthState ──► /healthz /readyz                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```text
//! litellm-operator [--config <path>]     (or LITELLM_OPERATOR_CONFIG)
//! ```

mod health;
mod kube_plane;
mod watch;

use anyhow::{bail, Context};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::health::HealthState;
use crate::kube_plane::KubePlane;
use litellm_core::types::{ACCOUNT, API_KEY, MODEL, TEAM, TEAM_MEMBERSHIP};
use litellm_core::ResourceKind;
use litellm_plane::ControlPlane;
use litellm_reconcile::{
    AccountAdapter, ApiKeyAdapter, ConnectionResolver, Controller, Dispatcher, LogFormat,
    MembershipAdapter, ModelAdapter, OperatorConfig, Reconciler, TeamAdapter,
};

/// Reconciles LiteLLM gateway records declared in Kubernetes.
#[derive(Debug, Parser)]
#[command(name = "litellm-operator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the operator configuration file (TOML).
    #[arg(short, long, env = "LITELLM_OPERATOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = OperatorConfig::load(cli.config).context("loading configuration")?;
    init_tracing(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting LiteLLM operator...");

    let kinds = config.watch.resolved_kinds()?;
    info!(
        kinds = ?kinds.iter().map(|k| k.kind).collect::<Vec<_>>(),
        namespace = config.watch.namespace.as_deref().unwrap_or("*"),
        concurrency = config.controller.concurrency,
        drift_interval_secs = config.controller.drift_interval_secs,
        "Configuration loaded"
    );

    let client = kube::Client::try_default()
        .await
        .context("connecting to Kubernetes")?;
    info!("Connected to Kubernetes API");

    let plane: Arc<dyn ControlPlane> = Arc::new(KubePlane::new(client.clone()));
    let resolver = Arc::new(ConnectionResolver::new(
        plane.clone(),
        config.instances.clone(),
        config.gateway.client_options(),
    ));

    let health = HealthState::new();
    let mut handles = Vec::new();
    let mut dispatchers = Vec::new();
    let mut watchers = Vec::new();

    for kind in kinds {
        let reconciler = controller_for(kind, plane.clone(), resolver.clone())?;
        let (dispatcher, handle) = Dispatcher::new(reconciler, config.controller.dispatch_config());
        health.register(handle.clone()).await;

        dispatchers.push(tokio::spawn(dispatcher.run()));
        watchers.push(tokio::spawn(watch::run(
            client.clone(),
            kind,
            config.watch.namespace.clone(),
            handle.clone(),
            health.clone(),
        )));
        handles.push(handle);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.health_port)
        .parse()
        .context("parsing health server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding health server to {}", addr))?;
    info!(%addr, "Health server listening");

    let server = axum::serve(listener, health::router(health.clone()))
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "Health server failed");
    }

    // Stop feeding work, then let in-flight passes finish.
    for watcher in &watchers {
        watcher.abort();
    }
    for handle in &handles {
        if let Err(e) = handle.shutdown().await {
            error!(kind = handle.kind().kind, error = %e, "Failed to stop dispatcher");
        }
    }
    for dispatcher in dispatchers {
        if let Err(e) = dispatcher.await {
            error!(error = %e, "Dispatcher task failed");
        }
    }

    info!("Operator shutdown complete");
    Ok(())
}

/// Builds the controller for one kind.
fn controller_for(
    kind: ResourceKind,
    plane: Arc<dyn ControlPlane>,
    resolver: Arc<ConnectionResolver>,
) -> anyhow::Result<Arc<dyn Reconciler>> {
    let reconciler: Arc<dyn Reconciler> = match kind {
        k if k == ACCOUNT => Arc::new(Controller::new(AccountAdapter, plane, resolver)),
        k if k == TEAM => Arc::new(Controller::new(TeamAdapter, plane, resolver)),
        k if k == API_KEY => Arc::new(Controller::new(ApiKeyAdapter, plane, resolver)),
        k if k == TEAM_MEMBERSHIP => Arc::new(Controller::new(MembershipAdapter, plane, resolver)),
        k if k == MODEL => Arc::new(Controller::new(ModelAdapter, plane, resolver)),
        other => bail!("kind {} is not reconciled", other),
    };
    Ok(reconciler)
}

fn init_tracing(config: &OperatorConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match config.log.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::try_parse_from(["litellm-operator", "-c", "/etc/litellm/operator.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/litellm/operator.toml")));

        let cli = Cli::try_parse_from(["litellm-operator", "--config", "op.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("op.toml")));
    }

    #[test]
    fn test_unknown_argument_rejected() {
        assert!(Cli::try_parse_from(["litellm-operator", "--bogus"]).is_err());
    }
}

//! Server lifecycle
//!
//! - Role graph audit on startup
//! - API and metrics listeners
//! - Graceful shutdown on signals (SIGTERM, SIGINT)

use crate::routes::{create_metrics_router, create_router};
use crate::state::AppState;
use anyhow::{Context, Result};
use quill_access::{RoleGraph, RoleGraphStore, SeparationPolicy};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Check the stored role graph against the separation policy.
///
/// Findings are logged, never fatal: a role that trips a static pair
/// denies its holders at decision time anyway. Returns the number of
/// findings.
pub async fn audit_role_graph(store: &dyn RoleGraphStore, policy: &SeparationPolicy, retries: usize) -> Result<usize> {
    let graph = RoleGraph::load_full(store, retries)
        .await
        .context("Failed to load role graph")?;

    let mut findings = 0;

    if let Some(cycle) = graph.find_cycle() {
        warn!(cycle = %cycle.join(" -> "), "Role hierarchy contains a cycle");
        findings += 1;
    }

    for violation in policy.audit(&graph) {
        warn!(
            role = %violation.role,
            kind = %violation.kind,
            constraint = %violation.constraint,
            "Role violates a separation constraint on its own; its holders will be denied"
        );
        findings += 1;
    }

    info!(roles = graph.len(), version = graph.version(), findings, "Role graph audited");
    Ok(findings)
}

/// Serve the API and metrics listeners until a shutdown signal arrives
pub async fn run(state: AppState, listen_addr: SocketAddr, metrics_addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_addr))?;
    let metrics_listener = TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics to {}", metrics_addr))?;

    info!("Access guard listening on {}", listener.local_addr()?);
    info!("Metrics listening on {}", metrics_listener.local_addr()?);

    let metrics_app = create_metrics_router(state.clone());
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("Metrics server error: {}", e);
        }
    });

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = metrics_server.await {
        error!("Metrics server task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

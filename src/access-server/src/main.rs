//! Quill access guard server
//!
//! # Usage
//!
//! ```bash
//! # In-memory platform roles, default addresses
//! JWT_SECRET=change-me cargo run -p quill-access-server
//!
//! # PostgreSQL-backed roles with a config file
//! JWT_SECRET=change-me DATABASE_URL=postgres://localhost/quill \
//!     cargo run -p quill-access-server -- --config config/access.toml
//!
//! # Debug logging
//! RUST_LOG=debug cargo run -p quill-access-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging filter (default: info)
//! - `JWT_SECRET`: HS256 secret for bearer tokens (required)
//! - `DATABASE_URL`: PostgreSQL URL; without it roles live in memory
//! - `QUILL_ACCESS_CONFIG`: Path to the TOML configuration file

use anyhow::{Context, Result};
use clap::Parser;
use quill_access::store::PostgresRoleStore;
use quill_access::{seed, InMemoryRoleStore, JwtVerifier, RoleAssignmentStore};
use quill_access_server::{server, AppState, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Quill access guard server
#[derive(Parser, Debug)]
#[command(name = "quill-access-server", version, about = "RBAC guard with separation of duty", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "QUILL_ACCESS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting Quill access guard v{}", quill_access::VERSION);

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    config.validate()?;

    let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    let verifier = JwtVerifier::new(secret.as_bytes())
        .context("Invalid JWT secret")?
        .with_leeway(config.jwt.leeway_secs);

    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PostgresRoleStore::new(&url)
                .await
                .context("Failed to connect to PostgreSQL")?;

            if config.store.run_migrations {
                store.run_migrations().await.context("Failed to run migrations")?;
                info!("Migrations applied");
            }
            if config.store.seed_platform {
                store
                    .seed(&seed::platform())
                    .await
                    .context("Failed to seed platform roles")?;
            }

            run(Arc::new(store), config, verifier).await
        }
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory platform roles; assignments are lost on restart");
            let store = InMemoryRoleStore::from_seed(seed::platform());
            run(Arc::new(store), config, verifier).await
        }
    }
}

async fn run<S>(store: Arc<S>, config: ServerConfig, verifier: JwtVerifier) -> Result<()>
where
    S: RoleAssignmentStore + 'static,
{
    let listen_addr = config.listen_addr()?;
    let metrics_addr = config.metrics_addr()?;
    let retries = config.access.resolver.snapshot_retries;

    let state = AppState::new(store.clone(), config.access, Arc::new(verifier)).context("Failed to build access engine")?;

    server::audit_role_graph(store.as_ref(), state.engine.policy(), retries).await?;

    server::run(state, listen_addr, metrics_addr).await
}

/// Initialize tracing with `RUST_LOG`, falling back to the verbosity flag
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "quill_access=debug,quill_access_server=debug,tower_http=debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

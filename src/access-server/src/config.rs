//! Server configuration loading and validation
//!
//! Secrets never come from the file: the JWT secret is read from
//! `JWT_SECRET` and the database URL from `DATABASE_URL`.

use anyhow::{Context, Result};
use quill_access::AccessConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Complete server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub jwt: JwtSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSection {
    /// Apply SQL migrations on startup (PostgreSQL only)
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    /// Insert the platform roles and permissions if missing
    #[serde(default = "default_true")]
    pub seed_platform: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JwtSection {
    /// Clock skew tolerated on `exp`
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            metrics_addr: default_metrics_addr(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            run_migrations: true,
            seed_platform: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {}", path.as_ref().display()))?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(contents).context("Failed to parse configuration file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        self.metrics_addr()?;

        if self.server.listen_addr == self.server.metrics_addr {
            anyhow::bail!("listen_addr and metrics_addr must differ");
        }

        self.access.validate().context("Invalid access configuration")?;
        Ok(())
    }

    /// Parsed API listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen_addr '{}'", self.server.listen_addr))
    }

    /// Parsed metrics listen address
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.server
            .metrics_addr
            .parse()
            .with_context(|| format!("Invalid metrics_addr '{}'", self.server.metrics_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_access::{seed, InMemoryRoleStore, RoleGraph};

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert!(config.store.seed_platform);
        assert_eq!(config.access.separation.static_pairs.len(), 1);
    }

    #[test]
    fn test_conflict_pairs_from_toml() {
        let config = ServerConfig::parse(
            r#"
            [access.separation]
            static = [["AUDITOR", "ADMIN"], ["MODERATOR", "ADMIN"]]
            dynamic = []

            [access.resolver]
            cache_ttl_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.access.separation.static_pairs.len(), 2);
        assert!(config.access.separation.dynamic_pairs.is_empty());
        assert_eq!(config.access.resolver.cache_ttl_secs, 30);
    }

    #[tokio::test]
    async fn test_shipped_config_pairs_deny_administrators() {
        let config = ServerConfig::parse(include_str!("../config/access.toml")).unwrap();
        let store = InMemoryRoleStore::from_seed(seed::platform());
        let graph = RoleGraph::load_full(&store, 3).await.unwrap();

        let flagged: Vec<String> = config
            .access
            .separation
            .audit(&graph)
            .into_iter()
            .map(|violation| violation.role)
            .collect();

        assert!(flagged.iter().any(|role| role == "ADMIN"));
        assert!(flagged.iter().any(|role| role == "SUPER_ADMIN"));
        assert!(!flagged.iter().any(|role| role == "USER"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result = ServerConfig::parse(
            r#"
            [server]
            listen_addr = "not-an-address"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_self_conflict_rejected() {
        let result = ServerConfig::parse(
            r#"
            [access.separation]
            static = [["ADMIN", "ADMIN"]]
            "#,
        );
        assert!(result.is_err());
    }
}

//! Decision metrics

use super::decision::Decision;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Engine decision counters
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of decisions
    pub total_decisions: u64,

    pub allowed: u64,
    pub denied_unauthenticated: u64,
    pub denied_conflict: u64,
    pub denied_insufficient_permission: u64,

    /// Resolution failures (subset of `denied_unauthenticated`)
    pub resolution_errors: u64,

    /// Sum of decision latencies
    pub total_latency_ms: f64,

    /// Average latency
    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Total denies of any kind
    pub fn denied(&self) -> u64 {
        self.denied_unauthenticated + self.denied_conflict + self.denied_insufficient_permission
    }

    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        if self.total_decisions == 0 {
            0.0
        } else {
            self.allowed as f64 / self.total_decisions as f64
        }
    }
}

/// Metrics collector
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decision and how long it took
    pub async fn record_decision(&self, decision: &Decision, latency: Duration) {
        let mut metrics = self.metrics.write().await;
        metrics.total_decisions += 1;

        match decision {
            Decision::Allow => metrics.allowed += 1,
            Decision::DenyUnauthenticated { .. } => metrics.denied_unauthenticated += 1,
            Decision::DenyConflict { .. } => metrics.denied_conflict += 1,
            Decision::DenyInsufficientPermission { .. } => metrics.denied_insufficient_permission += 1,
        }

        metrics.total_latency_ms += latency.as_secs_f64() * 1000.0;
        metrics.avg_latency_ms = metrics.total_latency_ms / metrics.total_decisions as f64;
    }

    /// Record a failed resolution
    pub async fn record_resolution_error(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.resolution_errors += 1;
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = EngineMetrics::default();
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP access_decisions_total Total number of access decisions
# TYPE access_decisions_total counter
access_decisions_total {}

# HELP access_decisions_by_outcome_total Access decisions by outcome
# TYPE access_decisions_by_outcome_total counter
access_decisions_by_outcome_total{{outcome="allow"}} {}
access_decisions_by_outcome_total{{outcome="unauthenticated"}} {}
access_decisions_by_outcome_total{{outcome="conflict"}} {}
access_decisions_by_outcome_total{{outcome="insufficient_permission"}} {}

# HELP access_resolution_errors_total Role resolutions that failed
# TYPE access_resolution_errors_total counter
access_resolution_errors_total {}

# HELP access_decision_latency_seconds_avg Average decision latency
# TYPE access_decision_latency_seconds_avg gauge
access_decision_latency_seconds_avg {}
"#,
            metrics.total_decisions,
            metrics.allowed,
            metrics.denied_unauthenticated,
            metrics.denied_conflict,
            metrics.denied_insufficient_permission,
            metrics.resolution_errors,
            metrics.avg_latency_ms / 1000.0,
        )
    }
}

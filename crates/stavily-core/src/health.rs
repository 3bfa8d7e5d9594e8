use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of one named component, as reported by its probe. Ordered worst
/// to best so the aggregator can take the worst of all constituents per
/// §4.8: `healthy > degraded > unhealthy > unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Unhealthy,
    Degraded,
    Healthy,
}

impl HealthStatus {
    /// The worse of two statuses, per the ordering above (lower variant is
    /// worse).
    #[must_use]
    pub fn worse(self, other: Self) -> Self {
        self.min(other)
    }
}

/// A snapshot of one component's health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub error_count: u64,
    #[serde(default)]
    pub message: Option<String>,
}

impl ComponentHealth {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            last_check: Utc::now(),
            error_count: 0,
            message: None,
        }
    }

    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            last_check: Utc::now(),
            error_count: 0,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            last_check: Utc::now(),
            error_count: 0,
            message: Some(message.into()),
        }
    }
}

/// Process-wide counters incremented by their originating components and
/// exposed as a snapshot by the aggregator (§4.8). Never defines a wire
/// format — that's an external collaborator's concern.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    pub heartbeats: AtomicU64,
    pub heartbeat_errors: AtomicU64,
    pub instructions_received: AtomicU64,
    pub instructions_completed: AtomicU64,
    pub instructions_failed: AtomicU64,
    pub install_successes: AtomicU64,
    pub install_failures: AtomicU64,
    pub execution_successes: AtomicU64,
    pub execution_failures: AtomicU64,
    pub events_dropped: AtomicU64,
}

impl AgentMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time snapshot of all counters, suitable for handing to an
    /// external metrics endpoint (whose format this crate does not define).
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            heartbeat_errors: self.heartbeat_errors.load(Ordering::Relaxed),
            instructions_received: self.instructions_received.load(Ordering::Relaxed),
            instructions_completed: self.instructions_completed.load(Ordering::Relaxed),
            instructions_failed: self.instructions_failed.load(Ordering::Relaxed),
            install_successes: self.install_successes.load(Ordering::Relaxed),
            install_failures: self.install_failures.load(Ordering::Relaxed),
            execution_successes: self.execution_successes.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub heartbeats: u64,
    pub heartbeat_errors: u64,
    pub instructions_received: u64,
    pub instructions_completed: u64,
    pub instructions_failed: u64,
    pub install_successes: u64,
    pub install_failures: u64,
    pub execution_successes: u64,
    pub execution_failures: u64,
    pub events_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_of_ordering_matches_spec() {
        assert_eq!(
            HealthStatus::Healthy.worse(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worse(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthStatus::Unhealthy.worse(HealthStatus::Unknown),
            HealthStatus::Unknown
        );
        assert_eq!(
            HealthStatus::Healthy.worse(HealthStatus::Healthy),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn metrics_snapshot_reflects_increments() {
        let metrics = AgentMetrics::new();
        AgentMetrics::incr(&metrics.heartbeats);
        AgentMetrics::incr(&metrics.heartbeats);
        AgentMetrics::incr(&metrics.instructions_failed);
        let snap = metrics.snapshot();
        assert_eq!(snap.heartbeats, 2);
        assert_eq!(snap.instructions_failed, 1);
    }
}

//! Health & Metrics Aggregator (§4.8): named probes swept on demand,
//! worst-of ordering per `stavily_core::HealthStatus`. Grounded on the
//! teacher's preference for an explicit, constructed collaborator over
//! global mutable state (§9's redesign note rules out a global health
//! singleton).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use stavily_core::{ComponentHealth, HealthStatus};

type Probe = Arc<dyn Fn() -> ComponentHealth + Send + Sync>;

/// Collects named health probes and sweeps them into a worst-of snapshot.
/// Cheap to clone (an `Arc` around the probe table) so every component
/// that wants to report health can hold a handle without borrowing the
/// Workflow Loop.
#[derive(Clone)]
pub struct HealthAggregator {
    probes: Arc<RwLock<HashMap<String, Probe>>>,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            probes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register (or replace) a named probe.
    pub fn register(&self, name: impl Into<String>, probe: impl Fn() -> ComponentHealth + Send + Sync + 'static) {
        self.probes
            .write()
            .expect("health probe table lock poisoned")
            .insert(name.into(), Arc::new(probe));
    }

    /// Sweep every registered probe and fold into the worst-of-all-
    /// constituents overall status (§4.8: `healthy > degraded > unhealthy
    /// > unknown`).
    #[must_use]
    pub fn sweep(&self) -> HealthSnapshot {
        let probes = self.probes.read().expect("health probe table lock poisoned");
        let mut overall = HealthStatus::Healthy;
        let mut components = HashMap::with_capacity(probes.len());
        for (name, probe) in probes.iter() {
            let health = probe();
            overall = overall.worse(health.status);
            components.insert(name.clone(), health);
        }
        if probes.is_empty() {
            overall = HealthStatus::Unknown;
        }
        HealthSnapshot { status: overall, components }
    }
}

/// `{ status, components: { name: {status, lastCheck, errorCount, message?} } }`
/// (§6). The wire format beyond this shape is an external collaborator's
/// concern; this crate only guarantees the getter.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_is_unknown_with_no_probes() {
        let aggregator = HealthAggregator::new();
        assert_eq!(aggregator.sweep().status, HealthStatus::Unknown);
    }

    #[test]
    fn sweep_takes_the_worst_of_all_probes() {
        let aggregator = HealthAggregator::new();
        aggregator.register("orchestrator", ComponentHealth::healthy);
        aggregator.register("plugin-store", || ComponentHealth::degraded("slow clone"));
        let snapshot = aggregator.sweep();
        assert_eq!(snapshot.status, HealthStatus::Degraded);
        assert_eq!(snapshot.components.len(), 2);
    }

    #[test]
    fn replacing_a_probe_updates_its_reading() {
        let aggregator = HealthAggregator::new();
        aggregator.register("auth", ComponentHealth::healthy);
        assert_eq!(aggregator.sweep().status, HealthStatus::Healthy);
        aggregator.register("auth", || ComponentHealth::unhealthy("two consecutive 401s"));
        assert_eq!(aggregator.sweep().status, HealthStatus::Unhealthy);
    }
}

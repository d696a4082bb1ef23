//! Execution constraints and the environment they are checked against
//!
//! A [`ConstraintPolicy`] is declared once at submission and never mutated;
//! the scheduler re-evaluates it against a fresh [`EnvironmentSnapshot`] on
//! every gate attempt. Snapshots come from an [`EnvironmentProbe`], so tests
//! and host integrations decide what "connected" means.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryLevel {
    Normal,
    Low,
}

/// Point-in-time view of the conditions a policy can gate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub network: NetworkState,
    pub battery: BatteryLevel,
}

impl EnvironmentSnapshot {
    /// Connected network, healthy battery.
    pub fn nominal() -> Self {
        Self {
            network: NetworkState::Connected,
            battery: BatteryLevel::Normal,
        }
    }
}

/// Which environment conditions must hold before a job may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintPolicy {
    #[serde(default = "default_true")]
    pub require_network: bool,
    #[serde(default = "default_true")]
    pub require_battery_not_low: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConstraintPolicy {
    fn default() -> Self {
        Self {
            require_network: true,
            require_battery_not_low: true,
        }
    }
}

impl ConstraintPolicy {
    /// Policy with no preconditions; the job runs on the first gate attempt.
    pub fn unconstrained() -> Self {
        Self {
            require_network: false,
            require_battery_not_low: false,
        }
    }

    pub fn is_satisfied(&self, env: &EnvironmentSnapshot) -> bool {
        if self.require_network && env.network != NetworkState::Connected {
            return false;
        }
        if self.require_battery_not_low && env.battery == BatteryLevel::Low {
            return false;
        }
        true
    }
}

/// Source of environment snapshots.
pub trait EnvironmentProbe: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Probe that always reports the same snapshot. The default wiring uses
/// `FixedEnvironment::nominal()` - host-specific connectivity and battery
/// probes plug in behind the same trait.
#[derive(Debug, Clone, Copy)]
pub struct FixedEnvironment(pub EnvironmentSnapshot);

impl FixedEnvironment {
    pub fn nominal() -> Self {
        Self(EnvironmentSnapshot::nominal())
    }
}

impl EnvironmentProbe for FixedEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.0
    }
}

/// Probe whose snapshot can be flipped at runtime. Clones share state.
#[derive(Debug, Clone)]
pub struct SharedEnvironment {
    inner: Arc<RwLock<EnvironmentSnapshot>>,
}

impl SharedEnvironment {
    pub fn new(initial: EnvironmentSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, snapshot: EnvironmentSnapshot) {
        *self.inner.write().expect("environment lock poisoned") = snapshot;
    }

    pub fn set_network(&self, network: NetworkState) {
        self.inner.write().expect("environment lock poisoned").network = network;
    }

    pub fn set_battery(&self, battery: BatteryLevel) {
        self.inner.write().expect("environment lock poisoned").battery = battery;
    }
}

impl EnvironmentProbe for SharedEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        *self.inner.read().expect("environment lock poisoned")
    }
}

//! Upstream host records and health state.
//!
//! # Responsibilities
//! - Represent a single upstream origin server
//! - Track health state (Unknown/Healthy/Unhealthy) with hysteresis
//! - Group hosts into the ordered sets strategies select among
//!
//! # Design Decisions
//! - Health state is an atomic read by selection logic without locking;
//!   an external health-monitoring collaborator is the only writer
//! - `Unknown` counts as healthy: a freshly loaded host serves until a
//!   probe proves otherwise
//! - Consecutive success/failure thresholds come from the strategy's
//!   failover config, fixed at construction, and prevent flapping
//! - Host identity and weight are immutable after construction; a weight
//!   change arrives as a config reload, which rebuilds hash rings

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single upstream host a strategy may select.
#[derive(Debug)]
pub struct Host {
    /// Hostname as configured.
    pub name: String,
    /// Upstream port.
    pub port: u16,
    /// Relative weight within the group.
    pub weight: f32,
    /// Optional health-check endpoint probed by the health collaborator.
    pub health_check: Option<Url>,
    /// Consecutive successes required to mark this host healthy again.
    pub healthy_threshold: usize,
    /// Consecutive failures required to mark this host unhealthy.
    pub unhealthy_threshold: usize,

    /// Current health state (0=Unknown, 1=Healthy, 2=Unhealthy).
    state: AtomicU8,
    /// Consecutive failure count.
    consecutive_failures: AtomicUsize,
    /// Consecutive success count.
    consecutive_successes: AtomicUsize,
}

impl Host {
    /// Create a new host in the `Unknown` state.
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            weight: 1.0,
            health_check: None,
            healthy_threshold: 1,
            unhealthy_threshold: 3,
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    /// Set the relative weight (builder style).
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the health-check endpoint (builder style).
    pub fn with_health_check(mut self, url: Url) -> Self {
        self.health_check = Some(url);
        self
    }

    /// Set the health-transition thresholds (builder style).
    pub fn with_thresholds(mut self, healthy: usize, unhealthy: usize) -> Self {
        self.healthy_threshold = healthy.max(1);
        self.unhealthy_threshold = unhealthy.max(1);
        self
    }

    /// Current health state.
    pub fn state(&self) -> HealthState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// Return true if the host is considered selectable (Healthy or Unknown).
    pub fn is_healthy(&self) -> bool {
        self.state.load(Ordering::Relaxed) != (HealthState::Unhealthy as u8)
    }

    /// Report a successful request/probe. Transitions to `Healthy` once
    /// the configured consecutive successes accumulate.
    pub fn mark_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        let current = self.state.load(Ordering::Relaxed);
        if current == (HealthState::Healthy as u8) {
            return;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            tracing::info!(host = %self, "host transitioned to healthy");
        }
    }

    /// Report a failed request/probe. Transitions to `Unhealthy` once
    /// the configured consecutive failures accumulate.
    pub fn mark_failure(&self) {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        let current = self.state.load(Ordering::Relaxed);
        if current == (HealthState::Unhealthy as u8) {
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.unhealthy_threshold {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            tracing::warn!(host = %self, "host transitioned to unhealthy");
        }
    }

    /// Force the state directly. Used by tests and by health collaborators
    /// that maintain their own hysteresis.
    pub fn set_state(&self, state: HealthState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.port)
    }
}

/// An ordered set of candidate hosts. Strategies treat index 0 as the
/// first-preference host where order matters (latched, first_live).
#[derive(Debug, Clone, Default)]
pub struct HostGroup {
    pub hosts: Vec<Arc<Host>>,
}

impl HostGroup {
    pub fn new(hosts: Vec<Arc<Host>>) -> Self {
        Self { hosts }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Indices of currently healthy hosts, in configured order.
    pub fn healthy_indices(&self) -> Vec<usize> {
        self.hosts
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_healthy())
            .map(|(i, _)| i)
            .collect()
    }
}

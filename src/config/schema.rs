//! Strategy configuration schema definitions.
//!
//! This module defines the structure of the strategies document. All types
//! derive Serde traits for deserialization from the flattened YAML; each
//! entry is decoded independently so one malformed entry cannot abort a
//! whole load.

use serde::{Deserialize, Serialize};

/// Key of the top-level sequence in the strategies document.
pub const STRATEGIES_KEY: &str = "strategies";

/// One entry of the top-level `strategies` sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyEntry {
    /// Unique strategy name. Duplicates within one load are rejected.
    pub strategy: String,

    /// Policy literal: one of `consistent_hash`, `first_live`, `rr_strict`,
    /// `rr_ip`, `latched`. A missing policy skips the entry.
    #[serde(default)]
    pub policy: Option<String>,

    /// Which request attribute feeds hashing/affinity.
    #[serde(default)]
    pub hash_key: HashKey,

    /// Virtual nodes per host on the consistent-hash ring.
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Health-transition hysteresis applied to this strategy's hosts.
    #[serde(default)]
    pub failover: FailoverConfig,

    /// Ordered host groups. The first group is the primary tier; later
    /// groups are failover tiers tried in order.
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

/// Request attribute used as the hash/affinity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashKey {
    /// URL path of the request.
    #[default]
    Path,
    /// Client IP address.
    ClientIp,
    /// Caller-supplied key expression.
    Key,
}

/// Consecutive-result thresholds for host health transitions.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Consecutive successes required to mark a host healthy again.
    pub healthy_threshold: usize,
    /// Consecutive failures required to mark a host unhealthy.
    pub unhealthy_threshold: usize,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            healthy_threshold: 1,
            unhealthy_threshold: 3,
        }
    }
}

/// One host group within a strategy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GroupEntry {
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

/// One host within a group.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostEntry {
    /// Hostname of the upstream.
    pub host: String,

    /// Upstream port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Relative weight within the group.
    #[serde(default = "default_weight")]
    pub weight: f32,

    /// Health-check endpoint URL, if the host exposes one.
    #[serde(default)]
    pub health_check: Option<String>,
}

fn default_replicas() -> usize {
    128
}

fn default_port() -> u16 {
    80
}

fn default_weight() -> f32 {
    1.0
}

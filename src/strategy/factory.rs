//! Strategy instantiation from the flattened document.
//!
//! # Responsibilities
//! - Flatten the configured source via the document loader
//! - Parse the merged YAML and walk the `strategies` sequence
//! - Instantiate one strategy per entry through the policy table
//!
//! # Design Decisions
//! - Policies live in a registration table (literal → constructor), open
//!   to extension via `register_policy`; no central match on policy kind
//! - Per-entry failures (bad policy, duplicate name, malformed fields)
//!   skip that entry and continue; whole-document failures abort the load
//! - A missing document is not an error: the factory produces a
//!   "not loaded" registry and the proxy may run with zero strategies

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::config::document;
use crate::config::schema::{StrategyEntry, STRATEGIES_KEY};
use crate::error::ConfigError;
use crate::hosts::{Host, HostGroup};
use crate::registry::StrategyRegistry;
use crate::strategy::consistent_hash::ConsistentHash;
use crate::strategy::round_robin::{FirstLive, Latched, RoundRobinClientIp, RoundRobinStrict};
use crate::strategy::{HostSelector, PolicyKind, Strategy};

/// Constructor for one policy: turn a parsed entry and its host groups
/// into a registered strategy. May reject the entry.
pub type PolicyCtor =
    fn(&StrategyEntry, Vec<HostGroup>) -> Result<Strategy, ConfigError>;

/// Builds strategy registries from configuration sources.
pub struct StrategyFactory {
    policies: HashMap<String, PolicyCtor>,
}

impl StrategyFactory {
    /// A factory with the five built-in policies registered.
    pub fn new() -> Self {
        let mut factory = Self {
            policies: HashMap::new(),
        };
        factory.register_policy(PolicyKind::ConsistentHash.as_str(), build_consistent_hash);
        factory.register_policy(PolicyKind::FirstLive.as_str(), build_first_live);
        factory.register_policy(PolicyKind::RoundRobinStrict.as_str(), build_rr_strict);
        factory.register_policy(PolicyKind::RoundRobinClientIp.as_str(), build_rr_ip);
        factory.register_policy(PolicyKind::Latched.as_str(), build_latched);
        factory
    }

    /// Register (or replace) a policy constructor under a literal.
    pub fn register_policy(&mut self, literal: impl Into<String>, ctor: PolicyCtor) {
        self.policies.insert(literal.into(), ctor);
    }

    /// Load a strategies source (file or directory) into a registry.
    ///
    /// A nonexistent top-level path yields a "not loaded" registry, not an
    /// error; any other failure aborts the load and the caller keeps its
    /// previous registry.
    pub fn load(&self, path: &Path) -> Result<StrategyRegistry, ConfigError> {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        tracing::info!(config = %basename, "loading strategies");

        match std::fs::metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // missing config file is an acceptable runtime state
                tracing::info!(path = %path.display(), "strategies source doesn't exist");
                return Ok(StrategyRegistry::not_loaded());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Ok(_) => {}
        }

        let doc = document::flatten(path)?;
        let registry = self.parse(&doc)?;
        tracing::info!(
            config = %basename,
            strategies = registry.len(),
            "finished loading strategies"
        );
        Ok(registry)
    }

    /// Parse an already-flattened document into a registry.
    pub fn parse(&self, doc: &str) -> Result<StrategyRegistry, ConfigError> {
        if doc.trim().is_empty() {
            tracing::info!("strategies document is empty");
            return Ok(StrategyRegistry::not_loaded());
        }

        let root: serde_yaml::Value = serde_yaml::from_str(doc)?;
        if root.is_null() {
            tracing::info!("no strategy configurations were present in the document");
            return Ok(StrategyRegistry::not_loaded());
        }

        let strategies = root
            .get(STRATEGIES_KEY)
            .ok_or_else(|| {
                ConfigError::Malformed(format!("expected a '{STRATEGIES_KEY}' sequence"))
            })?
            .as_sequence()
            .ok_or_else(|| {
                ConfigError::Malformed(format!("'{STRATEGIES_KEY}' is not a sequence"))
            })?;

        let mut registry = StrategyRegistry::empty();
        for node in strategies {
            let entry: StrategyEntry = match serde_yaml::from_value(node.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(error = %e, "skipping malformed strategy entry");
                    continue;
                }
            };

            match self.build_entry(&registry, entry) {
                Ok(strategy) => {
                    registry.insert(strategy);
                }
                Err(e) => {
                    // per-entry errors are recoverable, the load continues
                    tracing::error!(error = %e, "strategy entry ignored");
                }
            }
        }
        Ok(registry)
    }

    fn build_entry(
        &self,
        registry: &StrategyRegistry,
        entry: StrategyEntry,
    ) -> Result<Strategy, ConfigError> {
        if registry.contains(&entry.strategy) {
            return Err(ConfigError::DuplicateStrategy(entry.strategy));
        }

        let Some(policy) = entry.policy.as_deref() else {
            return Err(ConfigError::InvalidEntry {
                strategy: entry.strategy,
                reason: "no policy is defined".into(),
            });
        };

        let Some(ctor) = self.policies.get(policy) else {
            return Err(ConfigError::InvalidPolicy {
                strategy: entry.strategy,
                policy: policy.to_string(),
            });
        };

        let groups = build_host_groups(&entry)?;
        ctor(&entry, groups)
    }
}

impl Default for StrategyFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Materialize the entry's host groups, validating health-check URLs.
fn build_host_groups(entry: &StrategyEntry) -> Result<Vec<HostGroup>, ConfigError> {
    let mut groups = Vec::with_capacity(entry.groups.len());
    for group in &entry.groups {
        let mut hosts = Vec::with_capacity(group.hosts.len());
        for host_entry in &group.hosts {
            let mut host = Host::new(host_entry.host.clone(), host_entry.port)
                .with_weight(host_entry.weight)
                .with_thresholds(
                    entry.failover.healthy_threshold,
                    entry.failover.unhealthy_threshold,
                );
            if let Some(raw) = &host_entry.health_check {
                let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEntry {
                    strategy: entry.strategy.clone(),
                    reason: format!("bad health_check url '{raw}': {e}"),
                })?;
                host = host.with_health_check(url);
            }
            hosts.push(Arc::new(host));
        }
        groups.push(HostGroup::new(hosts));
    }
    Ok(groups)
}

fn tiers_with<F>(groups: Vec<HostGroup>, mut make: F) -> Vec<(HostGroup, Box<dyn HostSelector>)>
where
    F: FnMut(&HostGroup) -> Box<dyn HostSelector>,
{
    groups
        .into_iter()
        .map(|g| {
            let selector = make(&g);
            (g, selector)
        })
        .collect()
}

fn build_consistent_hash(
    entry: &StrategyEntry,
    groups: Vec<HostGroup>,
) -> Result<Strategy, ConfigError> {
    if entry.replicas == 0 {
        return Err(ConfigError::InvalidEntry {
            strategy: entry.strategy.clone(),
            reason: "replicas must be at least 1".into(),
        });
    }
    let replicas = entry.replicas;
    let hash_key = entry.hash_key;
    let tiers = tiers_with(groups, |g| {
        Box::new(ConsistentHash::new(&g.hosts, replicas, hash_key))
    });
    Ok(Strategy::new(
        &entry.strategy,
        PolicyKind::ConsistentHash,
        tiers,
    ))
}

fn build_first_live(entry: &StrategyEntry, groups: Vec<HostGroup>) -> Result<Strategy, ConfigError> {
    let tiers = tiers_with(groups, |_| Box::new(FirstLive::new()));
    Ok(Strategy::new(&entry.strategy, PolicyKind::FirstLive, tiers))
}

fn build_rr_strict(entry: &StrategyEntry, groups: Vec<HostGroup>) -> Result<Strategy, ConfigError> {
    let tiers = tiers_with(groups, |_| Box::new(RoundRobinStrict::new()));
    Ok(Strategy::new(
        &entry.strategy,
        PolicyKind::RoundRobinStrict,
        tiers,
    ))
}

fn build_rr_ip(entry: &StrategyEntry, groups: Vec<HostGroup>) -> Result<Strategy, ConfigError> {
    let tiers = tiers_with(groups, |_| Box::new(RoundRobinClientIp::new()));
    Ok(Strategy::new(
        &entry.strategy,
        PolicyKind::RoundRobinClientIp,
        tiers,
    ))
}

fn build_latched(entry: &StrategyEntry, groups: Vec<HostGroup>) -> Result<Strategy, ConfigError> {
    let tiers = tiers_with(groups, |_| Box::new(Latched::new()));
    Ok(Strategy::new(&entry.strategy, PolicyKind::Latched, tiers))
}

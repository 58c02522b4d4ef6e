//! Host-selection strategies.
//!
//! # Data Flow
//! ```text
//! strategies document parsed → factory.rs builds one Strategy per entry
//!     → Strategy owns its host groups and a HostSelector:
//!         - round_robin.rs (rr_strict, rr_ip, latched, first_live)
//!         - consistent_hash.rs (ring with virtual nodes)
//!     → per request: Strategy::select(ctx)
//!         → tries groups in configured order (primary, then failover tiers)
//!         → selector picks a healthy host or None
//! ```
//!
//! # Design Decisions
//! - Selectors hold no references to health state; health is read from the
//!   hosts at selection time, so bounded staleness is the only coupling
//! - An empty or all-unhealthy group yields None, never a panic; callers
//!   fail the transaction or try another tier
//! - Selector state is atomic (cursors, latches); `select` never locks

pub mod consistent_hash;
pub mod factory;
pub mod round_robin;

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::schema::HashKey;
use crate::hosts::{Host, HostGroup};

pub use factory::StrategyFactory;

/// Deterministic, fast hash for routing decisions.
///
/// Fixed seeds:
/// - Stable across restarts
/// - Stable across processes
/// - Not security-sensitive
pub(crate) fn affinity_hash<T: std::hash::Hash>(value: &T) -> u64 {
    static HASHER: ahash::RandomState = ahash::RandomState::with_seeds(1, 2, 3, 4);
    HASHER.hash_one(value)
}

/// The five configurable selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    ConsistentHash,
    FirstLive,
    RoundRobinStrict,
    RoundRobinClientIp,
    Latched,
}

impl PolicyKind {
    /// The literal used in the strategies document.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::ConsistentHash => "consistent_hash",
            PolicyKind::FirstLive => "first_live",
            PolicyKind::RoundRobinStrict => "rr_strict",
            PolicyKind::RoundRobinClientIp => "rr_ip",
            PolicyKind::Latched => "latched",
        }
    }
}

/// Per-request inputs a caller extracts before asking for a next hop.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Client address, used by `rr_ip` and `hash_key: client_ip`.
    pub client_ip: Option<IpAddr>,
    /// URL path, the default hash key.
    pub path: Option<String>,
    /// Explicit affinity key supplied by the caller (`hash_key: key`).
    pub key: Option<String>,
}

impl RequestContext {
    /// Resolve the configured hash key to a byte string, if present.
    pub fn hash_input(&self, kind: HashKey) -> Option<String> {
        match kind {
            HashKey::Path => self.path.clone(),
            HashKey::ClientIp => self.client_ip.map(|ip| ip.to_string()),
            HashKey::Key => self.key.clone(),
        }
    }
}

/// A selection algorithm: pick a host from a group given request context
/// and current host health.
pub trait HostSelector: Send + Sync + std::fmt::Debug {
    /// Pick a healthy host, or None if the group has none.
    fn select(&self, ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>>;

    /// The policy this selector implements.
    fn policy(&self) -> PolicyKind;
}

/// One host group paired with its own selector instance. Selector state
/// (cursors, rings, latches) is per tier, never shared across groups.
#[derive(Debug)]
struct Tier {
    group: HostGroup,
    selector: Box<dyn HostSelector>,
}

/// A named, configured strategy: the registry's unit of registration.
/// Immutable after construction; shared across worker threads.
#[derive(Debug)]
pub struct Strategy {
    name: String,
    policy: PolicyKind,
    tiers: Vec<Tier>,
}

impl Strategy {
    /// Build from ordered (group, selector) pairs, primary tier first.
    pub fn new(
        name: impl Into<String>,
        policy: PolicyKind,
        tiers: Vec<(HostGroup, Box<dyn HostSelector>)>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            tiers: tiers
                .into_iter()
                .map(|(group, selector)| Tier { group, selector })
                .collect(),
        }
    }

    /// Strategy name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Policy kind backing this strategy.
    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    /// Number of configured tiers.
    pub fn group_count(&self) -> usize {
        self.tiers.len()
    }

    /// Host group of a given tier.
    pub fn group(&self, idx: usize) -> Option<&HostGroup> {
        self.tiers.get(idx).map(|t| &t.group)
    }

    /// All hosts across all groups, for health collaborators that probe
    /// everything a strategy can route to.
    pub fn all_hosts(&self) -> Vec<Arc<Host>> {
        self.tiers
            .iter()
            .flat_map(|t| t.group.hosts.iter())
            .cloned()
            .collect()
    }

    /// Pick a next hop, trying groups in configured order until one
    /// yields a healthy host.
    pub fn select(&self, ctx: &RequestContext) -> Option<Arc<Host>> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            if let Some(host) = tier.selector.select(ctx, &tier.group.hosts) {
                if idx > 0 {
                    tracing::debug!(
                        strategy = %self.name,
                        tier = idx,
                        host = %host,
                        "primary tier exhausted, selected from failover tier"
                    );
                }
                return Some(host);
            }
        }
        tracing::debug!(strategy = %self.name, "no healthy host available in any tier");
        None
    }

    /// Pick within a single group, for callers that drive tiering
    /// themselves.
    pub fn select_in_group(&self, ctx: &RequestContext, group_idx: usize) -> Option<Arc<Host>> {
        let tier = self.tiers.get(group_idx)?;
        tier.selector.select(ctx, &tier.group.hosts)
    }
}

//! Consistent-hash selection policy.
//!
//! # Responsibilities
//! - Build a hash ring per host group, with virtual-node replication
//! - Map a request-derived key to the ring successor host
//! - Skip unhealthy hosts by walking successors, wrapping once
//!
//! # Design Decisions
//! - Rings are built at strategy construction; group membership is
//!   immutable per loaded config, so a membership change arrives as a
//!   reload that rebuilds the ring
//! - Virtual nodes are keyed by "host:port#replica" under a fixed-seed
//!   hash, making key → host mappings stable across restarts and
//!   processes, and bounding remapping when membership changes
//! - Host weight scales the virtual-node count, so a weight-2.0 host
//!   owns roughly twice the keyspace; weight 0 keeps a host off the ring
//! - A key with no resolvable hash input degrades to first-live order

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::schema::HashKey;
use crate::hosts::Host;
use crate::strategy::{affinity_hash, HostSelector, PolicyKind, RequestContext};

/// A hash ring over one host group. Ring points map to indices into the
/// group's host list.
#[derive(Debug, Default)]
pub struct HashRing {
    points: BTreeMap<u64, usize>,
}

impl HashRing {
    /// Build a ring with `replicas` virtual nodes per unit of host weight.
    pub fn build(hosts: &[Arc<Host>], replicas: usize) -> Self {
        let mut points = BTreeMap::new();
        for (idx, host) in hosts.iter().enumerate() {
            let count = (replicas.max(1) as f32 * host.weight).round() as usize;
            if count == 0 {
                tracing::debug!(host = %host, "weight rounds to zero, host left off the ring");
                continue;
            }
            for replica in 0..count {
                let point = affinity_hash(&format!("{}:{}#{}", host.name, host.port, replica));
                // collisions are vanishingly rare; first host keeps the point
                points.entry(point).or_insert(idx);
            }
        }
        Self { points }
    }

    /// Number of points on the ring.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Host indices in successor order starting at `key`'s position,
    /// wrapping around the ring once. Duplicate hosts are filtered so the
    /// iteration visits each host at most once.
    fn successors(&self, key: u64) -> impl Iterator<Item = usize> + '_ {
        let mut seen = Vec::new();
        self.points
            .range(key..)
            .chain(self.points.range(..key))
            .map(|(_, &idx)| idx)
            .filter(move |idx| {
                if seen.contains(idx) {
                    false
                } else {
                    seen.push(*idx);
                    true
                }
            })
    }
}

/// `consistent_hash`: map the request key onto the ring and take the
/// first healthy successor.
#[derive(Debug)]
pub struct ConsistentHash {
    ring: HashRing,
    hash_key: HashKey,
}

impl ConsistentHash {
    pub fn new(hosts: &[Arc<Host>], replicas: usize, hash_key: HashKey) -> Self {
        Self {
            ring: HashRing::build(hosts, replicas),
            hash_key,
        }
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}

impl HostSelector for ConsistentHash {
    fn select(&self, ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        if hosts.is_empty() {
            return None;
        }

        let Some(input) = ctx.hash_input(self.hash_key) else {
            // nothing to hash on; fall back to list order
            return hosts.iter().find(|h| h.is_healthy()).cloned();
        };

        let key = affinity_hash(&input);
        self.ring
            .successors(key)
            .filter_map(|idx| hosts.get(idx))
            .find(|h| h.is_healthy())
            .cloned()
    }

    fn policy(&self) -> PolicyKind {
        PolicyKind::ConsistentHash
    }
}

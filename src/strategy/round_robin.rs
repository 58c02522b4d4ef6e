//! Round-robin selection policies: strict rotation, client-IP affinity,
//! latched failover, and first-live.
//!
//! # Design Decisions
//! - Cursors are atomics; selection never locks
//! - Rotation runs over the currently healthy hosts, so a full cycle
//!   visits every healthy host exactly once while health is stable
//! - The latched cursor moves only when its host goes unhealthy,
//!   minimizing churn for origins that prefer a stable peer

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::hosts::Host;
use crate::strategy::{affinity_hash, HostSelector, PolicyKind, RequestContext};

fn healthy_hosts(hosts: &[Arc<Host>]) -> Vec<&Arc<Host>> {
    hosts.iter().filter(|h| h.is_healthy()).collect()
}

/// `rr_strict`: rotate through healthy hosts in order.
/// Stores an internal counter to advance the cursor per selection.
#[derive(Debug, Default)]
pub struct RoundRobinStrict {
    counter: AtomicUsize,
}

impl RoundRobinStrict {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostSelector for RoundRobinStrict {
    fn select(&self, _ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        let healthy = healthy_hosts(hosts);
        if healthy.is_empty() {
            return None;
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(healthy[n % healthy.len()].clone())
    }

    fn policy(&self) -> PolicyKind {
        PolicyKind::RoundRobinStrict
    }
}

/// `rr_ip`: cursor position is a deterministic function of the client IP,
/// giving session affinity without shared mutable cursor state.
#[derive(Debug, Default)]
pub struct RoundRobinClientIp;

impl RoundRobinClientIp {
    pub fn new() -> Self {
        Self
    }
}

impl HostSelector for RoundRobinClientIp {
    fn select(&self, ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        let healthy = healthy_hosts(hosts);
        if healthy.is_empty() {
            return None;
        }
        let idx = match ctx.client_ip {
            Some(ip) => (affinity_hash(&ip) as usize) % healthy.len(),
            // no client address to key on; degrade to the first healthy host
            None => 0,
        };
        Some(healthy[idx].clone())
    }

    fn policy(&self) -> PolicyKind {
        PolicyKind::RoundRobinClientIp
    }
}

/// `latched`: stick to one host while it stays healthy; advance to the
/// next healthy host only when the latched one goes down.
#[derive(Debug, Default)]
pub struct Latched {
    latched: AtomicUsize,
}

impl Latched {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostSelector for Latched {
    fn select(&self, _ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        if hosts.is_empty() {
            return None;
        }
        let len = hosts.len();
        let cur = self.latched.load(Ordering::Relaxed) % len;
        if hosts[cur].is_healthy() {
            return Some(hosts[cur].clone());
        }

        // latched host is down; advance to the next healthy one in order
        for step in 1..len {
            let idx = (cur + step) % len;
            if hosts[idx].is_healthy() {
                // first writer wins; a lost race means another thread
                // already re-latched and the cursor converges either way
                let _ = self.latched.compare_exchange(
                    cur,
                    idx,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
                tracing::info!(down = %hosts[cur], next = %hosts[idx], "latched host failed over");
                return Some(hosts[idx].clone());
            }
        }
        None
    }

    fn policy(&self) -> PolicyKind {
        PolicyKind::Latched
    }
}

/// `first_live`: the first healthy host in list order, every call.
/// Stateless, no affinity.
#[derive(Debug, Default)]
pub struct FirstLive;

impl FirstLive {
    pub fn new() -> Self {
        Self
    }
}

impl HostSelector for FirstLive {
    fn select(&self, _ctx: &RequestContext, hosts: &[Arc<Host>]) -> Option<Arc<Host>> {
        hosts.iter().find(|h| h.is_healthy()).cloned()
    }

    fn policy(&self) -> PolicyKind {
        PolicyKind::FirstLive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::HealthState;
    use std::net::IpAddr;

    fn hosts(names: &[&str]) -> Vec<Arc<Host>> {
        names.iter().map(|n| Arc::new(Host::new(*n, 8080))).collect()
    }

    fn ctx_with_ip(ip: &str) -> RequestContext {
        RequestContext {
            client_ip: Some(ip.parse::<IpAddr>().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rr_strict_cycles_all_healthy_before_repeating() {
        let lb = RoundRobinStrict::new();
        let hs = hosts(&["a", "b", "c"]);
        let ctx = RequestContext::default();

        let picks: Vec<String> = (0..4).map(|_| lb.select(&ctx, &hs).unwrap().name.clone()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_rr_strict_skips_unhealthy() {
        let lb = RoundRobinStrict::new();
        let hs = hosts(&["a", "b", "c"]);
        hs[1].set_state(HealthState::Unhealthy);
        let ctx = RequestContext::default();

        let picks: Vec<String> = (0..4).map(|_| lb.select(&ctx, &hs).unwrap().name.clone()).collect();
        assert_eq!(picks, vec!["a", "c", "a", "c"]);
    }

    #[test]
    fn test_rr_strict_all_down_is_none() {
        let lb = RoundRobinStrict::new();
        let hs = hosts(&["a", "b"]);
        hs[0].set_state(HealthState::Unhealthy);
        hs[1].set_state(HealthState::Unhealthy);
        assert!(lb.select(&RequestContext::default(), &hs).is_none());
        assert!(lb.select(&RequestContext::default(), &[]).is_none());
    }

    #[test]
    fn test_rr_ip_affinity_is_deterministic() {
        let lb = RoundRobinClientIp::new();
        let hs = hosts(&["a", "b", "c"]);
        let ctx = ctx_with_ip("203.0.113.7");

        let first = lb.select(&ctx, &hs).unwrap().name.clone();
        for _ in 0..10 {
            assert_eq!(lb.select(&ctx, &hs).unwrap().name, first);
        }
    }

    #[test]
    fn test_rr_ip_without_ip_falls_back_to_first_healthy() {
        let lb = RoundRobinClientIp::new();
        let hs = hosts(&["a", "b"]);
        hs[0].set_state(HealthState::Unhealthy);
        let picked = lb.select(&RequestContext::default(), &hs).unwrap();
        assert_eq!(picked.name, "b");
    }

    #[test]
    fn test_latched_sticks_while_healthy() {
        let lb = Latched::new();
        let hs = hosts(&["a", "b", "c"]);
        let ctx = RequestContext::default();

        for _ in 0..50 {
            assert_eq!(lb.select(&ctx, &hs).unwrap().name, "a");
        }
    }

    #[test]
    fn test_latched_advances_on_failure_and_relatches() {
        let lb = Latched::new();
        let hs = hosts(&["a", "b", "c"]);
        let ctx = RequestContext::default();

        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "a");

        hs[0].set_state(HealthState::Unhealthy);
        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "b");

        // a recovering does not pull the latch back
        hs[0].set_state(HealthState::Healthy);
        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "b");

        hs[1].set_state(HealthState::Unhealthy);
        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "c");
    }

    #[test]
    fn test_latched_all_down_is_none() {
        let lb = Latched::new();
        let hs = hosts(&["a", "b"]);
        hs[0].set_state(HealthState::Unhealthy);
        hs[1].set_state(HealthState::Unhealthy);
        assert!(lb.select(&RequestContext::default(), &hs).is_none());
    }

    #[test]
    fn test_first_live_prefers_list_order() {
        let lb = FirstLive::new();
        let hs = hosts(&["a", "b", "c"]);
        let ctx = RequestContext::default();

        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "a");
        hs[0].set_state(HealthState::Unhealthy);
        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "b");
        // a comes back: first_live returns to it immediately
        hs[0].set_state(HealthState::Healthy);
        assert_eq!(lb.select(&ctx, &hs).unwrap().name, "a");
    }
}

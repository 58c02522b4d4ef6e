//! Next-hop selection strategies for a reverse-proxy routing layer.
//!
//! # Architecture Overview
//!
//! ```text
//! strategies.yaml (#include, directory composition)
//!     → config::document (flatten to one merged document)
//!     → strategy::factory (policy table → Strategy instances)
//!     → registry::StrategyRegistry (name → strategy, registration order)
//!     → registry::SharedRegistry (atomic swap, lock-free readers)
//!
//! per request (external HTTP collaborator):
//!     shared.lookup(name) → StrategyHandle
//!     handle.select(RequestContext) → Arc<Host> | None
//! ```
//!
//! Host health is owned by an external health-monitoring collaborator: it
//! calls `Host::mark_success` / `Host::mark_failure`, and selection reads
//! the resulting state without locking.

pub mod config;
pub mod error;
pub mod hosts;
pub mod registry;
pub mod strategy;

pub use config::StrategyWatcher;
pub use error::ConfigError;
pub use hosts::{HealthState, Host, HostGroup};
pub use registry::{SharedRegistry, StrategyHandle, StrategyRegistry};
pub use strategy::{HostSelector, PolicyKind, RequestContext, Strategy, StrategyFactory};

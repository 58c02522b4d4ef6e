//! Strategy configuration subsystem.
//!
//! # Data Flow
//! ```text
//! strategies source (file or directory)
//!     → document.rs (flatten: #include resolution / lexicographic concat)
//!     → schema.rs (per-entry serde deserialization)
//!     → strategy::factory (policy table → Strategy instances)
//!     → StrategyRegistry, published via atomic swap
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → factory reloads from the same source
//!     → success: new registry sent for publication
//!     → failure: logged, previous registry keeps serving
//! ```
//!
//! # Design Decisions
//! - A registry is immutable once built; changes require a full reload
//! - Per-entry errors are recoverable; document-level errors abort a load
//! - Loading never mutates global state; publication is the only side
//!   effect and it is a single atomic swap

pub mod document;
pub mod schema;
pub mod watcher;

pub use schema::{FailoverConfig, GroupEntry, HashKey, HostEntry, StrategyEntry};
pub use watcher::StrategyWatcher;

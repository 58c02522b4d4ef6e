//! Error types for strategy configuration loading.
//!
//! # Design Decisions
//! - Load-level errors (`Read`, `Parse`, `Malformed`) abort the in-progress
//!   load only; the previously published registry keeps serving
//! - Per-entry errors (`InvalidPolicy`, `DuplicateStrategy`, `InvalidEntry`)
//!   are recoverable: the factory logs them, skips the entry, and continues
//! - "No healthy host" is a normal `None` selection result, not an error

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for strategy configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file or directory in the load (top-level or `#include`d) could not
    /// be read. Fatal to the current load, never to the process.
    #[error("unable to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The flattened document is not valid YAML.
    #[error("malformed strategies document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed as YAML but its top-level shape is wrong
    /// (e.g. `strategies` is not a sequence).
    #[error("malformed strategies document: {0}")]
    Malformed(String),

    /// A strategy entry names a policy outside the known set.
    /// Recoverable: the entry is skipped and the load continues.
    #[error("invalid policy '{policy}' for the strategy named '{strategy}'")]
    InvalidPolicy { strategy: String, policy: String },

    /// A strategy entry re-uses a name already registered in this load.
    /// Recoverable: the later entry is skipped, the first wins.
    #[error("a strategy named '{0}' has already been loaded")]
    DuplicateStrategy(String),

    /// A strategy entry failed field-level validation.
    /// Recoverable: the entry is skipped and the load continues.
    #[error("invalid entry for the strategy named '{strategy}': {reason}")]
    InvalidEntry { strategy: String, reason: String },
}

impl ConfigError {
    /// Whether this error invalidates the whole load (as opposed to a
    /// single entry).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConfigError::Read { .. } | ConfigError::Parse(_) | ConfigError::Malformed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        let read = ConfigError::Read {
            path: "hosts.yaml".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(read.is_fatal());

        let dup = ConfigError::DuplicateStrategy("primary".into());
        assert!(!dup.is_fatal());

        let policy = ConfigError::InvalidPolicy {
            strategy: "primary".into(),
            policy: "round_rubin".into(),
        };
        assert!(!policy.is_fatal());
    }
}

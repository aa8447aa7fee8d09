//! Interpreter configuration

use super::constants::{DEFAULT_GC_BALLAST, DEFAULT_SNAPSHOT_LIMIT, DEFAULT_STACK_LIMIT};

/// Tunables of one interpreter instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum frame depth before a stack error
    pub stack_limit: usize,
    /// Bytes allocated between collections
    pub gc_ballast: usize,
    /// Record inspector snapshots
    pub snapshots: bool,
    /// Memory budget for recorded snapshots
    pub snapshot_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stack_limit: DEFAULT_STACK_LIMIT,
            gc_ballast: DEFAULT_GC_BALLAST,
            snapshots: false,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
        }
    }
}

impl Config {
    /// Defaults overridden by `REBOUND_STACK_LIMIT`, `REBOUND_GC_BALLAST` and
    /// `REBOUND_SNAPSHOT_LIMIT`. Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(limit) = env_usize("REBOUND_STACK_LIMIT") {
            config.stack_limit = limit;
        }
        if let Some(ballast) = env_usize("REBOUND_GC_BALLAST") {
            config.gc_ballast = ballast;
        }
        if let Some(limit) = env_usize("REBOUND_SNAPSHOT_LIMIT") {
            config.snapshot_limit = limit;
        }
        config
    }

    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.stack_limit = limit;
        self
    }

    pub fn with_gc_ballast(mut self, ballast: usize) -> Self {
        self.gc_ballast = ballast;
        self
    }

    pub fn with_snapshots(mut self, limit: usize) -> Self {
        self.snapshots = true;
        self.snapshot_limit = limit;
        self
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = Config::default().with_stack_limit(64).with_gc_ballast(4096);
        assert_eq!(config.stack_limit, 64);
        assert_eq!(config.gc_ballast, 4096);
        assert!(!config.snapshots);
        assert!(Config::default().with_snapshots(1024).snapshots);
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longest wait for the device-access lock or the submit gate
    pub lock_timeout_ms: u64,

    /// Bounded join when shutting the worker and pool down
    pub shutdown_timeout_ms: u64,

    /// Threads serving fire-and-forget commands
    pub background_workers: usize,

    /// Pending fire-and-forget commands before submissions are refused
    pub background_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 30_000,
            shutdown_timeout_ms: 5_000,
            background_workers: 2,
            background_queue: 32,
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Pool size with the floor of one worker applied.
    pub fn pool_size(&self) -> usize {
        self.background_workers.max(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.background_queue.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.pool_size(), 2);
    }

    #[test]
    fn test_zero_sizes_are_clamped() {
        let config = EngineConfig {
            background_workers: 0,
            background_queue: 0,
            ..Default::default()
        };
        assert_eq!(config.pool_size(), 1);
        assert_eq!(config.queue_capacity(), 1);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("lock_timeout_ms: 250\n").unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.background_queue, 32);
    }
}

// ============================================================================
// Camera Configuration
// ============================================================================
//
// Loaded from YAML; every field has a default so partial files are fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::{CameraError, CameraResult};

/// Live-view pump tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveViewConfig {
    /// Pause before polling again after a not-ready status
    pub frame_retry_interval_ms: u64,

    /// Consecutive not-ready polls tolerated before the pump gives up (0 = no cap)
    pub frame_retry_limit: u32,

    /// Bounded wait for the pump to exit on stop
    pub stop_timeout_ms: u64,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            frame_retry_interval_ms: 50,
            frame_retry_limit: 200,
            stop_timeout_ms: 3_000,
        }
    }
}

impl LiveViewConfig {
    pub fn frame_retry_interval(&self) -> Duration {
        Duration::from_millis(self.frame_retry_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn retry_limit(&self) -> Option<u32> {
        (self.frame_retry_limit > 0).then_some(self.frame_retry_limit)
    }
}

/// Session controller configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where downloaded images and movies are written
    pub download_dir: PathBuf,

    /// Decode downloaded stills into a pixel buffer
    pub decode_images: bool,

    /// Extend the device shutdown timer whenever it warns
    pub keep_alive: bool,

    /// Publish lock timeouts to subscribers, not just the log
    pub notify_lock_timeouts: bool,

    pub live_view: LiveViewConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir().join("tether_camera"),
            decode_images: true,
            keep_alive: false,
            notify_lock_timeouts: false,
            live_view: LiveViewConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub engine: EngineConfig,
    pub session: SessionConfig,
}

impl CameraConfig {
    pub fn from_yaml_str(contents: &str) -> CameraResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_yaml_file(path: &Path) -> CameraResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CameraError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_yaml() {
        let yaml = "
engine:
  lock_timeout_ms: 1000
session:
  keep_alive: true
  live_view:
    frame_retry_limit: 0
";
        let config = CameraConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.engine.lock_timeout_ms, 1000);
        assert_eq!(config.engine.background_workers, 2);
        assert!(config.session.keep_alive);
        assert_eq!(config.session.live_view.retry_limit(), None);
        assert_eq!(config.session.live_view.stop_timeout_ms, 3_000);
    }

    #[test]
    fn test_bad_yaml_is_config_error() {
        let err = CameraConfig::from_yaml_str("engine: [1, 2").unwrap_err();
        assert!(matches!(err, CameraError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.yaml");
        std::fs::write(&path, "session:\n  decode_images: false\n").unwrap();
        let config = CameraConfig::from_yaml_file(&path).unwrap();
        assert!(!config.session.decode_images);
        assert_eq!(config.session.live_view.retry_limit(), Some(200));
    }
}

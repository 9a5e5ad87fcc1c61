// ============================================================================
// Error Types
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sdk::{PropertyEncoding, PropertyId, SdkStatus};
use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("{operation} failed: {status}")]
    Sdk {
        operation: &'static str,
        status: SdkStatus,
    },

    #[error("timed out after {timeout:?} waiting for the {lock} lock")]
    LockTimeout {
        lock: &'static str,
        timeout: Duration,
    },

    #[error("no camera session is open")]
    SessionNotOpen,

    #[error("property {property} is encoded as {expected:?}, not {requested:?}")]
    WrongEncoding {
        property: PropertyId,
        expected: PropertyEncoding,
        requested: PropertyEncoding,
    },

    #[error("text payload is {len} bytes, the device accepts at most {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("text payload must be ASCII")]
    TextNotAscii,

    #[error("cannot {operation} while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("live view produced no frame after {attempts} not-ready polls")]
    LiveViewStalled { attempts: u32 },

    #[error("execution engine has not been initialized")]
    EngineNotInitialized,

    #[error("execution engine has been shut down")]
    EngineStopped,

    #[error("background queue is full, dropped {command}")]
    QueueFull { command: &'static str },

    #[error("command {command} panicked: {message}")]
    CommandPanicked {
        command: &'static str,
        message: String,
    },

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CameraError {
    pub fn sdk(operation: &'static str, status: SdkStatus) -> Self {
        CameraError::Sdk { operation, status }
    }

    pub fn status(&self) -> Option<SdkStatus> {
        match self {
            CameraError::Sdk { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient "frame not ready" status, retried by the live-view pump.
    pub fn is_not_ready(&self) -> bool {
        self.status().is_some_and(SdkStatus::is_not_ready)
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, CameraError::LockTimeout { .. })
    }

    /// Failures signalled to the caller before any device call was made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CameraError::SessionNotOpen
                | CameraError::WrongEncoding { .. }
                | CameraError::TextTooLong { .. }
                | CameraError::TextNotAscii
                | CameraError::InvalidState { .. }
        )
    }
}

pub type CameraResult<T> = Result<T, CameraError>;

// ============================================================================
// Error records (what subscribers see)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Informational,
    /// Reserved for connection loss: disconnect, invalid or missing device.
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: u32,
    pub name: String,
    pub severity: Severity,
    pub context: String,
}

impl ErrorRecord {
    pub fn from_status(status: SdkStatus, context: impl Into<String>) -> Self {
        let severity = if status.is_connection_loss() {
            Severity::Critical
        } else {
            Severity::Informational
        };
        Self {
            code: status.0,
            name: status.name().to_string(),
            severity,
            context: context.into(),
        }
    }

    /// Record for a failure that is not a native status.
    pub fn from_error(error: &CameraError) -> Self {
        match error {
            CameraError::Sdk { operation, status } => Self::from_status(*status, *operation),
            other => Self {
                code: crate::tables::UNKNOWN_ID,
                name: crate::tables::UNKNOWN_NAME.to_string(),
                severity: Severity::Informational,
                context: other.to_string(),
            },
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_is_critical() {
        for status in [
            SdkStatus::DEVICE_NOT_FOUND,
            SdkStatus::DEVICE_INVALID,
            SdkStatus::COMM_DISCONNECTED,
        ] {
            assert!(ErrorRecord::from_status(status, "open").is_critical());
        }
        let stale = ErrorRecord::from_status(SdkStatus::INVALID_HANDLE, "item_info");
        assert_eq!(stale.severity, Severity::Informational);
        let busy = ErrorRecord::from_status(SdkStatus::DEVICE_BUSY, "shutter");
        assert_eq!(busy.severity, Severity::Informational);
        assert_eq!(busy.name, "DEVICE_BUSY");
    }

    #[test]
    fn test_not_ready_detection() {
        assert!(CameraError::sdk("evf", SdkStatus::OBJECT_NOTREADY).is_not_ready());
        assert!(!CameraError::sdk("evf", SdkStatus::DEVICE_BUSY).is_not_ready());
        assert!(!CameraError::SessionNotOpen.is_not_ready());
    }

    #[test]
    fn test_non_sdk_record_keeps_message() {
        let record = ErrorRecord::from_error(&CameraError::LiveViewStalled { attempts: 3 });
        assert_eq!(record.severity, Severity::Informational);
        assert!(record.context.contains("3 not-ready"));
    }
}

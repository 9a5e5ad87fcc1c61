// ============================================================================
// Execution Engine Types
// ============================================================================

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use crate::error::{CameraError, CameraResult};
use crate::sdk::CameraSdk;

use super::executor::EngineShared;

/// Body of a command: runs with exclusive access to the device.
pub type Action = Box<dyn FnOnce(&dyn CameraSdk) -> CameraResult<()> + Send + 'static>;

/// Destination for failures that have no caller waiting on them.
pub type ErrorSink = Arc<dyn Fn(CameraError) + Send + Sync>;

/// A unit of device work plus its name for logs and error reports.
pub struct Command {
    name: &'static str,
    action: Action,
}

impl Command {
    pub fn new<F>(name: &'static str, action: F) -> Self
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<()> + Send + 'static,
    {
        Self {
            name,
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn into_parts(self) -> (&'static str, Action) {
        (self.name, self.action)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}

/// How a command is handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitMode {
    /// Run on the worker and wait for the result.
    Blocking,
    /// Run on the background pool; failures go to the error sink.
    FireAndForget,
}

/// Work executed by the worker or a pool thread.
pub(crate) type Task = Box<dyn FnOnce(&EngineShared) + Send + 'static>;

pub(crate) enum WorkerMessage {
    Run(Task),
    Shutdown,
}

// ============================================================================
// Device context
// ============================================================================
//
// Marks the threads currently allowed to touch the device for a given engine:
// the worker for its whole life, pool and pump threads while they hold the
// device-access lock.

thread_local! {
    static CURRENT_ENGINE: Cell<Option<u64>> = const { Cell::new(None) };
}

pub(crate) fn in_context(engine_id: u64) -> bool {
    CURRENT_ENGINE.with(|current| current.get() == Some(engine_id))
}

pub(crate) struct ContextGuard {
    previous: Option<u64>,
}

impl ContextGuard {
    pub(crate) fn enter(engine_id: u64) -> Self {
        let previous = CURRENT_ENGINE.with(|current| current.replace(Some(engine_id)));
        Self { previous }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_ENGINE.with(|current| current.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_guard_nests() {
        assert!(!in_context(7));
        {
            let _outer = ContextGuard::enter(7);
            assert!(in_context(7));
            {
                let _inner = ContextGuard::enter(8);
                assert!(in_context(8));
                assert!(!in_context(7));
            }
            assert!(in_context(7));
        }
        assert!(!in_context(7));
    }

    #[test]
    fn test_context_is_per_thread() {
        let _guard = ContextGuard::enter(3);
        let seen = std::thread::spawn(|| in_context(3)).join().unwrap();
        assert!(!seen);
        assert!(in_context(3));
    }
}

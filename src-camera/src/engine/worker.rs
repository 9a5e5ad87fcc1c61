// ============================================================================
// Worker Thread - The Device's Home Thread
// ============================================================================
//
// Long-lived thread that runs blocking commands one at a time. It stays in
// the engine's device context for its whole life so callbacks fired on it can
// submit nested work inline.

use std::sync::Weak;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::executor::EngineShared;
use super::types::{ContextGuard, WorkerMessage};
use crate::error::{CameraError, CameraResult};

/// Worker thread handle
pub(crate) struct WorkerThread {
    message_tx: Sender<WorkerMessage>,
    exited_rx: Receiver<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    /// Create and start the worker thread
    pub(crate) fn new(shared: Weak<EngineShared>, engine_id: u64) -> CameraResult<Self> {
        let (message_tx, message_rx) = channel::unbounded();
        let (exited_tx, exited_rx) = channel::bounded::<()>(0);

        let thread_handle = std::thread::Builder::new()
            .name("camera-worker".to_string())
            .spawn(move || {
                let _exited = exited_tx;
                run_worker_thread(shared, engine_id, message_rx);
            })
            .map_err(|source| CameraError::Spawn {
                thread: "camera-worker",
                source,
            })?;

        Ok(Self {
            message_tx,
            exited_rx,
            thread_handle: Some(thread_handle),
        })
    }

    pub(crate) fn sender(&self) -> Sender<WorkerMessage> {
        self.message_tx.clone()
    }

    /// Ask the worker to exit and wait for it until `deadline`.
    ///
    /// When called from the worker itself the join is skipped; the worker
    /// picks up the shutdown message once the current command returns.
    pub(crate) fn shutdown(&mut self, deadline: Instant) {
        self.message_tx.send(WorkerMessage::Shutdown).ok();
        let on_worker = self
            .thread_handle
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == std::thread::current().id());
        if on_worker {
            self.thread_handle.take();
            return;
        }

        match self.exited_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("[Worker] Did not exit in time, detaching");
                self.thread_handle.take();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.thread_handle.take() {
                    handle.join().ok();
                }
            }
        }
    }
}

/// Main worker thread function
fn run_worker_thread(
    shared: Weak<EngineShared>,
    engine_id: u64,
    message_rx: Receiver<WorkerMessage>,
) {
    let _context = ContextGuard::enter(engine_id);
    log::debug!("[Worker] Started for engine {}", engine_id);

    for message in message_rx.iter() {
        match message {
            WorkerMessage::Run(task) => match shared.upgrade() {
                Some(shared) => task(&shared),
                None => break,
            },
            WorkerMessage::Shutdown => break,
        }
    }

    log::debug!("[Worker] Stopped for engine {}", engine_id);
}

// ============================================================================
// Background Pool - Fire-and-Forget Commands
// ============================================================================
//
// A fixed set of threads fed by a bounded queue. Long device operations
// (shutter, bulb, downloads) run here so they don't hold up the worker; they
// still take the engine's device-access lock before touching the device.

use std::sync::Weak;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use super::executor::EngineShared;
use super::types::Task;
use crate::error::{CameraError, CameraResult};

pub(crate) struct BackgroundPool {
    queue_tx: Option<Sender<Task>>,
    exited_rx: Receiver<()>,
    threads: Vec<JoinHandle<()>>,
}

impl BackgroundPool {
    pub(crate) fn new(
        shared: Weak<EngineShared>,
        workers: usize,
        capacity: usize,
    ) -> CameraResult<Self> {
        let (queue_tx, queue_rx) = channel::bounded::<Task>(capacity);
        let (exited_tx, exited_rx) = channel::bounded::<()>(0);

        let mut threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let queue_rx = queue_rx.clone();
            let exited_tx = exited_tx.clone();
            let shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("camera-bg-{}", index))
                .spawn(move || {
                    let _exited = exited_tx;
                    run_pool_thread(shared, index, queue_rx);
                })
                .map_err(|source| CameraError::Spawn {
                    thread: "camera-bg",
                    source,
                })?;
            threads.push(handle);
        }

        log::debug!(
            "[Pool] Started {} background workers (queue capacity {})",
            workers,
            capacity
        );

        Ok(Self {
            queue_tx: Some(queue_tx),
            exited_rx,
            threads,
        })
    }

    /// Queue a task without blocking.
    pub(crate) fn try_submit(&self, name: &'static str, task: Task) -> CameraResult<()> {
        let Some(queue_tx) = self.queue_tx.as_ref() else {
            return Err(CameraError::EngineStopped);
        };
        match queue_tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CameraError::QueueFull { command: name }),
            Err(TrySendError::Disconnected(_)) => Err(CameraError::EngineStopped),
        }
    }

    /// Close the queue and wait for the threads until `deadline`.
    ///
    /// Tasks already queued still run before the threads exit.
    pub(crate) fn shutdown(&mut self, deadline: Instant) {
        self.queue_tx.take();
        let current = std::thread::current().id();
        if self.threads.iter().any(|handle| handle.thread().id() == current) {
            self.threads.clear();
            return;
        }

        match self.exited_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "[Pool] {} background workers still busy at shutdown, detaching",
                    self.threads.iter().filter(|t| !t.is_finished()).count()
                );
                self.threads.clear();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                for handle in self.threads.drain(..) {
                    handle.join().ok();
                }
            }
        }
    }
}

fn run_pool_thread(shared: Weak<EngineShared>, index: usize, queue_rx: Receiver<Task>) {
    log::trace!("[Pool] Worker {} started", index);

    for task in queue_rx.iter() {
        match shared.upgrade() {
            Some(shared) => task(&shared),
            None => break,
        }
    }

    log::trace!("[Pool] Worker {} stopped", index);
}

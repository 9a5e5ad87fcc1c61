// ============================================================================
// Execution Engine - Serialized Device Access
// ============================================================================
//
// Every device call goes through here. Blocking commands are handed to the
// worker thread and the caller waits for the result; fire-and-forget commands
// go to the background pool. Both paths, and the live-view pump, take the
// same reentrant device-access lock, so at most one device call runs at any
// instant.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use super::EngineConfig;
use super::pool::BackgroundPool;
use super::types::{
    Command, ContextGuard, ErrorSink, SubmitMode, Task, WorkerMessage, in_context,
};
use super::worker::WorkerThread;
use crate::error::{CameraError, CameraResult};
use crate::sdk::CameraSdk;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

enum Lifecycle {
    Created,
    Running(Threads),
    Stopped,
}

struct Threads {
    worker: WorkerThread,
    pool: BackgroundPool,
}

impl Threads {
    fn shutdown(&mut self, deadline: Instant) {
        self.worker.shutdown(deadline);
        self.pool.shutdown(deadline);
    }
}

/// State shared by the engine handles, the worker and the pool threads.
pub(crate) struct EngineShared {
    id: u64,
    sdk: Arc<dyn CameraSdk>,
    config: EngineConfig,
    device_lock: ReentrantMutex<()>,
    submit_gate: Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
    error_sink: RwLock<Option<ErrorSink>>,
}

impl EngineShared {
    /// Run `f` on the current thread with exclusive device access.
    pub(crate) fn exclusive<T, F>(&self, name: &'static str, f: F) -> CameraResult<T>
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<T>,
    {
        let timeout = self.config.lock_timeout();
        let Some(_device) = self.device_lock.try_lock_for(timeout) else {
            log::error!(
                "[Engine] {} gave up waiting {:?} for the device lock",
                name,
                timeout
            );
            return Err(CameraError::LockTimeout {
                lock: "device-access",
                timeout,
            });
        };
        let _context = ContextGuard::enter(self.id);

        let sdk = self.sdk.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| f(sdk))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("[Engine] Command {} panicked: {}", name, message);
                Err(CameraError::CommandPanicked {
                    command: name,
                    message,
                })
            }
        }
    }

    /// Route a failure nobody is waiting on.
    pub(crate) fn report(&self, error: CameraError) {
        log::warn!("[Engine] Background failure: {}", error);
        let sink = self.error_sink.read().clone();
        if let Some(sink) = sink {
            sink(error);
        }
    }

    fn worker_sender(&self) -> CameraResult<Sender<WorkerMessage>> {
        match &*self.lifecycle.lock() {
            Lifecycle::Created => Err(CameraError::EngineNotInitialized),
            Lifecycle::Running(threads) => Ok(threads.worker.sender()),
            Lifecycle::Stopped => Err(CameraError::EngineStopped),
        }
    }

    fn ensure_running(&self) -> CameraResult<()> {
        match &*self.lifecycle.lock() {
            Lifecycle::Created => Err(CameraError::EngineNotInitialized),
            Lifecycle::Running(_) => Ok(()),
            Lifecycle::Stopped => Err(CameraError::EngineStopped),
        }
    }

    fn shutdown(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(mut threads) => {
                let deadline = Instant::now() + self.config.shutdown_timeout();
                threads.shutdown(deadline);
                true
            }
            Lifecycle::Created | Lifecycle::Stopped => false,
        }
    }
}

impl Drop for EngineShared {
    fn drop(&mut self) {
        if self.shutdown() {
            log::debug!("[Engine] Engine {} dropped while running, stopped", self.id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to an execution engine. Clones share the same worker.
#[derive(Clone)]
pub struct ExecutionEngine {
    shared: Arc<EngineShared>,
}

impl ExecutionEngine {
    pub fn new(sdk: Arc<dyn CameraSdk>, config: EngineConfig) -> Self {
        let shared = EngineShared {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            sdk,
            config,
            device_lock: ReentrantMutex::new(()),
            submit_gate: Mutex::new(()),
            lifecycle: Mutex::new(Lifecycle::Created),
            error_sink: RwLock::new(None),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Start the worker and the background pool. Calling it again is a no-op.
    pub fn initialize(&self) -> CameraResult<()> {
        let mut lifecycle = self.shared.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped => return Err(CameraError::EngineStopped),
            Lifecycle::Created => {}
        }

        let weak: Weak<EngineShared> = Arc::downgrade(&self.shared);
        let config = &self.shared.config;
        let worker = WorkerThread::new(weak.clone(), self.shared.id)?;
        let pool = match BackgroundPool::new(weak, config.pool_size(), config.queue_capacity()) {
            Ok(pool) => pool,
            Err(e) => {
                let mut worker = worker;
                worker.shutdown(Instant::now() + config.shutdown_timeout());
                return Err(e);
            }
        };

        *lifecycle = Lifecycle::Running(Threads { worker, pool });
        log::info!(
            "[Engine] Engine {} started ({} background workers)",
            self.shared.id,
            config.pool_size()
        );
        Ok(())
    }

    /// Stop the worker and the pool, waiting at most `shutdown_timeout`.
    pub fn shutdown(&self) {
        if self.shared.shutdown() {
            log::info!("[Engine] Engine {} stopped", self.shared.id);
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.shared.lifecycle.lock(), Lifecycle::Running(_))
    }

    /// Whether the calling thread currently has this engine's device context.
    pub fn in_device_context(&self) -> bool {
        in_context(self.shared.id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Where fire-and-forget failures are sent. Defaults to logging only.
    pub fn set_error_sink(&self, sink: ErrorSink) {
        *self.shared.error_sink.write() = Some(sink);
    }

    pub fn clear_error_sink(&self) {
        *self.shared.error_sink.write() = None;
    }

    /// Submit a command.
    ///
    /// After [`shutdown`](Self::shutdown) this is a no-op that returns `Ok`.
    pub fn submit(&self, command: Command, mode: SubmitMode) -> CameraResult<()> {
        match self.shared.ensure_running() {
            Ok(()) => {}
            Err(CameraError::EngineStopped) => {
                log::debug!("[Engine] Ignoring {} submitted after shutdown", command.name());
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let (name, action) = command.into_parts();
        match mode {
            SubmitMode::Blocking => self.call(name, action),
            SubmitMode::FireAndForget => self.spawn(name, action),
        }
    }

    /// Run `f` as a blocking command and return its value.
    ///
    /// From inside the device context `f` runs inline, otherwise it is handed
    /// to the worker and the caller waits for completion.
    pub fn call<T, F>(&self, name: &'static str, f: F) -> CameraResult<T>
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = &self.shared;
        if in_context(shared.id) {
            shared.ensure_running()?;
            return shared.exclusive(name, f);
        }

        let worker_tx = shared.worker_sender()?;
        let timeout = shared.config.lock_timeout();
        let Some(_gate) = shared.submit_gate.try_lock_for(timeout) else {
            log::error!(
                "[Engine] {} gave up waiting {:?} for the submit gate",
                name,
                timeout
            );
            return Err(CameraError::LockTimeout {
                lock: "submit-gate",
                timeout,
            });
        };

        let (done_tx, done_rx) = channel::bounded::<CameraResult<T>>(1);
        let task: Task = Box::new(move |shared: &EngineShared| {
            let result = shared.exclusive(name, f);
            done_tx.send(result).ok();
        });
        worker_tx
            .send(WorkerMessage::Run(task))
            .map_err(|_| CameraError::EngineStopped)?;

        // A dropped task (worker gone) disconnects the channel.
        done_rx.recv().map_err(|_| CameraError::EngineStopped)?
    }

    /// Queue `f` on the background pool; failures go to the error sink.
    pub fn spawn<F>(&self, name: &'static str, f: F) -> CameraResult<()>
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<()> + Send + 'static,
    {
        let task: Task = Box::new(move |shared: &EngineShared| {
            if let Err(e) = shared.exclusive(name, f) {
                shared.report(e);
            }
        });
        self.enqueue(name, task)
    }

    /// Queue `f` on the background pool without taking the device lock.
    ///
    /// For jobs that wait between device calls (bulb exposure); `f` takes the
    /// lock itself through [`exclusive`](Self::exclusive) for each call.
    pub fn background<F>(&self, name: &'static str, f: F) -> CameraResult<()>
    where
        F: FnOnce(&ExecutionEngine) -> CameraResult<()> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.shared);
        let task: Task = Box::new(move |_: &EngineShared| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let engine = ExecutionEngine { shared };
            let result = match panic::catch_unwind(AssertUnwindSafe(|| f(&engine))) {
                Ok(result) => result,
                Err(payload) => Err(CameraError::CommandPanicked {
                    command: name,
                    message: panic_message(payload.as_ref()),
                }),
            };
            if let Err(e) = result {
                engine.shared.report(e);
            }
        });
        self.enqueue(name, task)
    }

    fn enqueue(&self, name: &'static str, task: Task) -> CameraResult<()> {
        let lifecycle = self.shared.lifecycle.lock();
        let result = match &*lifecycle {
            Lifecycle::Created => Err(CameraError::EngineNotInitialized),
            Lifecycle::Running(threads) => threads.pool.try_submit(name, task),
            Lifecycle::Stopped => Err(CameraError::EngineStopped),
        };
        drop(lifecycle);

        if let Err(CameraError::QueueFull { command }) = &result {
            log::warn!("[Engine] Background queue full, refused {}", command);
            self.shared.report(CameraError::QueueFull { command: *command });
        }
        result
    }

    /// Run `f` on the calling thread with exclusive device access.
    ///
    /// Used by loops that own their thread but must not overlap with the
    /// worker, such as the live-view pump.
    pub fn exclusive<T, F>(&self, name: &'static str, f: F) -> CameraResult<T>
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<T>,
    {
        self.shared.ensure_running()?;
        self.shared.exclusive(name, f)
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("id", &self.shared.id)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedCamera;
    use std::time::Duration;

    fn engine() -> ExecutionEngine {
        let engine = ExecutionEngine::new(Arc::new(SimulatedCamera::new()), EngineConfig::default());
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn test_submit_before_initialize_fails() {
        let engine = ExecutionEngine::new(Arc::new(SimulatedCamera::new()), EngineConfig::default());
        let err = engine
            .submit(Command::new("noop", |_| Ok(())), SubmitMode::Blocking)
            .unwrap_err();
        assert!(matches!(err, CameraError::EngineNotInitialized));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let engine = engine();
        engine.initialize().unwrap();
        assert!(engine.is_running());
        engine.shutdown();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_call_runs_on_worker_thread() {
        let engine = engine();
        let name = engine
            .call("thread-name", |_| {
                Ok(std::thread::current().name().map(str::to_string))
            })
            .unwrap();
        assert_eq!(name.as_deref(), Some("camera-worker"));
        assert!(!engine.in_device_context());
    }

    #[test]
    fn test_panic_is_returned_as_error() {
        let engine = engine();
        let err = engine
            .call::<(), _>("boom", |_| panic!("synthetic failure"))
            .unwrap_err();
        match err {
            CameraError::CommandPanicked { command, message } => {
                assert_eq!(command, "boom");
                assert!(message.contains("synthetic failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.call("after", |_| Ok(5)).unwrap(), 5);
    }

    #[test]
    fn test_submit_after_shutdown_is_noop() {
        let engine = engine();
        engine.shutdown();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        engine
            .submit(
                Command::new("late", move |_| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
                SubmitMode::Blocking,
            )
            .unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert!(matches!(
            engine.call("late", |_| Ok(())),
            Err(CameraError::EngineStopped)
        ));
        assert!(matches!(engine.initialize(), Err(CameraError::EngineStopped)));
    }

    #[test]
    fn test_device_lock_timeout_aborts_only_that_operation() {
        let config = EngineConfig {
            lock_timeout_ms: 50,
            ..Default::default()
        };
        let engine = ExecutionEngine::new(Arc::new(SimulatedCamera::new()), config);
        engine.initialize().unwrap();

        let (held_tx, held_rx) = channel::bounded::<()>(0);
        let (release_tx, release_rx) = channel::bounded::<()>(0);
        let holder = engine.clone();
        let thread = std::thread::spawn(move || {
            holder
                .exclusive("hold", |_| {
                    held_tx.send(()).ok();
                    release_rx.recv().ok();
                    Ok(())
                })
                .unwrap();
        });

        held_rx.recv().unwrap();
        let err = engine.call("starved", |_| Ok(())).unwrap_err();
        assert!(err.is_lock_timeout());

        release_tx.send(()).unwrap();
        thread.join().unwrap();
        assert_eq!(engine.call("recovered", |_| Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_fire_and_forget_failure_reaches_sink() {
        let engine = engine();
        let (err_tx, err_rx) = channel::unbounded();
        engine.set_error_sink(Arc::new(move |e: CameraError| {
            err_tx.send(e.to_string()).ok();
        }));
        engine
            .spawn("fails", |_| {
                Err(CameraError::sdk("press", crate::sdk::SdkStatus::DEVICE_BUSY))
            })
            .unwrap();
        let message = err_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(message.contains("DEVICE_BUSY"));
    }
}

// ============================================================================
// Session Controller - Open, Configure, Shoot, Close
// ============================================================================
//
// The controller owns at most one session. All device work goes through the
// injected execution engine; the controller itself only keeps the session
// slot and a few flags, each under its own short-lived lock. No controller
// lock is held while waiting on the engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::{Mutex, RwLock};

use super::download::DownloadJob;
use super::state::{CallbackRegistration, Session, SessionState};
use crate::config::SessionConfig;
use crate::dispatch::EventDispatcher;
use crate::engine::{ErrorSink, ExecutionEngine};
use crate::error::{CameraError, CameraResult, ErrorRecord};
use crate::live_view::{self, LiveViewPump, PumpContext};
use crate::notify::{Notification, NotificationHub};
use crate::sdk::{
    CameraAddedHandler, CameraCommand, CameraSdk, Capacity, DeviceInfo, EventHandler, ItemRef,
    MAX_TEXT_LEN, PropertyEncoding, PropertyId, PropertyValue, SdkStatus, ShutterButton,
    VolumeInfo, evf_output, record, save_to,
};

/// Reject payloads the device would refuse, before any device call.
fn validate_value(id: PropertyId, value: &PropertyValue) -> CameraResult<()> {
    let expected = id.encoding();
    if value.encoding() != expected {
        return Err(CameraError::WrongEncoding {
            property: id,
            expected,
            requested: value.encoding(),
        });
    }
    if let PropertyValue::Text(text) = value {
        if text.len() > MAX_TEXT_LEN {
            return Err(CameraError::TextTooLong {
                len: text.len(),
                max: MAX_TEXT_LEN,
            });
        }
        if !text.is_ascii() {
            return Err(CameraError::TextNotAscii);
        }
    }
    Ok(())
}

fn require_encoding(id: PropertyId, requested: PropertyEncoding) -> CameraResult<()> {
    let expected = id.encoding();
    if expected == requested {
        Ok(())
    } else {
        Err(CameraError::WrongEncoding {
            property: id,
            expected,
            requested,
        })
    }
}

// ============================================================================
// Controller core (shared with the dispatcher and the pump)
// ============================================================================

pub(crate) struct ControllerCore {
    pub(crate) engine: ExecutionEngine,
    pub(crate) hub: Arc<NotificationHub>,
    config: SessionConfig,
    session: Mutex<Option<Arc<Session>>>,
    download_dir: RwLock<PathBuf>,
    keep_alive: AtomicBool,
    pending_video: AtomicBool,
}

impl ControllerCore {
    fn new(engine: ExecutionEngine, config: SessionConfig) -> Self {
        Self {
            engine,
            hub: Arc::new(NotificationHub::new()),
            download_dir: RwLock::new(config.download_dir.clone()),
            keep_alive: AtomicBool::new(config.keep_alive),
            pending_video: AtomicBool::new(false),
            session: Mutex::new(None),
            config,
        }
    }

    /// Central path for failures nobody is waiting on.
    ///
    /// Lock timeouts stay in the log unless the configuration asks for them.
    pub(crate) fn report(&self, error: CameraError) {
        match &error {
            CameraError::LockTimeout { .. } => {
                log::warn!("[Session] {}", error);
                if !self.config.notify_lock_timeouts {
                    return;
                }
            }
            CameraError::Sdk { .. } => log::error!("[Session] {}", error),
            _ => log::warn!("[Session] {}", error),
        }
        self.hub
            .publish(Notification::SdkError(ErrorRecord::from_error(&error)));
    }

    /// Failures returned to a caller still raise a critical notification when
    /// the connection is gone.
    fn escalate(&self, error: &CameraError) {
        if error.status().is_some_and(SdkStatus::is_connection_loss) {
            log::error!("[Session] Connection lost: {}", error);
            self.hub
                .publish(Notification::SdkError(ErrorRecord::from_error(error)));
        }
    }

    pub(crate) fn error_sink(self: &Arc<Self>) -> ErrorSink {
        let weak = Arc::downgrade(self);
        Arc::new(move |error: CameraError| match weak.upgrade() {
            Some(core) => core.report(error),
            None => log::warn!("[Session] Dropped failure after controller went away: {}", error),
        })
    }

    fn device_call<T, F>(&self, name: &'static str, f: F) -> CameraResult<T>
    where
        F: FnOnce(&dyn CameraSdk) -> CameraResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let result = self.engine.call(name, f);
        if let Err(e) = &result {
            self.escalate(e);
        }
        result
    }

    fn publish_state(&self, state: SessionState) {
        log::debug!("[Session] State -> {:?}", state);
        self.hub.publish(Notification::SessionStateChanged(state));
    }

    fn current(&self) -> Option<Arc<Session>> {
        self.session.lock().clone()
    }

    /// The open session, or a precondition failure.
    fn session(&self) -> CameraResult<Arc<Session>> {
        match self.current() {
            Some(session) if session.state().is_open() => Ok(session),
            _ => Err(CameraError::SessionNotOpen),
        }
    }

    pub(crate) fn keep_alive(&self) -> bool {
        self.keep_alive.load(Ordering::SeqCst)
    }

    /// Clear the pending-video flag, returning whether it was set.
    pub(crate) fn take_pending_video(&self) -> bool {
        self.pending_video.swap(false, Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------------

    fn devices(&self) -> CameraResult<Vec<DeviceInfo>> {
        self.device_call("device_list", |sdk| {
            sdk.device_list()
                .map_err(|status| CameraError::sdk("device_list", status))
        })
    }

    fn open(self: &Arc<Self>, device: DeviceInfo) -> CameraResult<DeviceInfo> {
        if let Err(e) = self.close() {
            log::warn!("[Session] Closing the previous session failed: {}", e);
        }

        let device_id = device.id;
        let handle = self.device_call("open_session", move |sdk| {
            sdk.open_session(device_id)
                .map_err(|status| CameraError::sdk("open_session", status))
        })?;

        let session = Arc::new(Session::new(device.clone(), handle));
        let dispatcher: Arc<dyn EventHandler> = Arc::new(EventDispatcher::new(
            Arc::downgrade(self),
            Arc::downgrade(&session),
        ));
        match CallbackRegistration::install(&self.engine, handle, dispatcher) {
            Ok(registration) => session.attach(registration),
            Err(e) => {
                self.escalate(&e);
                let closed = self.engine.call("close_session", move |sdk| {
                    sdk.close_session(handle)
                        .map_err(|status| CameraError::sdk("close_session", status))
                });
                if let Err(close_err) = closed {
                    log::warn!("[Session] Close after failed registration: {}", close_err);
                }
                return Err(e);
            }
        }

        let replaced = self.session.lock().replace(Arc::clone(&session));
        if let Some(previous) = replaced {
            log::warn!("[Session] Another session was opened concurrently, closing it");
            if let Err(e) = self.teardown(&previous) {
                log::warn!("[Session] {}", e);
            }
        }

        log::info!("[Session] Opened {} on {}", device.name, device.port);
        self.publish_state(SessionState::Open);
        Ok(device)
    }

    pub(crate) fn close(&self) -> CameraResult<()> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };
        self.teardown(&session)
    }

    fn teardown(&self, session: &Arc<Session>) -> CameraResult<()> {
        if !session.state().is_open() {
            return Ok(());
        }

        self.stop_live_view_for(session);
        if session.state() == SessionState::Filming {
            self.cancel_filming(session);
        }

        let unregistered = session.detach_callbacks();
        session.live_view.mark_session_closed();
        let handle = session.handle;
        let closed = self.device_call("close_session", move |sdk| {
            sdk.close_session(handle)
                .map_err(|status| CameraError::sdk("close_session", status))
        });

        if session.replace_state(SessionState::Closed).is_open() {
            log::info!("[Session] Closed {}", session.device.name);
            self.publish_state(SessionState::Closed);
        }
        unregistered.and(closed)
    }

    /// Device went away: close the session without talking to it.
    pub(crate) fn on_device_shutdown(&self, session: &Arc<Session>) {
        {
            let mut slot = self.session.lock();
            if slot
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, session))
            {
                slot.take();
            }
        }

        session.live_view.mark_session_closed();
        let previous = session.replace_state(SessionState::Closed);
        if !previous.is_open() {
            log::debug!("[Session] Shutdown event for a closed session ignored");
            return;
        }

        log::warn!("[Session] {} has shut down", session.device.name);
        self.stop_live_view_for(session);
        self.pending_video.store(false, Ordering::SeqCst);
        if let Err(e) = session.detach_callbacks() {
            log::debug!("[Session] Unregistering after shutdown: {}", e);
        }

        self.hub.publish(Notification::CameraShutDown);
        self.publish_state(SessionState::Closed);
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn get_property(&self, id: PropertyId) -> CameraResult<PropertyValue> {
        let handle = self.session()?.handle;
        self.device_call("get_property", move |sdk| {
            sdk.get_property(handle, id)
                .map_err(|status| CameraError::sdk("get_property", status))
        })
    }

    fn set_property(&self, id: PropertyId, value: PropertyValue) -> CameraResult<()> {
        validate_value(id, &value)?;
        let handle = self.session()?.handle;
        self.device_call("set_property", move |sdk| {
            sdk.set_property(handle, id, &value)
                .map_err(|status| CameraError::sdk("set_property", status))
        })
    }

    fn set_save_to_host(&self, dir: PathBuf) -> CameraResult<()> {
        let handle = self.session()?.handle;
        std::fs::create_dir_all(&dir)?;
        *self.download_dir.write() = dir;
        self.device_call("set_save_to_host", move |sdk| {
            sdk.set_capacity(handle, Capacity::host_default())
                .map_err(|status| CameraError::sdk("set_capacity", status))?;
            sdk.set_property(
                handle,
                PropertyId::SAVE_TO,
                &PropertyValue::UInt32(save_to::HOST),
            )
            .map_err(|status| CameraError::sdk("set_save_to", status))
        })
    }

    // ------------------------------------------------------------------------
    // Live view
    // ------------------------------------------------------------------------

    /// Move `session` into live view. `Ok(false)` means live view is already
    /// running or being started by another caller.
    fn enter_live_view(&self, session: &Session) -> CameraResult<bool> {
        let mut waited = false;
        loop {
            if session.transition(SessionState::Open, SessionState::LiveView) {
                return Ok(true);
            }
            match session.state() {
                SessionState::LiveView if !waited && !session.live_view.is_enabled() => {
                    // a pump that ended on its own may still be restoring the output
                    let exit = session
                        .pump
                        .lock()
                        .as_ref()
                        .filter(|pump| !pump.is_finished())
                        .map(LiveViewPump::exit_signal);
                    let Some(exit) = exit else {
                        return Ok(false);
                    };
                    let timeout = self.config.live_view.stop_timeout();
                    if let Err(RecvTimeoutError::Timeout) = exit.recv_timeout(timeout) {
                        return Err(CameraError::InvalidState {
                            operation: "start live view",
                            state: SessionState::LiveView,
                        });
                    }
                    waited = true;
                }
                SessionState::LiveView => return Ok(false),
                SessionState::Closed => return Err(CameraError::SessionNotOpen),
                state => {
                    return Err(CameraError::InvalidState {
                        operation: "start live view",
                        state,
                    });
                }
            }
        }
    }

    fn start_live_view(self: &Arc<Self>) -> CameraResult<()> {
        let session = self.session()?;
        if !self.enter_live_view(&session)? {
            return Ok(());
        }

        session.live_view.set_enabled(true);
        self.publish_state(SessionState::LiveView);

        let handle = session.handle;
        let state = Arc::clone(&session.live_view);
        let started = self
            .device_call("start_live_view", move |sdk| {
                let current = sdk
                    .get_property(handle, PropertyId::EVF_OUTPUT_DEVICE)
                    .map_err(|status| CameraError::sdk("get_evf_output", status))?;
                let previous = current.as_u32().ok_or(CameraError::WrongEncoding {
                    property: PropertyId::EVF_OUTPUT_DEVICE,
                    expected: PropertyEncoding::UInt32,
                    requested: current.encoding(),
                })?;
                state.remember_previous_output(previous);
                sdk.set_property(
                    handle,
                    PropertyId::EVF_OUTPUT_DEVICE,
                    &PropertyValue::UInt32(previous | evf_output::PC),
                )
                .map_err(|status| CameraError::sdk("set_evf_output", status))
            })
            .and_then(|()| self.ensure_pump(&session));

        if let Err(e) = started {
            log::warn!("[Live View] Start failed: {}", e);
            self.stop_live_view_for(&session);
            return Err(e);
        }
        Ok(())
    }

    /// Start the pump unless one is already running for this session.
    pub(crate) fn ensure_pump(self: &Arc<Self>, session: &Arc<Session>) -> CameraResult<()> {
        if !session.live_view.is_enabled() {
            return Ok(());
        }
        let mut slot = session.pump.lock();
        if slot.as_ref().is_some_and(|pump| !pump.is_finished()) {
            return Ok(());
        }

        let core = Arc::downgrade(self);
        let owner = Arc::downgrade(session);
        let context = PumpContext {
            engine: self.engine.clone(),
            handle: session.handle,
            state: Arc::clone(&session.live_view),
            config: self.config.live_view.clone(),
            hub: Arc::clone(&self.hub),
            report: self.error_sink(),
            on_exit: Box::new(move || {
                if let (Some(core), Some(session)) = (core.upgrade(), owner.upgrade()) {
                    if session.transition(SessionState::LiveView, SessionState::Open) {
                        core.publish_state(SessionState::Open);
                    }
                }
            }),
        };
        *slot = Some(LiveViewPump::start(context)?);
        Ok(())
    }

    /// Stop live view for `session`. Safe to call from several threads; only
    /// the first caller after a start does the work.
    fn stop_live_view_for(&self, session: &Session) {
        let was_enabled = session.live_view.set_enabled(false);
        let pump = session.pump.lock().take();
        let exited = match pump {
            Some(pump) => pump.stop(self.config.live_view.stop_timeout()),
            None => true,
        };
        if !exited {
            log::warn!("[Live View] Forcing teardown of a pump that did not stop");
        }

        if let Err(e) = live_view::restore_output(&self.engine, session.handle, &session.live_view)
        {
            self.report(e);
        }
        if session.transition(SessionState::LiveView, SessionState::Open) {
            self.publish_state(SessionState::Open);
        }
        if was_enabled {
            log::info!("[Live View] Stopped");
        }
    }

    // ------------------------------------------------------------------------
    // Filming
    // ------------------------------------------------------------------------

    fn start_filming(&self) -> CameraResult<()> {
        let session = self.session()?;
        if !session.transition(SessionState::Open, SessionState::Filming) {
            return match session.state() {
                SessionState::Filming => Ok(()),
                SessionState::Closed => Err(CameraError::SessionNotOpen),
                state => Err(CameraError::InvalidState {
                    operation: "start filming",
                    state,
                }),
            };
        }
        self.publish_state(SessionState::Filming);

        let handle = session.handle;
        let result = self.device_call("start_filming", move |sdk| {
            sdk.set_property(handle, PropertyId::RECORD, &PropertyValue::UInt32(record::BEGIN))
                .map_err(|status| CameraError::sdk("start_filming", status))
        });
        if let Err(e) = result {
            if session.transition(SessionState::Filming, SessionState::Open) {
                self.publish_state(SessionState::Open);
            }
            return Err(e);
        }
        Ok(())
    }

    fn stop_filming(&self) -> CameraResult<()> {
        let session = self.session()?;
        let state = session.state();
        if state != SessionState::Filming {
            return Err(CameraError::InvalidState {
                operation: "stop filming",
                state,
            });
        }

        // The movie shows up as a new item right after recording ends.
        self.pending_video.store(true, Ordering::SeqCst);
        let handle = session.handle;
        let result = self.device_call("stop_filming", move |sdk| {
            sdk.set_property(handle, PropertyId::RECORD, &PropertyValue::UInt32(record::END))
                .map_err(|status| CameraError::sdk("stop_filming", status))
        });
        if session.transition(SessionState::Filming, SessionState::Open) {
            self.publish_state(SessionState::Open);
        }
        if result.is_err() {
            self.pending_video.store(false, Ordering::SeqCst);
        }
        result
    }

    fn cancel_filming(&self, session: &Session) {
        self.pending_video.store(false, Ordering::SeqCst);
        let handle = session.handle;
        let result = self.engine.call("cancel_filming", move |sdk| {
            sdk.set_property(handle, PropertyId::RECORD, &PropertyValue::UInt32(record::END))
                .map_err(|status| CameraError::sdk("cancel_filming", status))
        });
        if let Err(e) = result {
            log::warn!("[Session] Ending the recording on close failed: {}", e);
        }
        if session.transition(SessionState::Filming, SessionState::Open) {
            self.publish_state(SessionState::Open);
        }
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    fn take_picture(&self) -> CameraResult<()> {
        let handle = self.session()?.handle;
        self.engine.spawn("take_picture", move |sdk| {
            let pressed = sdk
                .send_command(handle, CameraCommand::PressShutter(ShutterButton::Completely))
                .map_err(|status| CameraError::sdk("press_shutter", status));
            // Always let go of the button, even after a failed press.
            let released = sdk
                .send_command(handle, CameraCommand::PressShutter(ShutterButton::Off))
                .map_err(|status| CameraError::sdk("release_shutter", status));
            pressed.and(released)
        })
    }

    fn bulb_exposure(&self, duration: Duration) -> CameraResult<()> {
        let handle = self.session()?.handle;
        self.engine.background("bulb_exposure", move |engine| {
            engine.exclusive("bulb_start", |sdk| {
                sdk.send_command(handle, CameraCommand::BulbStart)
                    .map_err(|status| CameraError::sdk("bulb_start", status))
            })?;
            log::debug!("[Session] Bulb open for {:?}", duration);
            std::thread::sleep(duration);
            engine.exclusive("bulb_end", |sdk| {
                sdk.send_command(handle, CameraCommand::BulbEnd)
                    .map_err(|status| CameraError::sdk("bulb_end", status))
            })
        })
    }

    pub(crate) fn queue_download(&self, name: &'static str, item: ItemRef) -> CameraResult<()> {
        let job = DownloadJob {
            item,
            dir: self.download_dir.read().clone(),
            decode: self.config.decode_images,
            hub: Arc::clone(&self.hub),
        };
        self.engine.spawn(name, move |sdk| job.run(sdk).map(|_| ()))
    }

    pub(crate) fn extend_shutdown_timer(&self, session: &Session) -> CameraResult<()> {
        let handle = session.handle;
        self.engine.spawn("extend_shutdown_timer", move |sdk| {
            sdk.send_command(handle, CameraCommand::ExtendShutDownTimer)
                .map_err(|status| CameraError::sdk("extend_shutdown_timer", status))
        })
    }
}

// ============================================================================
// Public controller
// ============================================================================

/// Owns the camera session and exposes what callers can do with it.
pub struct SessionController {
    core: Arc<ControllerCore>,
}

impl SessionController {
    /// Create a controller on top of `engine`, starting the engine if needed.
    pub fn new(engine: ExecutionEngine, config: SessionConfig) -> CameraResult<Self> {
        engine.initialize()?;
        let core = Arc::new(ControllerCore::new(engine, config));
        core.engine.set_error_sink(core.error_sink());

        let weak = Arc::downgrade(&core);
        let on_added: CameraAddedHandler = Arc::new(move || {
            if let Some(core) = weak.upgrade() {
                log::info!("[Session] Camera added");
                core.hub.publish(Notification::CameraAdded);
            }
        });
        core.device_call("register_camera_added", move |sdk| {
            sdk.set_camera_added_handler(Some(on_added))
                .map_err(|status| CameraError::sdk("register_camera_added", status))
        })?;

        Ok(Self { core })
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.core.engine
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        self.core.hub.subscribe()
    }

    pub fn devices(&self) -> CameraResult<Vec<DeviceInfo>> {
        self.core.devices()
    }

    /// Open a session on `device_id`, closing any session already open.
    pub fn open(&self, device_id: u32) -> CameraResult<DeviceInfo> {
        let device = self
            .devices()?
            .into_iter()
            .find(|device| device.id == device_id)
            .ok_or(CameraError::sdk("open_session", SdkStatus::DEVICE_NOT_FOUND))?;
        self.core.open(device)
    }

    /// Open a session on the first camera found.
    pub fn open_first(&self) -> CameraResult<DeviceInfo> {
        let device = self
            .devices()?
            .into_iter()
            .next()
            .ok_or(CameraError::sdk("open_session", SdkStatus::DEVICE_NOT_FOUND))?;
        self.core.open(device)
    }

    pub fn close(&self) -> CameraResult<()> {
        self.core.close()
    }

    pub fn state(&self) -> SessionState {
        self.core
            .current()
            .map_or(SessionState::Closed, |session| session.state())
    }

    pub fn device(&self) -> Option<DeviceInfo> {
        self.core.current().map(|session| session.device.clone())
    }

    // Properties

    pub fn get_property(&self, id: PropertyId) -> CameraResult<PropertyValue> {
        self.core.get_property(id)
    }

    pub fn get_u32(&self, id: PropertyId) -> CameraResult<u32> {
        require_encoding(id, PropertyEncoding::UInt32)?;
        let value = self.core.get_property(id)?;
        value.as_u32().ok_or(CameraError::WrongEncoding {
            property: id,
            expected: value.encoding(),
            requested: PropertyEncoding::UInt32,
        })
    }

    pub fn get_text(&self, id: PropertyId) -> CameraResult<String> {
        require_encoding(id, PropertyEncoding::Text)?;
        match self.core.get_property(id)? {
            PropertyValue::Text(text) => Ok(text),
            other => Err(CameraError::WrongEncoding {
                property: id,
                expected: other.encoding(),
                requested: PropertyEncoding::Text,
            }),
        }
    }

    pub fn set_property(&self, id: PropertyId, value: PropertyValue) -> CameraResult<()> {
        self.core.set_property(id, value)
    }

    pub fn set_u32(&self, id: PropertyId, value: u32) -> CameraResult<()> {
        self.core.set_property(id, PropertyValue::UInt32(value))
    }

    /// Set a text property; payloads over 32 bytes or non-ASCII are refused.
    pub fn set_text(&self, id: PropertyId, text: &str) -> CameraResult<()> {
        self.core.set_property(id, PropertyValue::Text(text.to_string()))
    }

    /// Save new shots on the host, in `dir`.
    ///
    /// Declares host capacity to the device first; the device refuses to
    /// transfer without it.
    pub fn set_save_to_host(&self, dir: impl Into<PathBuf>) -> CameraResult<()> {
        self.core.set_save_to_host(dir.into())
    }

    pub fn set_save_to_camera(&self) -> CameraResult<()> {
        self.set_u32(PropertyId::SAVE_TO, save_to::CAMERA)
    }

    // Live view and filming

    pub fn start_live_view(&self) -> CameraResult<()> {
        self.core.start_live_view()
    }

    /// Stop live view and wait (bounded) for the pump to exit.
    pub fn stop_live_view(&self) -> CameraResult<()> {
        let session = self.core.session()?;
        self.core.stop_live_view_for(&session);
        Ok(())
    }

    pub fn is_live_view(&self) -> bool {
        self.core
            .current()
            .is_some_and(|session| session.live_view.is_enabled())
    }

    pub fn start_filming(&self) -> CameraResult<()> {
        self.core.start_filming()
    }

    /// Stop recording; the resulting movie is downloaded when it appears.
    pub fn stop_filming(&self) -> CameraResult<()> {
        self.core.stop_filming()
    }

    // Shooting and storage

    /// Full shutter press and release, in the background.
    pub fn take_picture(&self) -> CameraResult<()> {
        self.core.take_picture()
    }

    /// Hold the shutter open for `duration`, in the background.
    pub fn bulb_exposure(&self, duration: Duration) -> CameraResult<()> {
        self.core.bulb_exposure(duration)
    }

    pub fn volumes(&self) -> CameraResult<Vec<VolumeInfo>> {
        let handle = self.core.session()?.handle;
        self.core.device_call("volumes", move |sdk| {
            sdk.volumes(handle)
                .map_err(|status| CameraError::sdk("volumes", status))
        })
    }

    pub fn format_volume(&self, index: u32) -> CameraResult<()> {
        let handle = self.core.session()?.handle;
        self.core.device_call("format_volume", move |sdk| {
            sdk.format_volume(handle, index)
                .map_err(|status| CameraError::sdk("format_volume", status))
        })
    }

    /// Download `item` into the download directory, in the background.
    pub fn download(&self, item: ItemRef) -> CameraResult<()> {
        self.core.session()?;
        self.core.queue_download("download", item)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.core.download_dir.read().clone()
    }

    /// Extend the device's auto power-off whenever it warns.
    pub fn set_keep_alive(&self, enabled: bool) {
        self.core.keep_alive.store(enabled, Ordering::SeqCst);
    }

    pub fn keep_alive(&self) -> bool {
        self.core.keep_alive()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Err(e) = self.core.close() {
            log::warn!("[Session] Close on drop failed: {}", e);
        }
        let unregistered = self.core.engine.call("unregister_camera_added", |sdk| {
            sdk.set_camera_added_handler(None)
                .map_err(|status| CameraError::sdk("unregister_camera_added", status))
        });
        if let Err(e) = unregistered {
            log::debug!("[Session] {}", e);
        }
        self.core.engine.clear_error_sink();
    }
}

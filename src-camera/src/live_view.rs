// ============================================================================
// Live-View Pump - Preview Frame Loop
// ============================================================================
//
// One thread per active pump. Each iteration takes the device-access lock
// only long enough to fetch the frame (and, once per session, the coordinate
// system), then builds and publishes the frame without the lock.
//
// Stop protocol: the enabled flag or the stop channel ends the loop; on exit
// the pump clears the flag, restores the previous output device and closes
// its done channel so a stopping caller can wait with a bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::config::LiveViewConfig;
use crate::engine::{ErrorSink, ExecutionEngine};
use crate::error::{CameraError, CameraResult};
use crate::notify::{LiveViewFrame, Notification, NotificationHub};
use crate::sdk::{
    CameraSdk, DeviceHandle, EvfImage, Point, PropertyEncoding, PropertyId, PropertyValue, Rect,
    Size,
};

// ============================================================================
// Per-session live-view state
// ============================================================================

#[derive(Debug, Default)]
pub struct LiveViewState {
    enabled: AtomicBool,
    session_closed: AtomicBool,
    coordinate_system: OnceLock<Size>,
    zoom: Mutex<(Rect, Point)>,
    previous_output: Mutex<Option<u32>>,
}

impl LiveViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the flag and return the value it had before.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }

    /// Coordinate system cached from the first frame of the session.
    pub fn coordinate_system(&self) -> Option<Size> {
        self.coordinate_system.get().copied()
    }

    /// Cache the coordinate system; later captures keep the first value.
    pub fn capture_coordinate_system(&self, size: Size) -> Size {
        *self.coordinate_system.get_or_init(|| size)
    }

    pub fn zoom_rect(&self) -> Rect {
        self.zoom.lock().0
    }

    pub fn zoom_position(&self) -> Point {
        self.zoom.lock().1
    }

    fn update_zoom(&self, rect: Rect, position: Point) {
        *self.zoom.lock() = (rect, position);
    }

    pub fn remember_previous_output(&self, output: u32) {
        *self.previous_output.lock() = Some(output);
    }

    /// Previous output device, handed out at most once per start.
    pub fn take_previous_output(&self) -> Option<u32> {
        self.previous_output.lock().take()
    }

    pub fn mark_session_closed(&self) {
        self.session_closed.store(true, Ordering::SeqCst);
    }

    pub fn is_session_closed(&self) -> bool {
        self.session_closed.load(Ordering::SeqCst)
    }
}

/// Put the output device back to what it was before live view started.
///
/// Skipped once the session is gone or the value was already restored.
pub(crate) fn restore_output(
    engine: &ExecutionEngine,
    handle: DeviceHandle,
    state: &LiveViewState,
) -> CameraResult<()> {
    if state.is_session_closed() {
        return Ok(());
    }
    let Some(previous) = state.take_previous_output() else {
        return Ok(());
    };
    log::debug!("[Live View] Restoring output device to {}", previous);
    engine.call("restore_evf_output", move |sdk| {
        sdk.set_property(
            handle,
            PropertyId::EVF_OUTPUT_DEVICE,
            &PropertyValue::UInt32(previous),
        )
        .map_err(|status| CameraError::sdk("restore_evf_output", status))
    })
}

// ============================================================================
// Pump
// ============================================================================

/// Everything a pump thread needs.
pub(crate) struct PumpContext {
    pub engine: ExecutionEngine,
    pub handle: DeviceHandle,
    pub state: Arc<LiveViewState>,
    pub config: LiveViewConfig,
    pub hub: Arc<NotificationHub>,
    pub report: ErrorSink,
    /// Runs after the loop has ended and the output device was restored.
    pub on_exit: Box<dyn FnOnce() + Send>,
}

/// Handle of a running pump thread.
pub(crate) struct LiveViewPump {
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl LiveViewPump {
    pub(crate) fn start(context: PumpContext) -> CameraResult<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let (done_tx, done_rx) = channel::bounded::<()>(0);

        let thread = std::thread::Builder::new()
            .name("live-view".to_string())
            .spawn(move || {
                let _done = done_tx;
                run_pump(context, stop_rx);
            })
            .map_err(|source| CameraError::Spawn {
                thread: "live-view",
                source,
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            thread: Some(thread),
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|thread| thread.is_finished())
    }

    /// Disconnects once the pump thread has run its exit path.
    pub(crate) fn exit_signal(&self) -> Receiver<()> {
        self.done_rx.clone()
    }

    /// Signal the pump and wait for it to exit.
    ///
    /// Returns `false` when the pump did not exit within `timeout`; the thread
    /// is then detached and will leave at its next flag check.
    pub(crate) fn stop(mut self, timeout: Duration) -> bool {
        self.stop_tx.take();

        let on_pump = self
            .thread
            .as_ref()
            .is_some_and(|thread| thread.thread().id() == std::thread::current().id());
        if on_pump {
            self.thread.take();
            return true;
        }

        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("[Live View] Pump did not stop within {:?}, detaching", timeout);
                self.thread.take();
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    thread.join().ok();
                }
                true
            }
        }
    }
}

impl Drop for LiveViewPump {
    fn drop(&mut self) {
        self.stop_tx.take();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Device-facing part of one iteration, run under the device-access lock.
fn fetch_frame(
    sdk: &dyn CameraSdk,
    handle: DeviceHandle,
    state: &LiveViewState,
) -> CameraResult<(EvfImage, Size)> {
    let image = sdk
        .download_evf_image(handle)
        .map_err(|status| CameraError::sdk("download_evf_image", status))?;

    let coordinate_system = match state.coordinate_system() {
        Some(size) => size,
        None => {
            let value = sdk
                .get_property(handle, PropertyId::EVF_COORDINATE_SYSTEM)
                .map_err(|status| CameraError::sdk("get_evf_coordinate_system", status))?;
            match value {
                PropertyValue::Size(size) => state.capture_coordinate_system(size),
                other => {
                    return Err(CameraError::WrongEncoding {
                        property: PropertyId::EVF_COORDINATE_SYSTEM,
                        expected: PropertyEncoding::Struct,
                        requested: other.encoding(),
                    });
                }
            }
        }
    };

    Ok((image, coordinate_system))
}

/// Main pump thread function
fn run_pump(context: PumpContext, stop_rx: Receiver<()>) {
    let PumpContext {
        engine,
        handle,
        state,
        config,
        hub,
        report,
        on_exit,
    } = context;

    log::info!("[Live View] Pump started");
    let retry_interval = config.frame_retry_interval();
    let mut sequence: u64 = 0;
    let mut not_ready: u32 = 0;

    loop {
        if !state.is_enabled() || stop_requested(&stop_rx) {
            break;
        }

        let result = engine.exclusive("live_view_frame", |sdk| fetch_frame(sdk, handle, &state));

        match result {
            Ok((image, coordinate_system)) => {
                not_ready = 0;
                sequence += 1;
                state.update_zoom(image.zoom_rect, image.zoom_position);

                let frame = LiveViewFrame {
                    data: Arc::from(image.data),
                    sequence,
                    zoom: image.zoom,
                    zoom_position: image.zoom_position,
                    zoom_rect: image.zoom_rect,
                    coordinate_system,
                    captured_at: Utc::now(),
                };
                hub.publish(Notification::LiveViewFrame(frame));
            }
            Err(e) if e.is_not_ready() => {
                not_ready += 1;
                if let Some(limit) = config.retry_limit() {
                    if not_ready >= limit {
                        report(CameraError::LiveViewStalled {
                            attempts: not_ready,
                        });
                        break;
                    }
                }
                match stop_rx.recv_timeout(retry_interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            Err(CameraError::EngineStopped) => {
                log::debug!("[Live View] Engine stopped, leaving pump");
                break;
            }
            Err(e) => {
                report(e);
                break;
            }
        }
    }

    state.set_enabled(false);
    if let Err(e) = restore_output(&engine, handle, &state) {
        report(e);
    }
    on_exit();
    log::info!("[Live View] Pump stopped after {} frames", sequence);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_system_is_captured_once() {
        let state = LiveViewState::new();
        assert_eq!(state.coordinate_system(), None);
        let first = Size {
            width: 6000,
            height: 4000,
        };
        assert_eq!(state.capture_coordinate_system(first), first);
        let later = Size {
            width: 1,
            height: 1,
        };
        assert_eq!(state.capture_coordinate_system(later), first);
        assert_eq!(state.coordinate_system(), Some(first));
    }

    #[test]
    fn test_previous_output_is_taken_once() {
        let state = LiveViewState::new();
        state.remember_previous_output(1);
        assert_eq!(state.take_previous_output(), Some(1));
        assert_eq!(state.take_previous_output(), None);
    }

    #[test]
    fn test_set_enabled_reports_previous_value() {
        let state = LiveViewState::new();
        assert!(!state.set_enabled(true));
        assert!(state.set_enabled(false));
        assert!(!state.set_enabled(false));
    }
}

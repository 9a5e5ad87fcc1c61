// ============================================================================
// Session State
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::engine::ExecutionEngine;
use crate::error::{CameraError, CameraResult};
use crate::live_view::{LiveViewPump, LiveViewState};
use crate::sdk::{DeviceHandle, DeviceInfo, EventHandler};

/// Where a session is in its lifecycle.
///
/// `Open` is the idle state; `LiveView` and `Filming` exclude each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Closed,
    Open,
    LiveView,
    Filming,
}

impl SessionState {
    pub fn is_open(self) -> bool {
        self != SessionState::Closed
    }
}

/// Event handler installed on the device for one session.
///
/// Dropping it removes the handler, so every way out of a session
/// unsubscribes.
pub(crate) struct CallbackRegistration {
    engine: ExecutionEngine,
    handle: DeviceHandle,
    armed: bool,
}

impl CallbackRegistration {
    pub(crate) fn install(
        engine: &ExecutionEngine,
        handle: DeviceHandle,
        handler: Arc<dyn EventHandler>,
    ) -> CameraResult<Self> {
        engine.call("register_callbacks", move |sdk| {
            sdk.set_event_handler(handle, Some(handler))
                .map_err(|status| CameraError::sdk("register_callbacks", status))
        })?;
        Ok(Self {
            engine: engine.clone(),
            handle,
            armed: true,
        })
    }

    /// Remove the handler now and report the outcome.
    pub(crate) fn release(mut self) -> CameraResult<()> {
        self.armed = false;
        unregister(&self.engine, self.handle)
    }
}

impl Drop for CallbackRegistration {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = unregister(&self.engine, self.handle) {
                log::debug!("[Session] Unregistering callbacks on drop failed: {}", e);
            }
        }
    }
}

fn unregister(engine: &ExecutionEngine, handle: DeviceHandle) -> CameraResult<()> {
    engine.call("unregister_callbacks", move |sdk| {
        sdk.set_event_handler(handle, None)
            .map_err(|status| CameraError::sdk("unregister_callbacks", status))
    })
}

/// One open connection to a device.
pub(crate) struct Session {
    pub(crate) device: DeviceInfo,
    pub(crate) handle: DeviceHandle,
    pub(crate) live_view: Arc<LiveViewState>,
    pub(crate) pump: Mutex<Option<LiveViewPump>>,
    state: Mutex<SessionState>,
    registration: Mutex<Option<CallbackRegistration>>,
}

impl Session {
    pub(crate) fn new(device: DeviceInfo, handle: DeviceHandle) -> Self {
        Self {
            device,
            handle,
            live_view: Arc::new(LiveViewState::new()),
            pump: Mutex::new(None),
            state: Mutex::new(SessionState::Open),
            registration: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move from `from` to `to`. Returns `false` if the session was elsewhere.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Set the state unconditionally and return the previous one.
    pub(crate) fn replace_state(&self, to: SessionState) -> SessionState {
        std::mem::replace(&mut *self.state.lock(), to)
    }

    pub(crate) fn attach(&self, registration: CallbackRegistration) {
        *self.registration.lock() = Some(registration);
    }

    pub(crate) fn detach_callbacks(&self) -> CameraResult<()> {
        let registration = self.registration.lock().take();
        match registration {
            Some(registration) => registration.release(),
            None => Ok(()),
        }
    }
}

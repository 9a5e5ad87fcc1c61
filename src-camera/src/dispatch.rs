// ============================================================================
// Event Dispatcher - Native Callbacks to Session Reactions
// ============================================================================
//
// Installed on the device for one session. Callbacks arrive on whatever thread
// the SDK picks, including the engine worker in the middle of a command; any
// blocking device work started from here relies on the engine's inline path.

use std::sync::{Arc, Weak};

use crate::error::CameraError;
use crate::notify::Notification;
use crate::sdk::{
    EventHandler, ItemRef, ObjectEvent, PropertyEvent, PropertyId, SdkEvent, StateEvent,
};
use crate::session::{ControllerCore, Session};
use crate::tables;

pub(crate) struct EventDispatcher {
    core: Weak<ControllerCore>,
    session: Weak<Session>,
}

impl EventDispatcher {
    pub(crate) fn new(core: Weak<ControllerCore>, session: Weak<Session>) -> Self {
        Self { core, session }
    }

    fn on_object(&self, core: &ControllerCore, event: ObjectEvent, item: ItemRef) {
        match event {
            ObjectEvent::DirItemRequestTransfer => {
                log::debug!("[Dispatcher] Transfer requested for item {}", item.0);
                queue(core, "download", item);
            }
            ObjectEvent::DirItemCreated => {
                if core.take_pending_video() {
                    log::debug!("[Dispatcher] Movie {} created, downloading", item.0);
                    queue(core, "download_video", item);
                } else {
                    log::debug!("[Dispatcher] Item {} created", item.0);
                }
            }
            other => log::trace!("[Dispatcher] Object event {:?}", other),
        }
    }

    fn on_property(
        &self,
        core: &Arc<ControllerCore>,
        session: &Arc<Session>,
        event: PropertyEvent,
        property: PropertyId,
    ) {
        match event {
            PropertyEvent::PropertyChanged => {
                let name = tables::property_name(property.0);
                log::debug!("[Dispatcher] Property changed: {}", name);
                core.hub
                    .publish(Notification::PropertyChanged { property, name });

                if property == PropertyId::EVF_OUTPUT_DEVICE && session.live_view.is_enabled() {
                    if let Err(e) = core.ensure_pump(session) {
                        core.report(e);
                    }
                }
            }
            other => log::trace!("[Dispatcher] Property event {:?} for {}", other, property),
        }
    }

    fn on_state(
        &self,
        core: &ControllerCore,
        session: &Arc<Session>,
        event: StateEvent,
        param: u32,
    ) {
        match event {
            StateEvent::Shutdown => core.on_device_shutdown(session),
            StateEvent::WillSoonShutDown => {
                if core.keep_alive() {
                    log::debug!("[Dispatcher] Device about to sleep, extending timer");
                    if let Err(e) = core.extend_shutdown_timer(session) {
                        log::warn!("[Dispatcher] Could not extend shutdown timer: {}", e);
                    }
                } else {
                    log::info!("[Dispatcher] Device will shut down in {} s", param);
                }
            }
            other => log::debug!(
                "[Dispatcher] State event {} ({})",
                tables::event_name(other.code()),
                param
            ),
        }
    }
}

/// Queue a background download; a refusal already went to the error sink.
fn queue(core: &ControllerCore, name: &'static str, item: ItemRef) {
    match core.queue_download(name, item) {
        Ok(()) | Err(CameraError::QueueFull { .. }) => {}
        Err(e) => core.report(e),
    }
}

impl EventHandler for EventDispatcher {
    fn handle_event(&self, event: SdkEvent) {
        let (Some(core), Some(session)) = (self.core.upgrade(), self.session.upgrade()) else {
            log::trace!("[Dispatcher] Dropping {:?}, session is gone", event);
            return;
        };
        if !session.state().is_open() {
            log::trace!("[Dispatcher] Dropping {:?} for a closed session", event);
            return;
        }

        match event {
            SdkEvent::Object { event, item } => self.on_object(&core, event, item),
            SdkEvent::Property {
                event, property, ..
            } => self.on_property(&core, &session, event, property),
            SdkEvent::State { event, param } => self.on_state(&core, &session, event, param),
        }
    }
}

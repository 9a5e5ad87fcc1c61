//! Tethered camera session engine
//!
//! Mediates access to a stateful, callback-driven camera reached through a
//! native SDK:
//! - An execution engine that keeps every device call on one worker context
//!   and never lets two device calls overlap
//! - An event dispatcher turning native callbacks into session reactions
//! - A session controller for open/close, properties, live view and filming
//! - A live-view pump publishing preview frames to subscribers
//!
//! Data flow:
//! - Caller → `SessionController` → `ExecutionEngine` → `CameraSdk`
//! - `CameraSdk` callbacks → `EventDispatcher` → `NotificationHub` → subscribers

use std::sync::Once;

pub mod sdk;
pub use sdk::{CameraSdk, DeviceInfo, PropertyId, PropertyValue, SdkStatus};

pub mod tables;

pub mod error;
pub use error::{CameraError, CameraResult, ErrorRecord, Severity};

pub mod engine;
pub use engine::{Command, EngineConfig, ExecutionEngine, SubmitMode};

pub mod config;
pub use config::{CameraConfig, LiveViewConfig, SessionConfig};

pub mod notify;
pub use notify::{LiveViewFrame, Notification, NotificationHub};

pub mod live_view;
pub use live_view::LiveViewState;

mod dispatch;

pub mod session;
pub use session::{SessionController, SessionState};

pub mod sim;
pub use sim::SimulatedCamera;

static INIT: Once = Once::new();

/// Initialize logging from `RUST_LOG`, defaulting to `info`. Safe to call
/// more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
        log::info!("Tether camera v{} starting", VERSION);
    });
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Session Module
// ============================================================================

mod controller;
mod download;
mod state;

pub use controller::SessionController;
pub use state::SessionState;

pub(crate) use controller::ControllerCore;
pub(crate) use state::Session;

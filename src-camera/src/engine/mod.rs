// ============================================================================
// Execution Engine - Single-Context Device Access
// ============================================================================
//
// Architecture:
//   Worker thread:      blocking commands, one at a time
//   Background pool:    fire-and-forget commands (shutter, bulb, downloads)
//   Device-access lock: shared by both, and by the live-view pump

mod types;
pub use types::{Action, Command, ErrorSink, SubmitMode};

mod worker;

mod pool;

mod executor;
pub use executor::ExecutionEngine;

mod config;
pub use config::EngineConfig;

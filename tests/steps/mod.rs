//! Step definitions for the behaviour scenarios.

pub mod debug_steps;
pub mod installer_steps;
pub mod service_steps;

pub use debug_steps::DebugWorld;
pub use installer_steps::InstallWorld;
pub use service_steps::ServiceWorld;

use inetsvc_lib::ServiceState;

/// Parse a state written the way it is serialised, e.g. `stop_pending`.
pub fn parse_state(text: &str) -> ServiceState {
    serde_json::from_value(serde_json::Value::String(text.trim().to_owned()))
        .unwrap_or_else(|e| panic!("unknown state {text:?}: {e}"))
}

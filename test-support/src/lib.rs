//! Test support utilities.
//!
//! In-memory stand-ins for the service manager and the daemon, plus helpers
//! for environment and logging setup.

pub mod daemon;
pub mod env_guard;
pub mod logging;
pub mod manager;
pub mod supervisor;

pub use daemon::FakeDaemon;
pub use manager::{FakeServiceManager, ManagerCall};
pub use supervisor::FakeSupervisor;

//! Persistent service registration held by the service manager.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When the service manager should start the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    #[default]
    Auto,
    Manual,
}

/// Action taken by the service manager when the service fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureActionKind {
    Restart,
    None,
}

/// How long the service manager waits before resetting its failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPeriod {
    Never,
    After(Duration),
}

/// Failure-recovery policy registered with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAction {
    pub action: FailureActionKind,
    pub delay: Duration,
    pub reset_period: ResetPeriod,
}

impl FailureAction {
    /// Restart after `delay`, never forgetting earlier failures.
    #[must_use]
    pub const fn restart_after(delay: Duration) -> Self {
        Self {
            action: FailureActionKind::Restart,
            delay,
            reset_period: ResetPeriod::Never,
        }
    }
}

/// Everything the installer registers for the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub display_name: String,
    /// Services that must be running first, in registration order.
    pub dependencies: Vec<String>,
    pub start_mode: StartMode,
    pub description: String,
    pub failure_action: FailureAction,
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self {
            name: crate::SERVICE_NAME.to_owned(),
            display_name: crate::SERVICE_NAME.to_owned(),
            dependencies: crate::SERVICE_DEPENDENCIES
                .iter()
                .map(|d| (*d).to_owned())
                .collect(),
            start_mode: StartMode::Auto,
            description: crate::SERVICE_DESCRIPTION.to_owned(),
            failure_action: FailureAction::restart_after(Duration::from_secs(60)),
        }
    }
}

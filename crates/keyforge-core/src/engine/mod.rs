// Keyforge Engine
//
// Key interception, hold/toggle dispatch and the start/stop lifecycle.

mod dispatch;
mod event_engine;
mod hook;

use std::fmt;

use strum_macros::Display;
use thiserror::Error;

use crate::KeyName;

pub use dispatch::Dispatcher;
pub use event_engine::KeyEventEngine;
pub use hook::{HookHandler, KeySynthesizer, KeyboardHook, Verdict};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EngineState {
    Stopped,
    Running,
}

/// Engine transition reported to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Started,
    Stopped,
    Error(String),
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Started => write!(f, "started"),
            EngineStatus::Stopped => write!(f, "stopped"),
            EngineStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Errors from installing or removing a keyboard hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("No keyboard devices found")]
    NoDevices,

    #[error("Hook is already installed")]
    AlreadyInstalled,

    #[error("Hook failed: {0}")]
    Failed(String),
}

/// Errors from emitting a synthetic key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error("Key '{0}' has no platform key code")]
    UnknownKey(KeyName),

    #[error("Output failed: {0}")]
    Output(String),
}

/// Errors from engine start/stop
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No active rules: enable at least one rule before starting")]
    NoActiveRules,

    #[error("Permission denied installing the keyboard hook: {0}")]
    Permission(String),

    #[error(transparent)]
    Hook(HookError),
}

impl From<HookError> for EngineError {
    fn from(e: HookError) -> Self {
        match e {
            HookError::Permission(reason) => EngineError::Permission(reason),
            other => EngineError::Hook(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_maps_to_engine_permission() {
        let err = EngineError::from(HookError::Permission("/dev/input/event3".into()));
        assert!(matches!(err, EngineError::Permission(_)));
        let err = EngineError::from(HookError::NoDevices);
        assert_eq!(err.to_string(), "No keyboard devices found");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(EngineStatus::Started.to_string(), "started");
        assert_eq!(
            EngineStatus::Error("denied".into()).to_string(),
            "error: denied"
        );
        assert_eq!(EngineState::Running.to_string(), "running");
    }
}

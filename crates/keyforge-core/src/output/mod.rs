// Keyforge Output Layer
// Virtual keyboard used for synthetic and passed-through keys

mod state;
#[cfg(feature = "native-hook")]
mod uinput;

use thiserror::Error;

use crate::engine::{EngineError, HookError, SynthError};

pub use state::PressedKeyState;
#[cfg(feature = "native-hook")]
pub use uinput::VirtualKeyboard;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to create virtual device: {0}")]
    DeviceCreation(String),

    #[error("Permission denied opening /dev/uinput: {0}")]
    Permission(String),

    #[error("Failed to write event: {0}")]
    Write(String),
}

impl OutputError {
    pub(crate) fn creation(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => OutputError::Permission(err.to_string()),
            _ => OutputError::DeviceCreation(err.to_string()),
        }
    }
}

impl From<OutputError> for SynthError {
    fn from(e: OutputError) -> Self {
        SynthError::Output(e.to_string())
    }
}

impl From<OutputError> for HookError {
    fn from(e: OutputError) -> Self {
        match e {
            OutputError::Permission(reason) => HookError::Permission(reason),
            other => HookError::Failed(other.to_string()),
        }
    }
}

impl From<OutputError> for EngineError {
    fn from(e: OutputError) -> Self {
        EngineError::from(HookError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uinput_permission_is_engine_permission() {
        let err = OutputError::creation(std::io::Error::from_raw_os_error(libc::EACCES));
        assert!(matches!(EngineError::from(err), EngineError::Permission(_)));
    }

    #[test]
    fn test_write_error_is_synth_output() {
        let err = SynthError::from(OutputError::Write("broken pipe".into()));
        assert_eq!(err, SynthError::Output("Failed to write event: broken pipe".into()));
    }
}

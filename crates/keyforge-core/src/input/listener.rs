// Keyforge Capture Listener
// Non-grabbing keyboard reader used to capture a single key press

use super::event_loop::{EventLoop, EventLoopError};
use super::filter::DeviceFilter;
use super::keycode::name_for;
use crate::capture::{CaptureError, KeySource};
use crate::{KeyAction, KeyName};

const POLL_TIMEOUT_MS: i32 = 100;

impl From<EventLoopError> for CaptureError {
    fn from(e: EventLoopError) -> Self {
        match e {
            EventLoopError::Permission(reason) => CaptureError::Permission(reason),
            EventLoopError::DeviceNotFound(_) => CaptureError::NoDevices,
            EventLoopError::Io(err) => CaptureError::Failed(err.to_string()),
        }
    }
}

/// Reads keyboards without grabbing them, so typing is never disturbed.
///
/// Keyboards grabbed by a running hook deliver nothing here.
pub struct EvdevKeySource {
    event_loop: EventLoop,
}

impl EvdevKeySource {
    pub fn open(filter: &DeviceFilter) -> Result<Self, CaptureError> {
        Ok(Self {
            event_loop: EventLoop::open(filter, false)?,
        })
    }
}

impl KeySource for EvdevKeySource {
    fn next_key_down(&mut self) -> Result<KeyName, CaptureError> {
        loop {
            for event in self.event_loop.poll_key_events(POLL_TIMEOUT_MS)? {
                if KeyAction::from_evdev_value(event.value) != Some(KeyAction::Down) {
                    continue;
                }
                if let Some(name) = name_for(event.code) {
                    return Ok(KeyName::new(name));
                }
            }
        }
    }
}

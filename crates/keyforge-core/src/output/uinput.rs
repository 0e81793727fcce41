// Keyforge uinput Output
// Virtual keyboard device that emits synthetic and passed-through keys

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use log::{debug, trace};
use parking_lot::Mutex;

use super::state::PressedKeyState;
use super::OutputError;
use crate::engine::{KeySynthesizer, SynthError};
use crate::input::{code_for, VIRTUAL_DEVICE_PREFIX};
use crate::{KeyAction, KeyName};

struct Inner {
    device: VirtualDevice,
    pressed: PressedKeyState,
}

/// The virtual keyboard.
///
/// Shared between the hook thread (pass-through) and the dispatcher
/// (synthesis); each write takes the device lock for one event.
pub struct VirtualKeyboard {
    inner: Mutex<Inner>,
}

impl VirtualKeyboard {
    pub fn new() -> Result<Self, OutputError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..256u16 {
            keys.insert(Key::new(code));
        }

        let name = format!("{} Keyboard", VIRTUAL_DEVICE_PREFIX);
        let device = VirtualDeviceBuilder::new()
            .map_err(OutputError::creation)?
            .name(&name)
            .with_keys(&keys)
            .map_err(OutputError::creation)?
            .build()
            .map_err(OutputError::creation)?;
        debug!("Created virtual keyboard '{}'", name);

        Ok(Self {
            inner: Mutex::new(Inner {
                device,
                pressed: PressedKeyState::new(),
            }),
        })
    }

    /// Emit one transition for a raw code
    pub fn emit_code(&self, code: u16, action: KeyAction) -> Result<(), OutputError> {
        let key_event = InputEvent::new(EventType::KEY, code, action.evdev_value());
        // The kernel only delivers the key after a SYN_REPORT
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

        let mut inner = self.inner.lock();
        inner
            .device
            .emit(&[key_event, syn_event])
            .map_err(|e| OutputError::Write(e.to_string()))?;
        inner.pressed.apply(code, action);
        trace!("uinput {} {}", code, action);
        Ok(())
    }

    pub fn is_pressed(&self, code: u16) -> bool {
        self.inner.lock().pressed.is_pressed(code)
    }

    pub fn pressed_count(&self) -> usize {
        self.inner.lock().pressed.len()
    }

    /// Release every code this device still holds down
    pub fn release_all(&self) -> Result<usize, OutputError> {
        let held = self.inner.lock().pressed.take_all();
        for code in &held {
            self.emit_code(*code, KeyAction::Up)?;
        }
        Ok(held.len())
    }
}

impl KeySynthesizer for VirtualKeyboard {
    fn synthesize(&self, key: &KeyName, action: KeyAction) -> Result<(), SynthError> {
        let code = code_for(key.as_str()).ok_or_else(|| SynthError::UnknownKey(key.clone()))?;
        self.emit_code(code, action).map_err(SynthError::from)
    }
}

impl Drop for VirtualKeyboard {
    fn drop(&mut self) {
        let _ = self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_keyboard_creation() {
        // Needs write access to /dev/uinput
        match VirtualKeyboard::new() {
            Ok(kb) => {
                kb.emit_code(30, KeyAction::Down).unwrap();
                assert!(kb.is_pressed(30));
                assert_eq!(kb.release_all().unwrap(), 1);
                assert_eq!(kb.pressed_count(), 0);
            }
            Err(e) => println!("Skipping test: {}", e),
        }
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        match VirtualKeyboard::new() {
            Ok(kb) => {
                let err = kb
                    .synthesize(&KeyName::new("hyper"), KeyAction::Down)
                    .unwrap_err();
                assert_eq!(err, SynthError::UnknownKey(KeyName::new("hyper")));
            }
            Err(e) => println!("Skipping test: {}", e),
        }
    }
}

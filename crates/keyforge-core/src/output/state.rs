// Keyforge Pressed Key State
// Which key codes are currently down on an output device

use std::collections::BTreeSet;

use crate::KeyAction;

/// Codes currently held, ordered so release sequences are deterministic
#[derive(Debug, Clone, Default)]
pub struct PressedKeyState {
    pressed: BTreeSet<u16>,
}

impl PressedKeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition; auto-repeat leaves the state unchanged
    pub fn apply(&mut self, code: u16, action: KeyAction) {
        match action {
            KeyAction::Down => {
                self.pressed.insert(code);
            }
            KeyAction::Up => {
                self.pressed.remove(&code);
            }
            KeyAction::Repeat => {}
        }
    }

    pub fn is_pressed(&self, code: u16) -> bool {
        self.pressed.contains(&code)
    }

    /// Empty the state, returning what was held (highest code first)
    pub fn take_all(&mut self) -> Vec<u16> {
        let codes = self.pressed.iter().rev().copied().collect();
        self.pressed.clear();
        codes
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}

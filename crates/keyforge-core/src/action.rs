use std::fmt;

/// One physical key transition as reported by the input layer.
///
/// The numeric values follow the evdev `value` field of an `EV_KEY` event:
///   0 == released
///   1 == pressed
///   2 == auto-repeat while held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum KeyAction {
    Up = 0,
    Down = 1,
    Repeat = 2,
}

impl KeyAction {
    /// True for the initial press only
    pub fn is_down(self) -> bool {
        matches!(self, KeyAction::Down)
    }

    /// True for a release
    pub fn is_up(self) -> bool {
        matches!(self, KeyAction::Up)
    }

    /// True while the key is held (press or auto-repeat)
    pub fn is_held(self) -> bool {
        matches!(self, KeyAction::Down | KeyAction::Repeat)
    }

    /// Decode an evdev event value
    pub fn from_evdev_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyAction::Up),
            1 => Some(KeyAction::Down),
            2 => Some(KeyAction::Repeat),
            _ => None,
        }
    }

    /// Encode as an evdev event value
    pub fn evdev_value(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Up => write!(f, "up"),
            KeyAction::Down => write!(f, "down"),
            KeyAction::Repeat => write!(f, "repeat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_evdev_value() {
        assert_eq!(KeyAction::from_evdev_value(0), Some(KeyAction::Up));
        assert_eq!(KeyAction::from_evdev_value(1), Some(KeyAction::Down));
        assert_eq!(KeyAction::from_evdev_value(2), Some(KeyAction::Repeat));
        assert_eq!(KeyAction::from_evdev_value(3), None);
        assert_eq!(KeyAction::from_evdev_value(-1), None);
    }

    #[test]
    fn test_evdev_value_matches_discriminant() {
        for action in [KeyAction::Up, KeyAction::Down, KeyAction::Repeat] {
            assert_eq!(KeyAction::from_evdev_value(action.evdev_value()), Some(action));
        }
    }

    #[test]
    fn test_predicates() {
        assert!(KeyAction::Down.is_down());
        assert!(!KeyAction::Repeat.is_down());
        assert!(KeyAction::Repeat.is_held());
        assert!(KeyAction::Up.is_up());
        assert!(!KeyAction::Up.is_held());
    }
}

// Keyforge Input Layer - Device Filtering
// Which keyboards to grab: all detected ones, or the ones the user named

/// Device selection from the `[input] devices` setting.
///
/// An entry matches a device whose path equals it or whose name contains
/// it, ignoring case. With no entries every real keyboard is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    patterns: Vec<String>,
}

impl DeviceFilter {
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True when no devices were named
    pub fn is_autodetect(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str, path: &str, is_keyboard: bool, is_virtual: bool) -> bool {
        // Our own output device is never an input, even when named
        if is_virtual {
            return false;
        }

        if self.is_autodetect() {
            return is_keyboard;
        }

        let name = name.to_lowercase();
        self.patterns
            .iter()
            .any(|p| path.eq_ignore_ascii_case(p) || name.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> DeviceFilter {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        DeviceFilter::new(&owned)
    }

    #[test]
    fn test_autodetect_takes_keyboards_only() {
        let f = filter(&[]);
        assert!(f.is_autodetect());
        assert!(f.matches("Generic Keyboard", "/dev/input/event0", true, false));
        assert!(!f.matches("Generic Mouse", "/dev/input/event1", false, false));
    }

    #[test]
    fn test_blank_patterns_mean_autodetect() {
        assert!(filter(&["", "   "]).is_autodetect());
    }

    #[test]
    fn test_matches_by_path() {
        let f = filter(&["/dev/input/event3"]);
        assert!(f.matches("Logitech Keyboard", "/dev/input/event3", true, false));
        assert!(!f.matches("Logitech Keyboard", "/dev/input/event4", true, false));
    }

    #[test]
    fn test_matches_name_substring_case_insensitively() {
        let f = filter(&["keychron"]);
        assert!(f.matches("Keychron K2 Keyboard", "/dev/input/event7", true, false));
        assert!(!f.matches("AT Translated Set 2 keyboard", "/dev/input/event2", true, false));
    }

    #[test]
    fn test_named_device_need_not_look_like_keyboard() {
        let f = filter(&["Macro Pad"]);
        assert!(f.matches("Macro Pad", "/dev/input/event9", false, false));
    }

    #[test]
    fn test_virtual_device_never_matches() {
        assert!(!filter(&[]).matches("Keyforge (virtual) Keyboard", "/dev/input/event5", true, true));
        assert!(!filter(&["keyforge"]).matches(
            "Keyforge (virtual) Keyboard",
            "/dev/input/event5",
            true,
            true
        ));
    }
}

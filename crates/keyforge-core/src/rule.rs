// Keyforge Remap Rules
// A single source -> target remapping and its persisted record shape

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use crate::KeyName;

/// How a remapped key behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum RemapMode {
    /// The target is held exactly as long as the source is held
    #[default]
    #[strum(serialize = "hold", serialize = "mantener")]
    Hold,
    /// Each press of the source latches the target down or releases it
    #[strum(serialize = "toggle", serialize = "intercalar")]
    Toggle,
}

impl RemapMode {
    /// Canonical lowercase spelling, as written to configuration
    pub fn as_str(self) -> &'static str {
        match self {
            RemapMode::Hold => "hold",
            RemapMode::Toggle => "toggle",
        }
    }
}

impl fmt::Display for RemapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RemapMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .trim()
            .parse()
            .map_err(|_| format!("Unknown remap mode: {:?} (expected \"hold\" or \"toggle\")", value))
    }
}

impl From<RemapMode> for String {
    fn from(mode: RemapMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Runtime on/off state of a toggle rule.
///
/// The latch is written by the hook thread and read by the UI thread, so it
/// is an atomic shared between the editable rule list and the dispatch
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct ToggleLatch(Arc<AtomicBool>);

impl ToggleLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Flip the latch and return the new state
    pub fn flip(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Release);
    }

    /// Reset to off, returning whether it was on
    pub fn reset(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// One remap rule: `source` is intercepted and `target` is synthesized instead.
///
/// A rule whose source equals its target is allowed; it is a no-op remap.
/// Clones share the toggle latch, so a rule read out of the table reports
/// the live toggle state.
#[derive(Debug, Clone)]
pub struct KeyRule {
    source: KeyName,
    target: KeyName,
    mode: RemapMode,
    enabled: bool,
    latch: ToggleLatch,
}

impl KeyRule {
    pub fn new(source: KeyName, target: KeyName, mode: RemapMode, enabled: bool) -> Self {
        Self {
            source,
            target,
            mode,
            enabled,
            latch: ToggleLatch::new(),
        }
    }

    pub fn source(&self) -> &KeyName {
        &self.source
    }

    pub fn target(&self) -> &KeyName {
        &self.target
    }

    pub fn mode(&self) -> RemapMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a toggle rule currently holds its target down
    pub fn toggle_active(&self) -> bool {
        self.latch.is_on()
    }

    pub(crate) fn latch(&self) -> &ToggleLatch {
        &self.latch
    }

    pub(crate) fn with_latch(mut self, latch: ToggleLatch) -> Self {
        self.latch = latch;
        self
    }

    /// Build the persisted record for this rule
    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            key_to_replace: self.source.to_string(),
            replacement_key: self.target.to_string(),
            mode: self.mode,
            enabled: self.enabled,
            toggle_active: self.toggle_active(),
        }
    }
}

impl fmt::Display for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.target, self.mode)?;
        if !self.enabled {
            write!(f, " [disabled]")?;
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Rule shape exchanged with configuration storage.
///
/// Missing `mode` defaults to hold and missing `enabled` to true.
/// `toggle_active` is written out for inspection and ignored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub key_to_replace: String,
    pub replacement_key: String,
    #[serde(default)]
    pub mode: RemapMode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub toggle_active: bool,
}

impl RuleRecord {
    pub fn new(key_to_replace: &str, replacement_key: &str, mode: RemapMode, enabled: bool) -> Self {
        Self {
            key_to_replace: key_to_replace.to_string(),
            replacement_key: replacement_key.to_string(),
            mode,
            enabled,
            toggle_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Records {
        rules: Vec<RuleRecord>,
    }

    #[test]
    fn test_mode_parses_case_insensitively() {
        assert_eq!("Hold".parse::<RemapMode>().unwrap(), RemapMode::Hold);
        assert_eq!("TOGGLE".parse::<RemapMode>().unwrap(), RemapMode::Toggle);
        assert!("latch".parse::<RemapMode>().is_err());
    }

    #[test]
    fn test_mode_accepts_legacy_spellings() {
        assert_eq!("mantener".parse::<RemapMode>().unwrap(), RemapMode::Hold);
        assert_eq!("intercalar".parse::<RemapMode>().unwrap(), RemapMode::Toggle);
    }

    #[test]
    fn test_mode_display_is_canonical() {
        assert_eq!(RemapMode::Hold.to_string(), "hold");
        assert_eq!(RemapMode::Toggle.to_string(), "toggle");
        assert_eq!(String::from(RemapMode::Hold), "hold");
    }

    #[test]
    fn test_record_defaults() {
        let parsed: Records = toml::from_str(
            r#"
[[rules]]
key_to_replace = "alt"
replacement_key = "shift"
"#,
        )
        .unwrap();
        let record = &parsed.rules[0];
        assert_eq!(record.mode, RemapMode::Hold);
        assert!(record.enabled);
        assert!(!record.toggle_active);
    }

    #[test]
    fn test_record_rejects_unknown_mode() {
        let parsed: Result<Records, _> = toml::from_str(
            r#"
[[rules]]
key_to_replace = "alt"
replacement_key = "shift"
mode = "sticky"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_latch_flip_and_reset() {
        let latch = ToggleLatch::new();
        assert!(!latch.is_on());
        assert!(latch.flip());
        assert!(latch.is_on());
        assert!(!latch.flip());
        latch.set(true);
        assert!(latch.reset());
        assert!(!latch.is_on());
        assert!(!latch.reset());
    }

    #[test]
    fn test_rule_clones_share_latch() {
        let rule = KeyRule::new("a".into(), "b".into(), RemapMode::Toggle, true);
        let view = rule.clone();
        rule.latch().flip();
        assert!(view.toggle_active());
    }

    #[test]
    fn test_to_record_round_trips_fields() {
        let rule = KeyRule::new("Caps Lock".into(), "esc".into(), RemapMode::Toggle, false);
        let record = rule.to_record();
        assert_eq!(record.key_to_replace, "caps lock");
        assert_eq!(record.replacement_key, "esc");
        assert_eq!(record.mode, RemapMode::Toggle);
        assert!(!record.enabled);
        assert_eq!(rule.to_string(), "caps lock -> esc (toggle) [disabled]");
    }
}

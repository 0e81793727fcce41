// Keyforge Settings Module
// Loads the remap rules and foreground gate options from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rule::RuleRecord;
use crate::window::DEFAULT_CACHE_TTL;

/// Default interval for polling the foreground window when the provider
/// cannot push focus changes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Settings for keyforge
///
/// Loaded from a TOML file (default: ~/.config/keyforge/config.toml).
/// Keys this version does not know about are ignored.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Only remap while the target app is in the foreground
    enforce_app_focus: bool,

    /// Case-insensitive substring of the target window title
    target_app_name: String,

    rules: Vec<RuleRecord>,

    poll_interval: Duration,

    cache_ttl: Duration,

    /// Keyboard name filter for the native hook; empty means all keyboards
    devices: Vec<String>,

    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML write error: {0}")]
    TomlWrite(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, Deserialize, Default)]
struct SettingsToml {
    #[serde(default)]
    enforce_app_focus: Option<toml::Value>,

    #[serde(default)]
    target_app_name: Option<String>,

    #[serde(default)]
    rules: Vec<RuleRecord>,

    #[serde(default)]
    gate: Option<GateSettings>,

    #[serde(default)]
    input: Option<InputSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct GateSettings {
    #[serde(default)]
    poll_interval_ms: Option<u64>,

    #[serde(default)]
    cache_ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct InputSettings {
    #[serde(default)]
    devices: Vec<String>,
}

/// Serialized form; tables follow plain values so the TOML writer accepts it
#[derive(Serialize)]
struct SettingsOut<'a> {
    enforce_app_focus: bool,
    target_app_name: &'a str,
    gate: GateSettings,
    input: InputSettings,
    rules: &'a [RuleRecord],
}

impl Settings {
    /// Create settings with every default
    pub fn new() -> Self {
        Self {
            enforce_app_focus: true,
            target_app_name: String::new(),
            rules: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cache_ttl: DEFAULT_CACHE_TTL,
            devices: Vec::new(),
            source_path: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let toml_settings: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(value) = toml_settings.enforce_app_focus {
            settings.enforce_app_focus = parse_bool_value(&value)?;
        }
        if let Some(name) = toml_settings.target_app_name {
            settings.target_app_name = name;
        }
        settings.rules = toml_settings.rules;

        if let Some(gate) = toml_settings.gate {
            if let Some(ms) = gate.poll_interval_ms {
                if ms == 0 {
                    return Err(SettingsError::InvalidValue(
                        "gate.poll_interval_ms must be greater than zero".to_string(),
                    ));
                }
                settings.poll_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = gate.cache_ttl_ms {
                settings.cache_ttl = Duration::from_millis(ms);
            }
        }

        if let Some(input) = toml_settings.input {
            settings.devices = input.devices;
        }

        Ok(settings)
    }

    /// Get the default settings path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keyforge").join("config.toml"))
    }

    /// Load from default location (~/.config/keyforge/config.toml)
    pub fn load_default() -> Result<Self, SettingsError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::new())
    }

    /// Load from `path`, or the default location when none is given
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load_default(),
        }
    }

    /// Reload settings from the file they were loaded from
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        if let Some(ref path) = self.source_path {
            let new_settings = Self::from_file(path)?;
            *self = new_settings;
            Ok(())
        } else {
            Err(SettingsError::InvalidValue("No source path set".to_string()))
        }
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        let out = SettingsOut {
            enforce_app_focus: self.enforce_app_focus,
            target_app_name: &self.target_app_name,
            gate: GateSettings {
                poll_interval_ms: Some(self.poll_interval.as_millis() as u64),
                cache_ttl_ms: Some(self.cache_ttl.as_millis() as u64),
            },
            input: InputSettings {
                devices: self.devices.clone(),
            },
            rules: &self.rules,
        };
        toml::to_string_pretty(&out).map_err(|e| SettingsError::TomlWrite(e.to_string()))
    }

    /// Write the settings to `path`, creating parent directories
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        self.source_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn enforce_app_focus(&self) -> bool {
        self.enforce_app_focus
    }

    pub fn set_enforce_app_focus(&mut self, enforce: bool) {
        self.enforce_app_focus = enforce;
    }

    pub fn target_app_name(&self) -> &str {
        &self.target_app_name
    }

    pub fn set_target_app_name(&mut self, name: &str) {
        self.target_app_name = name.to_string();
    }

    pub fn rules(&self) -> &[RuleRecord] {
        &self.rules
    }

    /// Replace the stored rules, e.g. with `RuleTable::export()`
    pub fn set_rules(&mut self, rules: Vec<RuleRecord>) {
        self.rules = rules;
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

/// Parse a TOML value as a boolean
fn parse_bool_value(value: &toml::Value) -> Result<bool, SettingsError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SettingsError::InvalidValue(format!(
                "Cannot convert '{}' to boolean",
                s
            ))),
        },
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot convert {:?} to boolean",
            value
        ))),
    }
}

/// Create default settings content for a new installation
pub fn default_settings_content() -> &'static str {
    r#"# Keyforge Settings
# Place this file at: ~/.config/keyforge/config.toml

# Only remap while the target application has focus
enforce_app_focus = true

# Case-insensitive part of the target window title, e.g. "Notepad"
target_app_name = ""

[gate]
# How often to re-check the foreground window when focus events are unavailable
poll_interval_ms = 500
# How long a foreground query result is reused on the key path
cache_ttl_ms = 50

[input]
# Only grab keyboards whose name contains one of these strings
# devices = ["AT Translated Set 2 keyboard"]

# Rules: mode is "hold" (mirror press/release) or "toggle" (latch on press)
# [[rules]]
# key_to_replace = "caps lock"
# replacement_key = "ctrl"
# mode = "hold"
# enabled = true
"#
}

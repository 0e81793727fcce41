// Keyforge Core Library
// Single-key remapping gated on the foreground application

pub mod action;
pub mod capture;
pub mod engine;
pub mod input;
pub mod key;
pub mod notify;
pub mod output;
pub mod perf;
pub mod rule;
pub mod rules;
pub mod settings;
pub mod timer;
pub mod window;

pub use action::KeyAction;
pub use capture::{CaptureError, KeyCapture, KeySource};
pub use engine::{
    Dispatcher, EngineError, EngineState, EngineStatus, HookError, HookHandler, KeyEventEngine,
    KeySynthesizer, KeyboardHook, SynthError, Verdict,
};
pub use input::{code_for, name_for, DeviceFilter};
pub use key::{KeyGroup, KeyName, COMMON_KEYS};
pub use notify::{ui_channel, UiEvent, UiInbox, UiNotifier, DEFAULT_UI_CAPACITY};
pub use output::OutputError;
pub use perf::{SlowCallTimer, DEFAULT_SLOW_THRESHOLD};
pub use rule::{KeyRule, RemapMode, RuleRecord, ToggleLatch};
pub use rules::{CycleError, RuleError, RuleId, RuleTable, RulesHandle};
pub use settings::{default_settings_content, Settings, SettingsError, DEFAULT_POLL_INTERVAL};
pub use timer::{RepeatingTimer, TimerHandle};
pub use window::{
    detect_provider, FocusSubscription, ForegroundError, ForegroundGate,
    ForegroundWindowProvider, GateStatus, UnavailableProvider, WindowInfo,
};

#[cfg(feature = "native-hook")]
pub use input::{EvdevHook, EvdevKeySource, EventLoop, EventLoopError};
#[cfg(feature = "native-hook")]
pub use output::VirtualKeyboard;

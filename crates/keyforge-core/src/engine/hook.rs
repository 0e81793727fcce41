// Keyforge Hook Seams
//
// The engine talks to the platform through three small traits: something
// that intercepts physical keys, the callback it invokes, and something that
// emits synthetic keys. Tests substitute recording fakes for all three.

use std::sync::Arc;

use super::{HookError, SynthError};
use crate::{KeyAction, KeyName};

/// What to do with the physical event that triggered a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Block the event from reaching any application
    Suppress,
    /// Deliver the event unchanged
    PassThrough,
}

impl Verdict {
    pub fn is_suppress(self) -> bool {
        self == Verdict::Suppress
    }
}

/// Callback run by the hook for every physical key transition
///
/// Runs on the hook thread and must return quickly without unwinding.
pub trait HookHandler: Send + Sync {
    fn on_key(&self, key: &str, action: KeyAction) -> Verdict;

    /// The hook stopped on its own (every keyboard gone, read error)
    ///
    /// Runs on the hook thread after the last `on_key`.
    fn on_hook_lost(&self, _reason: &str) {}
}

/// A suppressing, system-wide keyboard hook
pub trait KeyboardHook: Send {
    /// Start intercepting keys and routing them to `handler`
    fn install(&mut self, handler: Arc<dyn HookHandler>) -> Result<(), HookError>;

    /// Stop intercepting; once this returns no further callbacks run
    fn uninstall(&mut self) -> Result<(), HookError>;

    fn is_installed(&self) -> bool;
}

/// Emits synthetic key transitions to the OS
pub trait KeySynthesizer: Send + Sync {
    fn synthesize(&self, key: &KeyName, action: KeyAction) -> Result<(), SynthError>;
}

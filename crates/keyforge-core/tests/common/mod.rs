// Recording fakes for the platform seams: keyboard hook, key synthesizer and
// foreground window provider.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use keyforge_core::{
    ForegroundError, ForegroundGate, ForegroundWindowProvider, HookError, HookHandler, KeyAction,
    KeyEventEngine, KeyName, KeySynthesizer, KeyboardHook, RemapMode, RuleTable, SynthError,
    UiNotifier, Verdict, WindowInfo,
};
use parking_lot::Mutex;

/// Synthesizer that records every emitted transition
#[derive(Default)]
pub struct RecordingSynth {
    events: Mutex<Vec<(KeyName, KeyAction)>>,
}

impl RecordingSynth {
    pub fn events(&self) -> Vec<(String, KeyAction)> {
        self.events
            .lock()
            .iter()
            .map(|(key, action)| (key.to_string(), *action))
            .collect()
    }

    pub fn count(&self, key: &str, action: KeyAction) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(k, a)| k.as_str() == key && *a == action)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl KeySynthesizer for RecordingSynth {
    fn synthesize(&self, key: &KeyName, action: KeyAction) -> Result<(), SynthError> {
        self.events.lock().push((key.clone(), action));
        Ok(())
    }
}

/// What a fake hook does on install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Succeed,
    DenyPermission,
    NoDevices,
}

/// Keyboard hook driven by the test instead of a device
#[derive(Clone)]
pub struct FakeHook {
    handler: Arc<Mutex<Option<Arc<dyn HookHandler>>>>,
    installs: Arc<Mutex<usize>>,
    outcome: InstallOutcome,
}

impl FakeHook {
    pub fn new() -> Self {
        Self::with_outcome(InstallOutcome::Succeed)
    }

    pub fn with_outcome(outcome: InstallOutcome) -> Self {
        Self {
            handler: Arc::new(Mutex::new(None)),
            installs: Arc::new(Mutex::new(0)),
            outcome,
        }
    }

    /// Deliver a physical event as the OS would
    ///
    /// Without an installed handler the key reaches applications untouched.
    pub fn press(&self, key: &str, action: KeyAction) -> Verdict {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler.on_key(key, action),
            None => Verdict::PassThrough,
        }
    }

    pub fn tap(&self, key: &str) -> Vec<Verdict> {
        vec![self.press(key, KeyAction::Down), self.press(key, KeyAction::Up)]
    }

    /// End the hook underneath the engine, as losing every keyboard would
    pub fn lose(&self, reason: &str) {
        let handler = self.handler.lock().take();
        if let Some(handler) = handler {
            handler.on_hook_lost(reason);
        }
    }

    pub fn installs(&self) -> usize {
        *self.installs.lock()
    }
}

impl KeyboardHook for FakeHook {
    fn install(&mut self, handler: Arc<dyn HookHandler>) -> Result<(), HookError> {
        match self.outcome {
            InstallOutcome::Succeed => {}
            InstallOutcome::DenyPermission => {
                return Err(HookError::Permission("/dev/input/event3".into()))
            }
            InstallOutcome::NoDevices => return Err(HookError::NoDevices),
        }
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        *slot = Some(handler);
        *self.installs.lock() += 1;
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), HookError> {
        self.handler.lock().take();
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.handler.lock().is_some()
    }
}

/// Foreground provider whose focused window the test sets
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    active: Arc<Mutex<Option<WindowInfo>>>,
    open: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn focus(&self, title: &str) {
        *self.active.lock() = Some(WindowInfo::new(title));
    }

    pub fn focus_nothing(&self) {
        *self.active.lock() = None;
    }

    pub fn set_open_windows(&self, titles: &[&str]) {
        *self.open.lock() = titles.iter().map(|t| t.to_string()).collect();
    }
}

impl ForegroundWindowProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn active_window(&self) -> Result<WindowInfo, ForegroundError> {
        self.active
            .lock()
            .clone()
            .ok_or(ForegroundError::NoActiveWindow)
    }

    fn open_windows(&self) -> Result<Vec<String>, ForegroundError> {
        Ok(self.open.lock().clone())
    }
}

/// Engine wired to fakes, plus handles to drive and observe it
pub struct Harness {
    pub table: RuleTable,
    pub gate: Arc<ForegroundGate>,
    pub provider: ScriptedProvider,
    pub synth: Arc<RecordingSynth>,
    pub hook: FakeHook,
    pub engine: KeyEventEngine,
}

impl Harness {
    pub fn new(rules: &[(&str, &str, RemapMode)]) -> Self {
        Self::with_hook(rules, FakeHook::new())
    }

    pub fn with_hook(rules: &[(&str, &str, RemapMode)], hook: FakeHook) -> Self {
        let mut table = RuleTable::new();
        for (source, target, mode) in rules {
            table
                .add(source, target, *mode, true)
                .expect("test rule should be valid");
        }

        let provider = ScriptedProvider::default();
        // No caching, so focus changes are seen on the very next key
        let gate = Arc::new(ForegroundGate::with_cache_ttl(
            Box::new(provider.clone()),
            Duration::ZERO,
        ));
        let synth = Arc::new(RecordingSynth::default());
        let engine = KeyEventEngine::new(
            table.dispatch_handle(),
            gate.clone(),
            synth.clone(),
            Box::new(hook.clone()),
        );

        Self {
            table,
            gate,
            provider,
            synth,
            hook,
            engine,
        }
    }

    pub fn notify_to(mut self, notifier: UiNotifier) -> Self {
        self.engine = self.engine.with_notifier(notifier);
        self
    }

    /// Enforce focus on `target` while `focused` has focus
    pub fn focus_gate(&self, target: &str, focused: &str) {
        self.provider.focus(focused);
        self.gate.set_target_app(target);
        self.gate.set_enforce_focus(true);
        self.gate.update_status();
    }
}

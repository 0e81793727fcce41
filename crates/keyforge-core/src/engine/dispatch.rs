// Keyforge Dispatcher
//
// Per-event remapping logic, run on the hook thread. The state lock is never
// held while a key is synthesized, so a synthetic event that loops back into
// the hook finds its key in `active_keys` and passes through instead of
// deadlocking or recursing.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};

use super::hook::{HookHandler, KeySynthesizer, Verdict};
use super::{EngineStatus, SynthError};
use crate::notify::{UiEvent, UiNotifier};
use crate::perf::{SlowCallTimer, DEFAULT_SLOW_THRESHOLD};
use crate::rules::RulesHandle;
use crate::window::ForegroundGate;
use crate::{KeyAction, KeyName, KeyRule, RemapMode};

#[derive(Debug, Default)]
struct DispatchState {
    /// Source keys currently being dispatched
    active_keys: HashSet<KeyName>,
    /// Targets this dispatcher has pressed and not yet released
    held: HashMap<KeyName, u32>,
}

impl DispatchState {
    fn press(&mut self, target: &KeyName) {
        *self.held.entry(target.clone()).or_insert(0) += 1;
    }

    fn release(&mut self, target: &str) {
        if let Some(count) = self.held.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                self.held.remove(target);
            }
        }
    }
}

/// The engine's hook callback
pub struct Dispatcher {
    rules: RulesHandle,
    gate: Arc<ForegroundGate>,
    synth: Arc<dyn KeySynthesizer>,
    state: Mutex<DispatchState>,
    timer: SlowCallTimer,
    /// Set when the hook ended without being uninstalled
    hook_lost: AtomicBool,
    notifier: RwLock<Option<UiNotifier>>,
}

impl Dispatcher {
    pub fn new(
        rules: RulesHandle,
        gate: Arc<ForegroundGate>,
        synth: Arc<dyn KeySynthesizer>,
    ) -> Self {
        Self {
            rules,
            gate,
            synth,
            state: Mutex::new(DispatchState::default()),
            timer: SlowCallTimer::new("key event", DEFAULT_SLOW_THRESHOLD),
            hook_lost: AtomicBool::new(false),
            notifier: RwLock::new(None),
        }
    }

    pub(crate) fn set_notifier(&self, notifier: UiNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    /// True once the hook died underneath a running engine
    pub fn is_hook_lost(&self) -> bool {
        self.hook_lost.load(Ordering::SeqCst)
    }

    pub fn rules(&self) -> &RulesHandle {
        &self.rules
    }

    pub fn gate(&self) -> &Arc<ForegroundGate> {
        &self.gate
    }

    /// Keys currently mid-dispatch
    pub fn active_keys(&self) -> Vec<KeyName> {
        let mut keys: Vec<_> = self.state.lock().active_keys.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Targets currently held down by synthesized presses
    pub fn held_targets(&self) -> Vec<KeyName> {
        let mut keys: Vec<_> = self.state.lock().held.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Run the remapping algorithm for one physical transition
    pub fn handle_key_event(&self, key: &str, action: KeyAction) -> Verdict {
        if !self.gate.is_active_for_dispatch() {
            return Verdict::PassThrough;
        }

        let key = KeyName::normalized(key);
        let key: &str = &key;
        let rule = {
            let mut state = self.state.lock();
            if state.active_keys.contains(key) {
                return Verdict::PassThrough;
            }
            let Some(rule) = self.rules.lookup(key) else {
                return Verdict::PassThrough;
            };
            state.active_keys.insert(rule.source().clone());
            rule
        };

        let verdict = self.apply(&rule, action);
        self.state.lock().active_keys.remove(rule.source());
        verdict
    }

    fn apply(&self, rule: &KeyRule, action: KeyAction) -> Verdict {
        let output = match rule.mode() {
            RemapMode::Hold => Some(action),
            RemapMode::Toggle => {
                if action.is_down() {
                    if rule.latch().flip() {
                        Some(KeyAction::Down)
                    } else {
                        Some(KeyAction::Up)
                    }
                } else {
                    // Source key-up and auto-repeat never flip the latch
                    None
                }
            }
        };

        let Some(output) = output else {
            return Verdict::Suppress;
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.synth.synthesize(rule.target(), output)
        }))
        .unwrap_or_else(|_| Err(SynthError::Output("synthesizer panicked".to_string())));

        if let Err(e) = result {
            debug!("Synthesizing {} {} failed: {}", rule.target(), output, e);
            if rule.mode() == RemapMode::Toggle {
                rule.latch().flip();
            }
            return Verdict::PassThrough;
        }

        let mut state = self.state.lock();
        match output {
            KeyAction::Down => state.press(rule.target()),
            KeyAction::Up => state.release(rule.target().as_str()),
            KeyAction::Repeat => {}
        }
        Verdict::Suppress
    }

    /// Release every key the dispatcher left down and reset toggle latches
    ///
    /// Latched toggle targets go first, then targets still held by hold
    /// rules. Each target is released once. Call only after the hook is
    /// uninstalled.
    pub fn release_all(&self) -> Vec<KeyName> {
        let mut to_release: Vec<KeyName> = Vec::new();
        {
            let toggles = self.rules.toggle_rules();
            let mut latched: Vec<&KeyRule> = toggles
                .iter()
                .filter(|rule| rule.latch().reset())
                .collect();
            latched.sort_by(|a, b| a.source().cmp(b.source()));

            let mut state = self.state.lock();
            for rule in latched {
                if !to_release.contains(rule.target()) {
                    to_release.push(rule.target().clone());
                }
                state.held.remove(rule.target());
            }

            let mut held: Vec<KeyName> = state.held.drain().map(|(key, _)| key).collect();
            held.sort();
            for key in held {
                if !to_release.contains(&key) {
                    to_release.push(key);
                }
            }
            state.active_keys.clear();
        }

        for key in &to_release {
            if let Err(e) = self.synth.synthesize(key, KeyAction::Up) {
                warn!("Could not release {}: {}", key, e);
            }
        }
        if !to_release.is_empty() {
            debug!("Released {} held keys", to_release.len());
        }
        to_release
    }

    /// Forget all dispatch state without synthesizing anything
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock();
        state.active_keys.clear();
        state.held.clear();
        self.hook_lost.store(false, Ordering::SeqCst);
    }
}

impl HookHandler for Dispatcher {
    fn on_key(&self, key: &str, action: KeyAction) -> Verdict {
        let _timing = self.timer.start();
        match catch_unwind(AssertUnwindSafe(|| self.handle_key_event(key, action))) {
            Ok(verdict) => verdict,
            Err(_) => {
                error!("Key handler panicked on {} {}; passing it through", key, action);
                self.state
                    .lock()
                    .active_keys
                    .remove(&*KeyName::normalized(key));
                Verdict::PassThrough
            }
        }
    }

    fn on_hook_lost(&self, reason: &str) {
        error!("Keyboard hook lost: {}", reason);
        self.hook_lost.store(true, Ordering::SeqCst);
        let released = self.release_all();
        if !released.is_empty() {
            debug!("Released {:?} after losing the hook", released);
        }
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(UiEvent::Engine(EngineStatus::Error(format!(
                "Keyboard hook lost: {}",
                reason
            ))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTable;
    use crate::window::UnavailableProvider;
    use std::sync::Weak;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, KeyAction)>>,
        fail: Mutex<bool>,
        panic: Mutex<bool>,
        echo_to: Mutex<Option<Weak<Dispatcher>>>,
    }

    impl KeySynthesizer for Recorder {
        fn synthesize(&self, key: &KeyName, action: KeyAction) -> Result<(), SynthError> {
            if *self.fail.lock() {
                return Err(SynthError::Output("device gone".into()));
            }
            if *self.panic.lock() {
                panic!("synthesizer bug");
            }
            self.events.lock().push((key.to_string(), action));
            let echo = self.echo_to.lock().clone();
            if let Some(dispatcher) = echo.and_then(|weak| weak.upgrade()) {
                // A synthesized event re-entering the hook
                assert_eq!(dispatcher.on_key(key.as_str(), action), Verdict::PassThrough);
            }
            Ok(())
        }
    }

    fn setup(rules: &[(&str, &str, RemapMode)]) -> (Arc<Dispatcher>, Arc<Recorder>, RuleTable) {
        let mut table = RuleTable::new();
        for (source, target, mode) in rules {
            table.add(source, target, *mode, true).unwrap();
        }
        let gate = Arc::new(ForegroundGate::new(Box::new(UnavailableProvider::default())));
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Arc::new(Dispatcher::new(
            table.dispatch_handle(),
            gate,
            recorder.clone(),
        ));
        (dispatcher, recorder, table)
    }

    fn events(recorder: &Recorder) -> Vec<(String, KeyAction)> {
        recorder.events.lock().clone()
    }

    #[test]
    fn test_unmapped_key_passes_through() {
        let (dispatcher, recorder, _table) = setup(&[("a", "b", RemapMode::Hold)]);
        assert_eq!(dispatcher.on_key("z", KeyAction::Down), Verdict::PassThrough);
        assert!(events(&recorder).is_empty());
    }

    #[test]
    fn test_hold_mirrors_source() {
        let (dispatcher, recorder, _table) = setup(&[("alt", "shift", RemapMode::Hold)]);
        assert_eq!(dispatcher.on_key("alt", KeyAction::Down), Verdict::Suppress);
        assert_eq!(dispatcher.held_targets(), vec![KeyName::new("shift")]);
        assert_eq!(dispatcher.on_key("alt", KeyAction::Repeat), Verdict::Suppress);
        assert_eq!(dispatcher.on_key("alt", KeyAction::Up), Verdict::Suppress);
        assert_eq!(
            events(&recorder),
            vec![
                ("shift".to_string(), KeyAction::Down),
                ("shift".to_string(), KeyAction::Repeat),
                ("shift".to_string(), KeyAction::Up),
            ]
        );
        assert!(dispatcher.held_targets().is_empty());
    }

    #[test]
    fn test_toggle_ignores_up_and_repeat() {
        let (dispatcher, recorder, table) = setup(&[("a", "b", RemapMode::Toggle)]);
        for action in [KeyAction::Down, KeyAction::Repeat, KeyAction::Up, KeyAction::Down] {
            assert_eq!(dispatcher.on_key("a", action), Verdict::Suppress);
        }
        assert_eq!(
            events(&recorder),
            vec![("b".to_string(), KeyAction::Down), ("b".to_string(), KeyAction::Up)]
        );
        assert!(!table.get(0).unwrap().toggle_active());
    }

    #[test]
    fn test_self_mapping_does_not_recurse() {
        let (dispatcher, recorder, _table) = setup(&[("a", "a", RemapMode::Hold)]);
        *recorder.echo_to.lock() = Some(Arc::downgrade(&dispatcher));

        assert_eq!(dispatcher.on_key("a", KeyAction::Down), Verdict::Suppress);
        assert_eq!(events(&recorder), vec![("a".to_string(), KeyAction::Down)]);
        assert!(dispatcher.active_keys().is_empty());
    }

    #[test]
    fn test_synth_failure_rolls_back_toggle() {
        let (dispatcher, recorder, table) = setup(&[("a", "b", RemapMode::Toggle)]);
        *recorder.fail.lock() = true;

        assert_eq!(dispatcher.on_key("a", KeyAction::Down), Verdict::PassThrough);
        assert!(!table.get(0).unwrap().toggle_active());
        assert!(dispatcher.active_keys().is_empty());
        assert!(dispatcher.held_targets().is_empty());
    }

    #[test]
    fn test_synth_panic_degrades_to_pass_through() {
        let (dispatcher, recorder, table) = setup(&[("a", "b", RemapMode::Toggle)]);
        *recorder.panic.lock() = true;

        assert_eq!(dispatcher.on_key("a", KeyAction::Down), Verdict::PassThrough);
        assert!(!table.get(0).unwrap().toggle_active());
        assert!(dispatcher.active_keys().is_empty());

        *recorder.panic.lock() = false;
        assert_eq!(dispatcher.on_key("a", KeyAction::Down), Verdict::Suppress);
        assert!(table.get(0).unwrap().toggle_active());
    }

    #[test]
    fn test_release_all_once_per_target() {
        let (dispatcher, recorder, table) = setup(&[
            ("a", "x", RemapMode::Toggle),
            ("b", "y", RemapMode::Hold),
            ("c", "y", RemapMode::Hold),
        ]);
        dispatcher.on_key("a", KeyAction::Down);
        dispatcher.on_key("b", KeyAction::Down);
        dispatcher.on_key("c", KeyAction::Down);
        recorder.events.lock().clear();

        let released = dispatcher.release_all();
        assert_eq!(released, vec![KeyName::new("x"), KeyName::new("y")]);
        assert_eq!(
            events(&recorder),
            vec![("x".to_string(), KeyAction::Up), ("y".to_string(), KeyAction::Up)]
        );
        assert!(!table.get(0).unwrap().toggle_active());
        assert!(dispatcher.release_all().is_empty());
    }

    #[test]
    fn test_release_all_resets_latch_of_disabled_rule() {
        let (dispatcher, recorder, mut table) = setup(&[("a", "b", RemapMode::Toggle)]);
        dispatcher.on_key("a", KeyAction::Down);
        table.set_enabled(0, false).unwrap();
        assert!(table.get(0).unwrap().toggle_active());

        assert_eq!(dispatcher.release_all(), vec![KeyName::new("b")]);
        assert!(!table.get(0).unwrap().toggle_active());
        assert_eq!(
            events(&recorder),
            vec![("b".to_string(), KeyAction::Down), ("b".to_string(), KeyAction::Up)]
        );
    }

    #[test]
    fn test_mixed_case_names_dispatch() {
        let (dispatcher, recorder, _table) = setup(&[("caps lock", "esc", RemapMode::Hold)]);
        assert_eq!(dispatcher.on_key("Caps  Lock", KeyAction::Down), Verdict::Suppress);
        assert_eq!(dispatcher.on_key("CAPS LOCK", KeyAction::Up), Verdict::Suppress);
        assert_eq!(
            events(&recorder),
            vec![("esc".to_string(), KeyAction::Down), ("esc".to_string(), KeyAction::Up)]
        );
        assert!(dispatcher.active_keys().is_empty());
    }
}

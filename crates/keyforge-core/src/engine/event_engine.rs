// Keyforge Key Event Engine
// Owns the hook and moves between Stopped and Running

use std::sync::Arc;

use log::{error, info, warn};

use super::dispatch::Dispatcher;
use super::hook::{HookHandler, KeySynthesizer, KeyboardHook, Verdict};
use super::{EngineError, EngineState, EngineStatus};
use crate::notify::{UiEvent, UiNotifier};
use crate::rules::RulesHandle;
use crate::window::ForegroundGate;
use crate::{KeyAction, KeyName};

/// The remapping engine.
///
/// Constructed once per process and owned by the UI side. The hook thread
/// only ever sees the shared [`Dispatcher`].
pub struct KeyEventEngine {
    hook: Box<dyn KeyboardHook>,
    dispatcher: Arc<Dispatcher>,
    state: EngineState,
    notifier: Option<UiNotifier>,
}

impl KeyEventEngine {
    pub fn new(
        rules: RulesHandle,
        gate: Arc<ForegroundGate>,
        synth: Arc<dyn KeySynthesizer>,
        hook: Box<dyn KeyboardHook>,
    ) -> Self {
        Self {
            hook,
            dispatcher: Arc::new(Dispatcher::new(rules, gate, synth)),
            state: EngineState::Stopped,
            notifier: None,
        }
    }

    /// Post engine state transitions to the UI
    pub fn with_notifier(mut self, notifier: UiNotifier) -> Self {
        self.dispatcher.set_notifier(notifier.clone());
        self.notifier = Some(notifier);
        self
    }

    /// Stopped as soon as the hook is lost, even before `stop` collects it
    pub fn state(&self) -> EngineState {
        if self.state == EngineState::Running && self.dispatcher.is_hook_lost() {
            EngineState::Stopped
        } else {
            self.state
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Install the hook and start remapping
    ///
    /// Refuses to start with no enabled rules. Calling it while running does
    /// nothing; after a lost hook it installs a fresh one.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Running {
            if !self.dispatcher.is_hook_lost() {
                return Ok(());
            }
            self.stop()?;
        }

        if self.dispatcher.rules().enabled_count() == 0 {
            let err = EngineError::NoActiveRules;
            warn!("{}", err);
            self.publish(EngineStatus::Error(err.to_string()));
            return Err(err);
        }

        self.dispatcher.reset();
        let handler: Arc<dyn HookHandler> = self.dispatcher.clone();
        if let Err(e) = self.hook.install(handler) {
            let err = EngineError::from(e);
            error!("Could not start remapping: {}", err);
            self.publish(EngineStatus::Error(err.to_string()));
            return Err(err);
        }

        self.state = EngineState::Running;
        info!(
            "Remapping started with {} active rules",
            self.dispatcher.rules().enabled_count()
        );
        self.publish(EngineStatus::Started);
        Ok(())
    }

    /// Uninstall the hook, then release every key left down
    ///
    /// Keys are only released once the hook reports it is gone, so a late
    /// event cannot re-latch a toggle after cleanup. Calling it while
    /// stopped does nothing.
    pub fn stop(&mut self) -> Result<Vec<KeyName>, EngineError> {
        if self.state != EngineState::Running {
            return Ok(Vec::new());
        }

        if let Err(e) = self.hook.uninstall() {
            let err = EngineError::from(e);
            error!("Could not stop remapping: {}", err);
            self.publish(EngineStatus::Error(err.to_string()));
            return Err(err);
        }

        let released = self.dispatcher.release_all();
        self.state = EngineState::Stopped;
        info!("Remapping stopped");
        self.publish(EngineStatus::Stopped);
        Ok(released)
    }

    /// Feed one key event through the engine, as the hook would
    ///
    /// Passes everything through while stopped.
    pub fn handle_key_event(&self, key: &str, action: KeyAction) -> Verdict {
        if !self.is_running() {
            return Verdict::PassThrough;
        }
        self.dispatcher.on_key(key, action)
    }

    fn publish(&self, status: EngineStatus) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(UiEvent::Engine(status));
        }
    }
}

impl Drop for KeyEventEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Engine dropped while running: {}", e);
        }
    }
}

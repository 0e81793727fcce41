// Keyforge evdev Hook
//
// Grabs the keyboards so nothing reaches applications directly, asks the
// handler about every key transition, and re-emits whatever it lets through
// on the virtual keyboard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use super::event_loop::{EventLoop, EventLoopError, RawKeyEvent};
use super::filter::DeviceFilter;
use super::keycode::name_for;
use crate::engine::{HookError, HookHandler, KeyboardHook, Verdict};
use crate::output::{OutputError, PressedKeyState, VirtualKeyboard};
use crate::KeyAction;

/// How long the hook thread blocks in poll before checking for shutdown
const POLL_TIMEOUT_MS: i32 = 100;

impl From<EventLoopError> for HookError {
    fn from(e: EventLoopError) -> Self {
        match e {
            EventLoopError::Permission(reason) => HookError::Permission(reason),
            EventLoopError::DeviceNotFound(_) => HookError::NoDevices,
            EventLoopError::Io(err) => HookError::Failed(err.to_string()),
        }
    }
}

pub struct EvdevHook {
    filter: DeviceFilter,
    output: Arc<VirtualKeyboard>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EvdevHook {
    pub fn new(filter: DeviceFilter, output: Arc<VirtualKeyboard>) -> Self {
        Self {
            filter,
            output,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl KeyboardHook for EvdevHook {
    fn install(&mut self, handler: Arc<dyn HookHandler>) -> Result<(), HookError> {
        if self.is_installed() {
            return Err(HookError::AlreadyInstalled);
        }
        // A thread that ended on its own only needs reaping
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        // Grab on the caller's thread so failures come back from install()
        let event_loop = EventLoop::open(&self.filter, true)?;
        info!("Hook grabbed {} keyboard(s)", event_loop.device_count());

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let output = self.output.clone();
        let thread = thread::Builder::new()
            .name("keyforge-hook".into())
            .spawn(move || run_hook(event_loop, handler, output, running))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HookError::Failed(e.to_string())
            })?;
        self.thread = Some(thread);
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), HookError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::SeqCst);
        thread
            .join()
            .map_err(|_| HookError::Failed("hook thread panicked".into()))?;
        debug!("Hook thread joined");
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for EvdevHook {
    fn drop(&mut self) {
        if let Err(e) = self.uninstall() {
            warn!("Hook cleanup failed: {}", e);
        }
    }
}

fn run_hook(
    mut event_loop: EventLoop,
    handler: Arc<dyn HookHandler>,
    output: Arc<VirtualKeyboard>,
    running: Arc<AtomicBool>,
) {
    // Keys we passed through and the user is still holding
    let mut passed = PressedKeyState::new();
    let mut lost = None;

    while running.load(Ordering::SeqCst) {
        let events = match event_loop.poll_key_events(POLL_TIMEOUT_MS) {
            Ok(events) => events,
            Err(e) => {
                error!("Keyboard hook stopped: {}", e);
                lost = Some(e.to_string());
                break;
            }
        };
        for event in events {
            forward(&event, handler.as_ref(), &output, &mut passed);
        }
    }

    // Ungrab before releasing so the physical state takes over cleanly
    drop(event_loop);
    release_passed(&mut passed, |code| output.emit_code(code, KeyAction::Up));

    if let Some(reason) = lost {
        running.store(false, Ordering::SeqCst);
        handler.on_hook_lost(&reason);
    }
}

/// Release every passed-through key still down; returns how many succeeded
fn release_passed<F>(passed: &mut PressedKeyState, mut emit_up: F) -> usize
where
    F: FnMut(u16) -> Result<(), OutputError>,
{
    let mut released = 0;
    for code in passed.take_all() {
        match emit_up(code) {
            Ok(()) => released += 1,
            Err(e) => warn!("Could not release key code {}: {}", code, e),
        }
    }
    released
}

fn forward(
    event: &RawKeyEvent,
    handler: &dyn HookHandler,
    output: &VirtualKeyboard,
    passed: &mut PressedKeyState,
) {
    let Some(action) = KeyAction::from_evdev_value(event.value) else {
        return;
    };

    // Keys without a name are never remapped
    let verdict = match name_for(event.code) {
        Some(name) => handler.on_key(name, action),
        None => Verdict::PassThrough,
    };

    if verdict == Verdict::PassThrough {
        match output.emit_code(event.code, action) {
            Ok(()) => passed.apply(event.code, action),
            Err(e) => warn!("Pass-through of {} failed: {}", event.code, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_release_does_not_stop_the_rest() {
        let mut passed = PressedKeyState::new();
        for code in [30, 31, 32] {
            passed.apply(code, KeyAction::Down);
        }

        let mut attempted = Vec::new();
        let released = release_passed(&mut passed, |code| {
            attempted.push(code);
            if code == 31 {
                Err(OutputError::Write("device gone".into()))
            } else {
                Ok(())
            }
        });

        attempted.sort();
        assert_eq!(attempted, vec![30, 31, 32]);
        assert_eq!(released, 2);
        assert!(passed.take_all().is_empty());
    }
}

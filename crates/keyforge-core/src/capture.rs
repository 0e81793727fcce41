// Keyforge Key Capture
//
// One-shot "press a key" detection for rule editors. The listener runs on its
// own thread, never suppresses anything, and reports through the UI channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use thiserror::Error;

use crate::notify::{UiEvent, UiNotifier};
use crate::KeyName;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No keyboard to listen on")]
    NoDevices,

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// A blocking source of physical key presses
pub trait KeySource: Send {
    /// Block until the next key-down and return its name
    fn next_key_down(&mut self) -> Result<KeyName, CaptureError>;
}

/// Clears the in-flight flag even if the listener panics
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight key capture
pub struct KeyCapture {
    in_flight: Arc<AtomicBool>,
    notifier: UiNotifier,
}

impl KeyCapture {
    pub fn new(notifier: UiNotifier) -> Self {
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            notifier,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Capture the next key-down on a background thread
    ///
    /// `open` runs on that thread to create the source. The result arrives
    /// as [`UiEvent::KeyCaptured`]. Returns false without doing anything if
    /// a capture is already pending.
    pub fn listen_for_next_key<F, S>(&self, open: F) -> bool
    where
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
        S: KeySource,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Key capture already in progress");
            return false;
        }

        let guard = InFlight(self.in_flight.clone());
        let notifier = self.notifier.clone();
        let spawned = thread::Builder::new()
            .name("keyforge-capture".into())
            .spawn(move || {
                let result = open().and_then(|mut source| source.next_key_down());
                if let Err(e) = &result {
                    warn!("Key capture failed: {}", e);
                }
                // Free the slot first so the UI can start another capture
                // as soon as it sees this result
                drop(guard);
                // Wait out a full inbox; a dropped capture would hang the editor
                notifier.deliver(UiEvent::KeyCaptured(result.map_err(|e| e.to_string())));
            });

        match spawned {
            Ok(_) => true,
            Err(e) => {
                self.in_flight.store(false, Ordering::Release);
                self.notifier
                    .notify(UiEvent::KeyCaptured(Err(format!("Capture thread failed: {}", e))));
                false
            }
        }
    }
}

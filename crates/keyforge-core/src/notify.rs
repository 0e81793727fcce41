// Keyforge UI Notifications
//
// Background threads (hook, focus listener, key capture) never call into the
// UI directly. They post a UiEvent on a bounded channel and the UI thread
// drains it from its own loop.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, SyncSender, TrySendError};
use std::time::Duration;

use log::debug;

use crate::engine::EngineStatus;
use crate::window::GateStatus;
use crate::KeyName;

/// Default capacity of the UI channel
pub const DEFAULT_UI_CAPACITY: usize = 64;

/// A notification for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Engine state transition
    Engine(EngineStatus),
    /// Gate status after a poll
    Gate(GateStatus),
    /// Focus moved (event-driven providers only); `None` when nothing has focus
    Focus {
        title: Option<String>,
        status: GateStatus,
    },
    /// Result of a key capture
    KeyCaptured(Result<KeyName, String>),
}

/// Create a bounded UI channel
pub fn ui_channel(capacity: usize) -> (UiNotifier, UiInbox) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (UiNotifier { tx }, UiInbox { rx })
}

/// Sending half, cloned into background threads
#[derive(Debug, Clone)]
pub struct UiNotifier {
    tx: SyncSender<UiEvent>,
}

impl UiNotifier {
    /// Post an event without blocking
    ///
    /// Returns false when the event was dropped because the inbox is full or
    /// gone.
    pub fn notify(&self, event: UiEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!("UI inbox full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                debug!("UI inbox closed, dropping {:?}", event);
                false
            }
        }
    }

    /// Post an event, waiting for room if the inbox is full
    ///
    /// For background threads whose result must not be lost. Never call it
    /// from the thread that drains the inbox.
    pub fn deliver(&self, event: UiEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(SendError(event)) => {
                debug!("UI inbox closed, dropping {:?}", event);
                false
            }
        }
    }
}

/// Receiving half, owned by the UI thread
#[derive(Debug)]
pub struct UiInbox {
    rx: Receiver<UiEvent>,
}

impl UiInbox {
    /// Take every pending event
    pub fn drain(&self) -> Vec<UiEvent> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UiEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Hand every pending event to `handler`, returning how many were handled
    pub fn dispatch<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(UiEvent),
    {
        let mut handled = 0;
        for event in self.rx.try_iter() {
            handler(event);
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_events_arrive_in_order() {
        let (notifier, inbox) = ui_channel(8);
        notifier.notify(UiEvent::Engine(EngineStatus::Started));
        notifier.notify(UiEvent::Gate(GateStatus::Active));
        assert_eq!(
            inbox.drain(),
            vec![
                UiEvent::Engine(EngineStatus::Started),
                UiEvent::Gate(GateStatus::Active)
            ]
        );
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_full_inbox_drops_without_blocking() {
        let (notifier, inbox) = ui_channel(1);
        assert!(notifier.notify(UiEvent::Gate(GateStatus::Active)));
        assert!(!notifier.notify(UiEvent::Gate(GateStatus::Inactive)));
        assert_eq!(inbox.drain(), vec![UiEvent::Gate(GateStatus::Active)]);
    }

    #[test]
    fn test_deliver_waits_for_room() {
        let (notifier, inbox) = ui_channel(1);
        assert!(notifier.notify(UiEvent::Gate(GateStatus::Active)));
        let worker = thread::spawn(move || notifier.deliver(UiEvent::Gate(GateStatus::Inactive)));
        assert_eq!(
            inbox.recv_timeout(Duration::from_secs(5)),
            Some(UiEvent::Gate(GateStatus::Active))
        );
        assert_eq!(
            inbox.recv_timeout(Duration::from_secs(5)),
            Some(UiEvent::Gate(GateStatus::Inactive))
        );
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_closed_inbox_drops() {
        let (notifier, inbox) = ui_channel(4);
        drop(inbox);
        assert!(!notifier.notify(UiEvent::Engine(EngineStatus::Stopped)));
    }

    #[test]
    fn test_cross_thread_delivery() {
        let (notifier, inbox) = ui_channel(4);
        let worker = thread::spawn(move || {
            notifier.notify(UiEvent::KeyCaptured(Ok(KeyName::new("f5"))));
        });
        let event = inbox.recv_timeout(Duration::from_secs(2));
        worker.join().unwrap();
        assert_eq!(event, Some(UiEvent::KeyCaptured(Ok(KeyName::new("f5")))));
    }

    #[test]
    fn test_dispatch_counts_events() {
        let (notifier, inbox) = ui_channel(4);
        notifier.notify(UiEvent::Engine(EngineStatus::Started));
        notifier.notify(UiEvent::Engine(EngineStatus::Error("denied".into())));
        let mut seen = Vec::new();
        assert_eq!(inbox.dispatch(|event| seen.push(event)), 2);
        assert_eq!(seen.len(), 2);
        assert_eq!(inbox.recv_timeout(Duration::from_millis(10)), None);
    }
}

// Keyforge Repeating Timer
// Cancellable periodic callback with an explicit owner

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

pub struct RepeatingTimer;

impl RepeatingTimer {
    /// Run `tick` every `interval` until the handle stops
    pub fn start<F>(interval: Duration, tick: F) -> io::Result<TimerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        Self::start_named("keyforge-timer", interval, tick)
    }

    pub fn start_named<F>(name: &str, interval: Duration, mut tick: F) -> io::Result<TimerHandle>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let label = name.to_string();
        let thread = thread::Builder::new().name(name.to_string()).spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Timer {} stopped", label);
        })?;

        Ok(TimerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owner of a running timer; dropping it stops the timer
#[derive(Debug)]
pub struct TimerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Stop the timer and wait for an in-progress tick to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

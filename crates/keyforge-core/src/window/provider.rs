// Foreground Window Provider Trait
//
// This module defines the interface for foreground window providers,
// which report the focused window so remapping can be scoped to one app.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error type for foreground window queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForegroundError {
    /// Not connected to a display server
    #[error("Not connected to a display server")]
    NotConnected,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Nothing has focus right now
    #[error("No active window")]
    NoActiveWindow,
}

/// The focused window as reported by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowInfo {
    /// Application id or WM_CLASS, when the platform exposes it
    pub app_id: Option<String>,

    /// Window title (e.g., "Untitled - Notepad")
    pub title: String,
}

impl WindowInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            app_id: None,
            title: title.into(),
        }
    }

    pub fn with_app_id(title: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            title: title.into(),
        }
    }

    /// Case-insensitive substring match against an already lowercased target
    ///
    /// A window without a title never matches; an empty target matches any
    /// titled window.
    pub fn matches_target(&self, target_lower: &str) -> bool {
        if self.title.trim().is_empty() {
            return false;
        }
        self.title.to_lowercase().contains(target_lower)
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.app_id {
            Some(app_id) => write!(f, "{} [{}]", self.title, app_id),
            None => f.write_str(&self.title),
        }
    }
}

/// Callback invoked from a provider thread when focus changes
///
/// `None` means focus left every tracked window (desktop, lock screen,
/// a closed window).
pub type FocusListener = Arc<dyn Fn(Option<&WindowInfo>) + Send + Sync>;

/// Registration returned by [`ForegroundWindowProvider::subscribe`].
///
/// Cancelling (or dropping) it removes the listener; no call is made after
/// `cancel` returns.
pub struct FocusSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl FocusSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for FocusSubscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for FocusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Trait for foreground window providers
///
/// Implementations report the focused window of one window system
/// (Wayland, X11, ...). The gate depends only on this interface.
pub trait ForegroundWindowProvider: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Connect to the window system
    ///
    /// This may spawn background threads for event handling.
    fn connect(&mut self) -> Result<(), ForegroundError> {
        Ok(())
    }

    /// Disconnect and release any background threads
    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        true
    }

    /// Get the currently focused window
    fn active_window(&self) -> Result<WindowInfo, ForegroundError>;

    /// Titles of all top-level windows, unfiltered
    fn open_windows(&self) -> Result<Vec<String>, ForegroundError>;

    /// Register for focus-change notifications
    ///
    /// Returns None when the backend can only be polled.
    fn subscribe(&self, _listener: FocusListener) -> Option<FocusSubscription> {
        None
    }
}

/// Provider used when no display server is reachable
///
/// Every query fails, so an enforced gate stays closed.
#[derive(Debug, Default)]
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl ForegroundWindowProvider for UnavailableProvider {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn active_window(&self) -> Result<WindowInfo, ForegroundError> {
        Err(ForegroundError::NotConnected)
    }

    fn open_windows(&self) -> Result<Vec<String>, ForegroundError> {
        Err(ForegroundError::NotConnected)
    }
}

// Wayland Foreground Provider
//
// This module wraps WaylandClient to implement the
// ForegroundWindowProvider trait.

use super::provider::{
    FocusListener, FocusSubscription, ForegroundError, ForegroundWindowProvider, WindowInfo,
};
use super::wayland::WaylandClient;

/// Event-driven provider for wlroots-based compositors
pub struct WaylandProvider {
    client: WaylandClient,
}

impl WaylandProvider {
    pub fn new() -> Self {
        Self {
            client: WaylandClient::new(),
        }
    }

    /// Get the underlying Wayland client
    pub fn client(&self) -> &WaylandClient {
        &self.client
    }
}

impl Default for WaylandProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundWindowProvider for WaylandProvider {
    fn name(&self) -> &'static str {
        "wayland"
    }

    /// Spawns a background thread to handle Wayland events.
    fn connect(&mut self) -> Result<(), ForegroundError> {
        self.client.connect()
    }

    fn disconnect(&mut self) {
        self.client.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn active_window(&self) -> Result<WindowInfo, ForegroundError> {
        self.client.active_window()
    }

    fn open_windows(&self) -> Result<Vec<String>, ForegroundError> {
        self.client.window_titles()
    }

    fn subscribe(&self, listener: FocusListener) -> Option<FocusSubscription> {
        if !self.client.is_connected() {
            return None;
        }
        Some(self.client.add_listener(listener))
    }
}

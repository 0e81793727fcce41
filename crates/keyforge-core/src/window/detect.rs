// Foreground provider selection

use std::env;

use log::{info, warn};

use super::provider::{ForegroundWindowProvider, UnavailableProvider};
use super::wayland_provider::WaylandProvider;

/// Display servers visible in the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHints {
    pub wayland: bool,
    pub x11: bool,
}

impl SessionHints {
    pub fn from_env() -> Self {
        let set = |name: &str| env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false);
        Self {
            wayland: set("WAYLAND_DISPLAY"),
            x11: set("DISPLAY"),
        }
    }
}

/// Pick and connect the best provider for this session
///
/// Wayland is preferred because it pushes focus changes; X11 is polled.
/// When nothing connects the gate gets an [`UnavailableProvider`], which
/// keeps an enforced gate closed.
pub fn detect_provider() -> Box<dyn ForegroundWindowProvider> {
    detect_with(SessionHints::from_env())
}

pub fn detect_with(hints: SessionHints) -> Box<dyn ForegroundWindowProvider> {
    let mut failures = Vec::new();

    if hints.wayland {
        let mut provider = WaylandProvider::new();
        match provider.connect() {
            Ok(()) => {
                info!("Foreground window provider: wayland");
                return Box::new(provider);
            }
            Err(e) => {
                warn!("Wayland foreground tracking unavailable: {}", e);
                failures.push(format!("wayland: {}", e));
            }
        }
    }

    if hints.x11 {
        if let Some(provider) = connect_x11(&mut failures) {
            return provider;
        }
    }

    let reason = if failures.is_empty() {
        "no display server detected".to_string()
    } else {
        failures.join("; ")
    };
    warn!("No foreground window provider ({})", reason);
    Box::new(UnavailableProvider::new(reason))
}

#[cfg(feature = "x11-backend")]
fn connect_x11(failures: &mut Vec<String>) -> Option<Box<dyn ForegroundWindowProvider>> {
    let mut provider = super::x11::X11Provider::new();
    match provider.connect() {
        Ok(()) => {
            info!("Foreground window provider: x11");
            Some(Box::new(provider))
        }
        Err(e) => {
            warn!("X11 foreground tracking unavailable: {}", e);
            failures.push(format!("x11: {}", e));
            None
        }
    }
}

#[cfg(not(feature = "x11-backend"))]
fn connect_x11(failures: &mut Vec<String>) -> Option<Box<dyn ForegroundWindowProvider>> {
    failures.push("x11: built without the x11-backend feature".to_string());
    None
}

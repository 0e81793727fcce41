//! Foreground window module
//!
//! This module tracks the focused window and gates remapping on it.

mod cache;
mod detect;
mod gate;
mod provider;
mod wayland;
mod wayland_provider;
#[cfg(feature = "x11-backend")]
mod x11;

pub use cache::{CachedQuery, TitleCache, DEFAULT_CACHE_TTL};
pub use detect::{detect_provider, detect_with, SessionHints};
pub use gate::{ForegroundGate, GateStatus};
pub use provider::{
    FocusListener, FocusSubscription, ForegroundError, ForegroundWindowProvider,
    UnavailableProvider, WindowInfo,
};
pub use wayland::WaylandClient;
pub use wayland_provider::WaylandProvider;
#[cfg(feature = "x11-backend")]
pub use x11::X11Provider;

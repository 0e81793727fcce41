//! Wayland foreground tracking using wlr-foreign-toplevel-management-unstable-v1
//!
//! This module handles the connection to Wayland compositors and tracks
//! every toplevel's title plus which one is activated, on wlroots-based
//! compositors. Focus changes are pushed to registered listeners.

use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use std::{env, fs};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use wayland_client::{
    event_created_child,
    globals::{registry_queue_init, GlobalListContents},
    protocol::wl_registry,
    Connection, Dispatch, Proxy, QueueHandle,
};
use wayland_protocols_wlr::foreign_toplevel::v1::client::{
    zwlr_foreign_toplevel_handle_v1 as toplevel_handle,
    zwlr_foreign_toplevel_manager_v1 as toplevel_manager,
};

use super::provider::{FocusListener, FocusSubscription, ForegroundError, WindowInfo};

/// How long `disconnect` waits for the dispatch thread to see `finished`
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
struct Toplevel {
    app_id: String,
    title: String,
}

/// Toplevels known to the dispatch thread, keyed by protocol id
#[derive(Debug, Default)]
struct Toplevels {
    windows: HashMap<u32, Toplevel>,
    active: Option<u32>,
}

impl Toplevels {
    fn active_window(&self) -> Option<WindowInfo> {
        let info = self.windows.get(&self.active?)?;
        Some(WindowInfo {
            app_id: (!info.app_id.is_empty()).then(|| info.app_id.clone()),
            title: info.title.clone(),
        })
    }

    fn titles(&self) -> Vec<String> {
        self.windows.values().map(|w| w.title.clone()).collect()
    }

    /// Apply a state event; returns whether the focused window changed
    fn set_activated(&mut self, id: u32, activated: bool) -> bool {
        if !self.windows.contains_key(&id) {
            return false;
        }
        if activated {
            if self.active == Some(id) {
                return false;
            }
            self.active = Some(id);
            true
        } else if self.active == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Forget a closed toplevel; returns whether it had focus
    fn close(&mut self, id: u32) -> bool {
        self.windows.remove(&id);
        if self.active == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

type Listeners = Arc<Mutex<Vec<(u64, FocusListener)>>>;

fn notify_listeners(toplevels: &RwLock<Toplevels>, listeners: &Mutex<Vec<(u64, FocusListener)>>) {
    let window = toplevels.read().active_window();
    // Held across the calls so a cancelled listener is never invoked late
    let listeners = listeners.lock();
    for (_, listener) in listeners.iter() {
        listener(window.as_ref());
    }
}

fn is_activated(raw_states: &[u8]) -> bool {
    let activated = toplevel_handle::State::Activated as u32;
    raw_states
        .chunks_exact(4)
        .any(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) == activated)
}

/// State owned by the dispatch thread
struct WaylandState {
    toplevels: Arc<RwLock<Toplevels>>,
    listeners: Listeners,
    focus_dirty: bool,
    finished: bool,
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        _state: &mut Self,
        _registry: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _globals: &GlobalListContents,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        // Registry events are handled via the globals list
    }
}

impl Dispatch<toplevel_manager::ZwlrForeignToplevelManagerV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _manager: &toplevel_manager::ZwlrForeignToplevelManagerV1,
        event: toplevel_manager::Event,
        _: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        match event {
            toplevel_manager::Event::Toplevel { toplevel } => {
                state
                    .toplevels
                    .write()
                    .windows
                    .insert(toplevel.id().protocol_id(), Toplevel::default());
            }
            toplevel_manager::Event::Finished => {
                state.finished = true;
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, toplevel_manager::ZwlrForeignToplevelManagerV1, [
        0 => (toplevel_handle::ZwlrForeignToplevelHandleV1, ())
    ]);
}

impl Dispatch<toplevel_handle::ZwlrForeignToplevelHandleV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        handle: &toplevel_handle::ZwlrForeignToplevelHandleV1,
        event: toplevel_handle::Event,
        _: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        let id = handle.id().protocol_id();
        match event {
            toplevel_handle::Event::Title { title } => {
                let mut toplevels = state.toplevels.write();
                if let Some(info) = toplevels.windows.get_mut(&id) {
                    info.title = title;
                    state.focus_dirty |= toplevels.active == Some(id);
                }
            }
            toplevel_handle::Event::AppId { app_id } => {
                let mut toplevels = state.toplevels.write();
                if let Some(info) = toplevels.windows.get_mut(&id) {
                    info.app_id = app_id;
                    state.focus_dirty |= toplevels.active == Some(id);
                }
            }
            toplevel_handle::Event::State { state: raw_states } => {
                let changed = state
                    .toplevels
                    .write()
                    .set_activated(id, is_activated(&raw_states));
                state.focus_dirty |= changed;
            }
            toplevel_handle::Event::Done => {
                // All pending state for this toplevel has been applied
                if state.focus_dirty {
                    state.focus_dirty = false;
                    notify_listeners(&state.toplevels, &state.listeners);
                }
            }
            toplevel_handle::Event::Closed => {
                // No done follows closed, so a lost focus is reported here
                let lost_focus = state.toplevels.write().close(id);
                handle.destroy();
                if lost_focus {
                    state.focus_dirty = false;
                    notify_listeners(&state.toplevels, &state.listeners);
                }
            }
            _ => {}
        }
    }
}

struct Session {
    connection: Connection,
    manager: toplevel_manager::ZwlrForeignToplevelManagerV1,
    thread: Option<thread::JoinHandle<()>>,
}

/// Wayland client for wlroots compositors
///
/// Connects to the Wayland display and tracks all toplevels with the
/// wlr-foreign-toplevel management protocol on a background thread.
pub struct WaylandClient {
    toplevels: Arc<RwLock<Toplevels>>,
    listeners: Listeners,
    next_listener: AtomicU64,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
}

impl WaylandClient {
    fn parse_wayland_display_suffix(name: &str) -> Option<u32> {
        let suffix = name.strip_prefix("wayland-")?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        suffix.parse::<u32>().ok()
    }

    fn discover_wayland_displays() -> Vec<String> {
        let runtime_dir = match env::var("XDG_RUNTIME_DIR") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Vec::new(),
        };

        let mut displays: Vec<(u32, String)> = Vec::new();
        if let Ok(entries) = fs::read_dir(runtime_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if let Some(name) = name.to_str() {
                    if let Some(order) = Self::parse_wayland_display_suffix(name) {
                        displays.push((order, name.to_string()));
                    }
                }
            }
        }

        displays.sort_by(|a, b| b.0.cmp(&a.0));
        displays.into_iter().map(|(_, name)| name).collect()
    }

    /// WAYLAND_DISPLAY first, then any other `wayland-N` sockets
    fn display_candidates() -> Vec<String> {
        let mut candidates = Vec::new();
        if let Ok(display) = env::var("WAYLAND_DISPLAY") {
            if !display.trim().is_empty() {
                candidates.push(display);
            }
        }
        for display in Self::discover_wayland_displays() {
            if !candidates.contains(&display) {
                candidates.push(display);
            }
        }
        candidates
    }

    fn socket_path(display: &str) -> Option<PathBuf> {
        let path = PathBuf::from(display);
        if path.is_absolute() {
            return Some(path);
        }
        let runtime_dir = env::var_os("XDG_RUNTIME_DIR")?;
        Some(PathBuf::from(runtime_dir).join(path))
    }

    fn open_connection() -> Result<Connection, ForegroundError> {
        let candidates = Self::display_candidates();
        if candidates.is_empty() {
            return Err(ForegroundError::ConnectionFailed(
                "No Wayland display found".to_string(),
            ));
        }

        for display in candidates {
            let Some(path) = Self::socket_path(&display) else {
                continue;
            };
            match UnixStream::connect(&path).map(Connection::from_socket) {
                Ok(Ok(connection)) => {
                    debug!("Connected to Wayland display {}", display);
                    return Ok(connection);
                }
                Ok(Err(e)) => debug!("Wayland display {} rejected: {}", display, e),
                Err(e) => debug!("Wayland socket {} unreachable: {}", path.display(), e),
            }
        }
        Err(ForegroundError::ConnectionFailed(
            "Failed to connect to any Wayland display".to_string(),
        ))
    }

    pub fn new() -> Self {
        Self {
            toplevels: Arc::new(RwLock::new(Toplevels::default())),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        }
    }

    /// Connect to the Wayland display
    ///
    /// Reads the initial toplevel list before returning, then keeps
    /// following updates on a background thread.
    pub fn connect(&self) -> Result<(), ForegroundError> {
        if self.is_connected() {
            return Ok(());
        }

        let connection = Self::open_connection()?;
        let (globals, mut event_queue) = registry_queue_init::<WaylandState>(&connection)
            .map_err(|e| ForegroundError::ConnectionFailed(e.to_string()))?;
        let qhandle = event_queue.handle();

        let manager = globals
            .bind::<toplevel_manager::ZwlrForeignToplevelManagerV1, _, _>(&qhandle, 1..=3, ())
            .map_err(|e| {
                ForegroundError::ConnectionFailed(format!(
                    "Compositor lacks wlr-foreign-toplevel-management: {}",
                    e
                ))
            })?;

        let mut state = WaylandState {
            toplevels: self.toplevels.clone(),
            listeners: self.listeners.clone(),
            focus_dirty: false,
            finished: false,
        };
        event_queue
            .roundtrip(&mut state)
            .map_err(|e| ForegroundError::ConnectionFailed(e.to_string()))?;

        self.connected.store(true, Ordering::Release);
        let connected = self.connected.clone();
        let thread = thread::Builder::new()
            .name("keyforge-wayland".into())
            .spawn(move || {
                while !state.finished {
                    if let Err(e) = event_queue.blocking_dispatch(&mut state) {
                        warn!("Wayland dispatch failed: {}", e);
                        break;
                    }
                }
                connected.store(false, Ordering::Release);
                debug!("Wayland dispatch thread finished");
            })
            .map_err(|e| ForegroundError::ConnectionFailed(e.to_string()))?;

        info!(
            "Tracking {} Wayland toplevels",
            self.toplevels.read().windows.len()
        );
        *self.session.lock() = Some(Session {
            connection,
            manager,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop the toplevel manager and let the dispatch thread end
    pub fn disconnect(&self) {
        let Some(mut session) = self.session.lock().take() else {
            return;
        };
        session.manager.stop();
        if let Err(e) = session.connection.flush() {
            debug!("Wayland flush on disconnect failed: {}", e);
        }

        if let Some(thread) = session.thread.take() {
            let deadline = Instant::now() + DISCONNECT_GRACE;
            while !thread.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if thread.is_finished() {
                let _ = thread.join();
            } else {
                debug!("Wayland dispatch thread still waiting for the compositor");
            }
        }
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn active_window(&self) -> Result<WindowInfo, ForegroundError> {
        if !self.is_connected() {
            return Err(ForegroundError::NotConnected);
        }
        self.toplevels
            .read()
            .active_window()
            .ok_or(ForegroundError::NoActiveWindow)
    }

    pub fn window_titles(&self) -> Result<Vec<String>, ForegroundError> {
        if !self.is_connected() {
            return Err(ForegroundError::NotConnected);
        }
        Ok(self.toplevels.read().titles())
    }

    /// Register a focus listener, called from the dispatch thread
    pub fn add_listener(&self, listener: FocusListener) -> FocusSubscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));

        let listeners = Arc::downgrade(&self.listeners);
        FocusSubscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    #[cfg(test)]
    fn insert_for_test(&self, id: u32, app_id: &str, title: &str, active: bool) {
        let mut toplevels = self.toplevels.write();
        toplevels.windows.insert(
            id,
            Toplevel {
                app_id: app_id.to_string(),
                title: title.to_string(),
            },
        );
        if active {
            toplevels.active = Some(id);
        }
    }

    #[cfg(test)]
    fn set_connected_for_test(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl Default for WaylandClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WaylandClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wayland_client_new() {
        let client = WaylandClient::new();
        assert!(!client.is_connected());
        assert_eq!(client.active_window(), Err(ForegroundError::NotConnected));
        assert!(client.window_titles().is_err());
    }

    #[test]
    fn test_active_window_from_toplevels() {
        let client = WaylandClient::new();
        client.set_connected_for_test(true);
        client.insert_for_test(1, "org.gnome.TextEditor", "notes.txt", false);
        assert_eq!(client.active_window(), Err(ForegroundError::NoActiveWindow));

        client.insert_for_test(2, "", "Calculator", true);
        assert_eq!(client.active_window(), Ok(WindowInfo::new("Calculator")));

        let mut titles = client.window_titles().unwrap();
        titles.sort();
        assert_eq!(titles, vec!["Calculator", "notes.txt"]);
    }

    #[test]
    fn test_listeners_notified_until_cancelled() {
        let client = WaylandClient::new();
        client.insert_for_test(7, "foot", "shell", true);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = client.add_listener(Arc::new(move |window: Option<&WindowInfo>| {
            sink.lock().push(window.map(|w| w.title.clone()));
        }));
        assert_eq!(client.listener_count(), 1);

        notify_listeners(&client.toplevels, &client.listeners);
        subscription.cancel();
        notify_listeners(&client.toplevels, &client.listeners);

        assert_eq!(client.listener_count(), 0);
        assert_eq!(seen.lock().as_slice(), &[Some("shell".to_string())]);
    }

    #[test]
    fn test_deactivation_without_successor_reports_no_focus() {
        let client = WaylandClient::new();
        client.insert_for_test(3, "org.kde.kate", "notes - Notepad", true);
        client.insert_for_test(4, "foot", "shell", false);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = client.add_listener(Arc::new(move |window: Option<&WindowInfo>| {
            sink.lock().push(window.map(|w| w.title.clone()));
        }));

        // Focus moves to the desktop: the window is deactivated, nothing else is
        assert!(client.toplevels.write().set_activated(3, false));
        notify_listeners(&client.toplevels, &client.listeners);
        assert!(!client.toplevels.write().set_activated(4, false));

        assert!(client.toplevels.write().set_activated(4, true));
        assert!(client.toplevels.write().close(4));
        notify_listeners(&client.toplevels, &client.listeners);
        assert!(!client.toplevels.write().close(3));

        assert_eq!(seen.lock().as_slice(), &[None, None]);
    }

    #[test]
    fn test_is_activated_decodes_state_array() {
        let activated = (toplevel_handle::State::Activated as u32).to_ne_bytes();
        let maximized = (toplevel_handle::State::Maximized as u32).to_ne_bytes();

        assert!(!is_activated(&[]));
        assert!(!is_activated(&maximized));
        let mut both = maximized.to_vec();
        both.extend_from_slice(&activated);
        assert!(is_activated(&both));
    }

    #[test]
    fn test_discover_wayland_displays() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("wayland-1"), b"").unwrap();
        fs::write(tmp.path().join("wayland-0"), b"").unwrap();
        fs::write(tmp.path().join("wayland-1.lock"), b"").unwrap();
        fs::write(tmp.path().join("wayland-abc"), b"").unwrap();
        fs::write(tmp.path().join("not-wayland"), b"").unwrap();

        let prev = env::var("XDG_RUNTIME_DIR").ok();
        env::set_var("XDG_RUNTIME_DIR", tmp.path());
        let displays = WaylandClient::discover_wayland_displays();
        let socket = WaylandClient::socket_path("wayland-0");
        match prev {
            Some(v) => env::set_var("XDG_RUNTIME_DIR", v),
            None => env::remove_var("XDG_RUNTIME_DIR"),
        }

        assert_eq!(displays, vec!["wayland-1".to_string(), "wayland-0".to_string()]);
        assert_eq!(socket, Some(tmp.path().join("wayland-0")));
    }

    #[test]
    fn test_socket_path_absolute() {
        assert_eq!(
            WaylandClient::socket_path("/run/user/1000/wayland-9"),
            Some(PathBuf::from("/run/user/1000/wayland-9"))
        );
    }

    #[test]
    fn test_parse_wayland_display_suffix() {
        assert_eq!(WaylandClient::parse_wayland_display_suffix("wayland-0"), Some(0));
        assert_eq!(WaylandClient::parse_wayland_display_suffix("wayland-12"), Some(12));
        assert_eq!(WaylandClient::parse_wayland_display_suffix("wayland-1.lock"), None);
        assert_eq!(WaylandClient::parse_wayland_display_suffix("not-wayland-1"), None);
    }
}

// X11 Foreground Provider
//
// Queries EWMH properties on the root window. X11 has no cheap focus-change
// push without selecting PropertyNotify on the root, so this backend is
// polled and the gate's TTL cache bounds the round trips.

use log::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::provider::{ForegroundError, ForegroundWindowProvider, WindowInfo};

struct Atoms {
    net_active_window: Atom,
    net_client_list: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
}

struct X11Session {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

fn query_err(e: impl std::fmt::Display) -> ForegroundError {
    ForegroundError::QueryFailed(e.to_string())
}

impl X11Session {
    fn open() -> Result<Self, ForegroundError> {
        let (conn, screen) =
            x11rb::connect(None).map_err(|e| ForegroundError::ConnectionFailed(e.to_string()))?;
        let root = conn
            .setup()
            .roots
            .get(screen)
            .map(|s| s.root)
            .ok_or_else(|| ForegroundError::ConnectionFailed(format!("No screen {}", screen)))?;

        let intern = |name: &[u8]| -> Result<Atom, ForegroundError> {
            Ok(conn
                .intern_atom(false, name)
                .map_err(query_err)?
                .reply()
                .map_err(query_err)?
                .atom)
        };
        let atoms = Atoms {
            net_active_window: intern(b"_NET_ACTIVE_WINDOW")?,
            net_client_list: intern(b"_NET_CLIENT_LIST")?,
            net_wm_name: intern(b"_NET_WM_NAME")?,
            utf8_string: intern(b"UTF8_STRING")?,
        };
        Ok(Self { conn, root, atoms })
    }

    fn windows_property(&self, property: Atom, max: u32) -> Result<Vec<Window>, ForegroundError> {
        let reply = self
            .conn
            .get_property(false, self.root, property, AtomEnum::WINDOW, 0, max)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;
        Ok(reply
            .value32()
            .map(|values| values.filter(|w| *w != x11rb::NONE).collect())
            .unwrap_or_default())
    }

    fn title(&self, window: Window) -> Result<String, ForegroundError> {
        let reply = self
            .conn
            .get_property(false, window, self.atoms.net_wm_name, self.atoms.utf8_string, 0, u32::MAX)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;
        if !reply.value.is_empty() {
            return Ok(String::from_utf8_lossy(&reply.value).into_owned());
        }

        // Legacy clients only set WM_NAME
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, u32::MAX)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn wm_class(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
            .ok()?
            .reply()
            .ok()?;
        // WM_CLASS is "instance\0class\0"; the class part names the app
        reply
            .value
            .split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .last()
            .map(|class| String::from_utf8_lossy(class).into_owned())
    }
}

/// Polled provider for X11 sessions
pub struct X11Provider {
    session: Option<X11Session>,
}

impl X11Provider {
    pub fn new() -> Self {
        Self { session: None }
    }

    fn session(&self) -> Result<&X11Session, ForegroundError> {
        self.session.as_ref().ok_or(ForegroundError::NotConnected)
    }
}

impl Default for X11Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundWindowProvider for X11Provider {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn connect(&mut self) -> Result<(), ForegroundError> {
        if self.session.is_none() {
            self.session = Some(X11Session::open()?);
            debug!("Connected to X11 display");
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.session = None;
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn active_window(&self) -> Result<WindowInfo, ForegroundError> {
        let session = self.session()?;
        let window = session
            .windows_property(session.atoms.net_active_window, 1)?
            .into_iter()
            .next()
            .ok_or(ForegroundError::NoActiveWindow)?;
        Ok(WindowInfo {
            app_id: session.wm_class(window),
            title: session.title(window)?,
        })
    }

    fn open_windows(&self) -> Result<Vec<String>, ForegroundError> {
        let session = self.session()?;
        let mut titles = Vec::new();
        for window in session.windows_property(session.atoms.net_client_list, u32::MAX)? {
            // Windows can vanish between the list and the title query
            match session.title(window) {
                Ok(title) => titles.push(title),
                Err(e) => debug!("Skipping window {:#x}: {}", window, e),
            }
        }
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_by_default() {
        let provider = X11Provider::new();
        assert_eq!(provider.name(), "x11");
        assert!(!provider.is_connected());
        assert_eq!(provider.active_window(), Err(ForegroundError::NotConnected));
        assert_eq!(provider.open_windows(), Err(ForegroundError::NotConnected));
    }

    #[test]
    fn test_connect_without_display_fails_cleanly() {
        if std::env::var_os("DISPLAY").is_some() {
            return;
        }
        let mut provider = X11Provider::new();
        assert!(matches!(
            provider.connect(),
            Err(ForegroundError::ConnectionFailed(_))
        ));
        assert!(!provider.is_connected());
    }
}

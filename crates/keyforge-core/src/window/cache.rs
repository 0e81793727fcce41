// Keyforge Foreground Cache
// Short-lived memo of the last foreground query for the per-keystroke path

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{ForegroundError, WindowInfo};

/// Default lifetime of a cached foreground query
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(50);

/// Result of one foreground query plus whether it matched the target
#[derive(Debug, Clone)]
pub struct CachedQuery {
    pub window: Result<WindowInfo, ForegroundError>,
    pub matched: bool,
}

#[derive(Debug)]
struct Entry {
    taken: Instant,
    query: CachedQuery,
}

/// Holds the last foreground query for a fixed TTL.
///
/// A burst of key events inside the TTL reuses one query instead of asking
/// the display server on every keystroke. Failed queries are cached as well,
/// so an erroring backend is not hammered either.
#[derive(Debug)]
pub struct TitleCache {
    ttl: Duration,
    slot: Mutex<Option<Entry>>,
}

impl TitleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Matched flag of the cached query, refreshing it first if stale
    pub fn matched_or_refresh<F>(&self, refresh: F) -> bool
    where
        F: FnOnce() -> CachedQuery,
    {
        self.matched_or_refresh_at(Instant::now(), refresh)
    }

    pub(crate) fn matched_or_refresh_at<F>(&self, now: Instant, refresh: F) -> bool
    where
        F: FnOnce() -> CachedQuery,
    {
        let mut slot = self.slot.lock();
        if let Some(entry) = slot.as_ref() {
            if now.saturating_duration_since(entry.taken) < self.ttl {
                return entry.query.matched;
            }
        }
        let query = refresh();
        let matched = query.matched;
        *slot = Some(Entry { taken: now, query });
        matched
    }

    /// Store a query taken elsewhere (polling, focus events)
    pub fn store(&self, query: CachedQuery) {
        *self.slot.lock() = Some(Entry {
            taken: Instant::now(),
            query,
        });
    }

    /// Window from the last query, regardless of age
    pub fn last_window(&self) -> Option<WindowInfo> {
        self.slot
            .lock()
            .as_ref()
            .and_then(|entry| entry.query.window.as_ref().ok().cloned())
    }

    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for TitleCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

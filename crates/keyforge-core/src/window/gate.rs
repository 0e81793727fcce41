// Keyforge Foreground Gate
//
// Decides whether remapping is live based on the focus configuration and the
// focused window's title. The hook thread reads it on every keystroke; the
// UI thread configures it and drives polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use strum_macros::{AsRefStr, Display};

use super::cache::{CachedQuery, TitleCache};
use super::provider::{FocusSubscription, ForegroundError, ForegroundWindowProvider, WindowInfo};
use crate::notify::{UiEvent, UiNotifier};

/// Gate state as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum GateStatus {
    /// Focus enforcement is off; remapping applies everywhere
    GlobalMode,
    /// The target application has focus
    Active,
    /// Some other window has focus, or the query failed
    Inactive,
}

#[derive(Debug, Default)]
struct Target {
    raw: String,
    lower: String,
}

pub struct ForegroundGate {
    provider: Box<dyn ForegroundWindowProvider>,
    enforce_focus: AtomicBool,
    target: RwLock<Target>,
    is_active: AtomicBool,
    subscribed: AtomicBool,
    subscription: Mutex<Option<FocusSubscription>>,
    cache: TitleCache,
    last_status: Mutex<Option<GateStatus>>,
    notifier: RwLock<Option<UiNotifier>>,
}

impl ForegroundGate {
    /// Create a gate in global mode with an empty target
    pub fn new(provider: Box<dyn ForegroundWindowProvider>) -> Self {
        Self::with_cache_ttl(provider, super::cache::DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(provider: Box<dyn ForegroundWindowProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            enforce_focus: AtomicBool::new(false),
            target: RwLock::new(Target::default()),
            is_active: AtomicBool::new(true),
            subscribed: AtomicBool::new(false),
            subscription: Mutex::new(None),
            cache: TitleCache::new(ttl),
            last_status: Mutex::new(None),
            notifier: RwLock::new(None),
        }
    }

    /// Backend name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Post status changes to the UI
    pub fn set_notifier(&self, notifier: UiNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    pub fn set_target_app(&self, name: &str) {
        {
            let mut target = self.target.write();
            target.raw = name.trim().to_string();
            target.lower = target.raw.to_lowercase();
        }
        debug!("Gate target set to {:?}", name);
        self.config_changed();
    }

    pub fn target_app(&self) -> String {
        self.target.read().raw.clone()
    }

    pub fn set_enforce_focus(&self, enforce: bool) {
        self.enforce_focus.store(enforce, Ordering::Release);
        debug!("Gate focus enforcement {}", if enforce { "on" } else { "off" });
        self.config_changed();
    }

    pub fn enforce_focus(&self) -> bool {
        self.enforce_focus.load(Ordering::Acquire)
    }

    /// Whether the target application currently has focus
    ///
    /// Always true in global mode. Query failures count as inactive.
    pub fn is_target_active(&self) -> bool {
        if !self.enforce_focus() {
            return true;
        }
        self.cache.matched_or_refresh(|| self.query())
    }

    /// Recompute and cache the gate state; called by the polling timer
    pub fn update_status(&self) -> bool {
        let active = if self.enforce_focus() {
            let query = self.query();
            let matched = query.matched;
            self.cache.store(query);
            matched
        } else {
            true
        };
        self.is_active.store(active, Ordering::Release);
        self.report(self.status());
        active
    }

    /// Last computed state, without querying
    pub fn is_active(&self) -> bool {
        !self.enforce_focus() || self.is_active.load(Ordering::Acquire)
    }

    /// Per-keystroke check used by the dispatcher
    ///
    /// With a focus subscription the cached flag is authoritative; otherwise
    /// the TTL cache bounds how often the display server is asked.
    pub fn is_active_for_dispatch(&self) -> bool {
        if !self.enforce_focus() {
            return true;
        }
        if self.subscribed.load(Ordering::Acquire) {
            return self.is_active.load(Ordering::Acquire);
        }
        self.is_target_active()
    }

    pub fn status(&self) -> GateStatus {
        if !self.enforce_focus() {
            GateStatus::GlobalMode
        } else if self.is_active.load(Ordering::Acquire) {
            GateStatus::Active
        } else {
            GateStatus::Inactive
        }
    }

    /// Window seen by the most recent query, if it succeeded
    pub fn last_window(&self) -> Option<WindowInfo> {
        self.cache.last_window()
    }

    /// Titles of all open windows, for a selection list
    ///
    /// Blank titles and exact duplicates are dropped; the result is sorted
    /// case-insensitively so the same snapshot always lists the same way.
    pub fn enumerate_open_windows(&self) -> Vec<String> {
        let titles = match self.provider.open_windows() {
            Ok(titles) => titles,
            Err(e) => {
                warn!("Could not list windows via {}: {}", self.provider.name(), e);
                return Vec::new();
            }
        };

        let unique: IndexSet<String> = titles
            .into_iter()
            .filter(|title| !title.trim().is_empty())
            .collect();
        let mut titles: Vec<String> = unique.into_iter().collect();
        titles.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        titles
    }

    /// Follow focus changes from the provider instead of polling
    ///
    /// `callback` runs on the provider's thread with the new window (`None`
    /// when nothing has focus) and the resulting status. Returns false if
    /// the provider cannot notify, in which case the caller should poll
    /// `update_status`.
    pub fn subscribe_foreground_changes<F>(self: &Arc<Self>, callback: F) -> bool
    where
        F: Fn(Option<&WindowInfo>, GateStatus) + Send + Sync + 'static,
    {
        self.unsubscribe();

        let gate = Arc::downgrade(self);
        let listener = Arc::new(move |window: Option<&WindowInfo>| {
            if let Some(gate) = gate.upgrade() {
                let status = gate.apply_focus(window);
                callback(window, status);
            }
        });

        match self.provider.subscribe(listener) {
            Some(subscription) => {
                *self.subscription.lock() = Some(subscription);
                self.subscribed.store(true, Ordering::Release);
                info!("Following focus changes via {}", self.provider.name());
                self.update_status();
                true
            }
            None => {
                debug!("{} cannot report focus changes", self.provider.name());
                false
            }
        }
    }

    /// Drop the focus subscription, if any
    pub fn unsubscribe(&self) {
        self.subscribed.store(false, Ordering::Release);
        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
            debug!("Focus subscription cancelled");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    fn query(&self) -> CachedQuery {
        let window = self.provider.active_window();
        let matched = match &window {
            Ok(window) => window.matches_target(&self.target.read().lower),
            Err(e) => {
                debug!("Foreground query failed: {}", e);
                false
            }
        };
        CachedQuery { window, matched }
    }

    // Nothing focused fails closed, like a failed query
    fn apply_focus(&self, window: Option<&WindowInfo>) -> GateStatus {
        let matched = window.map_or(false, |w| w.matches_target(&self.target.read().lower));
        self.cache.store(CachedQuery {
            window: window.cloned().ok_or(ForegroundError::NoActiveWindow),
            matched,
        });
        self.is_active
            .store(!self.enforce_focus() || matched, Ordering::Release);

        let status = self.status();
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(UiEvent::Focus {
                title: window.map(|w| w.title.clone()),
                status,
            });
        }
        self.report(status);
        status
    }

    fn config_changed(&self) {
        self.cache.invalidate();
        if self.is_subscribed() || !self.enforce_focus() {
            self.update_status();
        }
    }

    fn report(&self, status: GateStatus) {
        let mut last = self.last_status.lock();
        if *last == Some(status) {
            return;
        }
        *last = Some(status);
        drop(last);

        debug!("Gate status: {}", status);
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify(UiEvent::Gate(status));
        }
    }
}

impl Drop for ForegroundGate {
    fn drop(&mut self) {
        self.unsubscribe();
        self.provider.disconnect();
    }
}

use std::sync::Mutex;

use crate::models::UserProfile;

/// Snapshot of "am I logged in, and as whom".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub authenticated: bool,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    /// Bumped on login/logout so late results from an older session are dropped
    epoch: u64,
}

/// Process-wide session cache. Reads and writes are synchronous.
#[derive(Debug)]
pub struct SessionCache {
    inner: Mutex<Inner>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::restore(false)
    }
}

impl SessionCache {
    /// Initial state at startup: authenticated iff a token was persisted.
    /// The profile is unknown until the first fetch.
    pub fn restore(token_present: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState {
                    authenticated: token_present,
                    user: None,
                },
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Some(profile)` logs in as that profile, `None` logs out.
    pub fn set_authenticated(&self, profile: Option<UserProfile>) {
        let authenticated = profile.is_some();
        self.lock().state = SessionState {
            authenticated,
            user: profile,
        };
    }

    /// Token accepted but the profile has not been fetched yet.
    pub fn mark_pending_profile(&self) {
        self.lock().state = SessionState {
            authenticated: true,
            user: None,
        };
    }

    pub fn clear(&self) {
        self.set_authenticated(None);
    }

    /// Drop the cached profile after a failed fetch that was not a 401,
    /// unless a login/logout happened since `epoch`.
    pub fn forget_profile(&self, epoch: u64) -> bool {
        self.update_if_current(epoch, |s| s.user = None)
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().state.authenticated
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().state.user.clone()
    }

    /// The cached profile, only while authenticated.
    pub fn cached_profile(&self) -> Option<UserProfile> {
        let inner = self.lock();
        if inner.state.authenticated {
            inner.state.user.clone()
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Start a new session era; results tagged with an older epoch are stale.
    pub fn advance_epoch(&self) -> u64 {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.epoch
    }

    /// Apply `f` only if no login/logout happened since `epoch` was read.
    pub fn update_if_current(&self, epoch: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        f(&mut inner.state);
        if !inner.state.authenticated {
            inner.state.user = None;
        }
        true
    }
}

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::AuthBackend;
use crate::auth::{AuthClient, ProfileError};

/// Resolved beta gate for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetaState {
    pub beta_mode_active: bool,
    pub user_allowed: bool,
    pub checked: bool,
}

impl BetaState {
    /// Everyone gets in.
    pub const OPEN: BetaState = BetaState {
        beta_mode_active: false,
        user_allowed: true,
        checked: true,
    };

    /// The user is held at the no-access page.
    pub fn blocks_user(&self) -> bool {
        self.beta_mode_active && !self.user_allowed
    }
}

/// Resolves the beta flag once per process and caches the answer.
///
/// The flag is never re-fetched: a server-side flip only takes effect after
/// the client restarts.
pub struct BetaGate {
    backend: Arc<dyn AuthBackend>,
    auth: Arc<AuthClient>,
    state: OnceCell<BetaState>,
}

impl BetaGate {
    pub fn new(backend: Arc<dyn AuthBackend>, auth: Arc<AuthClient>) -> Self {
        Self {
            backend,
            auth,
            state: OnceCell::new(),
        }
    }

    /// The cached state, if the gate has been resolved.
    pub fn cached(&self) -> Option<BetaState> {
        self.state.get().copied()
    }

    pub async fn check_beta_status(&self) -> BetaState {
        *self.state.get_or_init(|| self.resolve()).await
    }

    async fn resolve(&self) -> BetaState {
        let token = self.auth.token();
        let beta_mode_active = match self.backend.beta_status(token.as_deref()).await {
            Ok(status) => status.is_beta_mode,
            Err(e) => {
                // Fail open: a flag outage must not lock everyone out
                warn!(error = %e, "Failed to fetch beta status, assuming beta mode is off");
                false
            }
        };

        let user_allowed = if beta_mode_active {
            self.resolve_allow_list().await
        } else {
            true
        };

        let state = BetaState {
            beta_mode_active,
            user_allowed,
            checked: true,
        };
        info!(beta_mode_active, user_allowed, "Beta status resolved");
        state
    }

    async fn resolve_allow_list(&self) -> bool {
        if !self.auth.has_token() {
            debug!("Beta mode active and no token, user not allowed");
            return false;
        }
        match self.auth.fetch_profile().await {
            Ok(profile) => profile.is_allowed,
            Err(ProfileError::NoToken) => false,
            Err(e) => {
                warn!(error = ?e, "Failed to resolve beta allow-list membership");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::client::tests::{profile, FakeBackend, ProfileReply};
    use crate::auth::{MemoryTokenStore, TokenStore};
    use crate::models::BetaStatus;
    use std::sync::atomic::Ordering;

    fn gate(backend: Arc<FakeBackend>, token: Option<&str>) -> BetaGate {
        let tokens: Arc<dyn TokenStore> = match token {
            Some(t) => Arc::new(MemoryTokenStore::with_token(t)),
            None => Arc::new(MemoryTokenStore::default()),
        };
        let auth = Arc::new(AuthClient::new(backend.clone(), tokens));
        BetaGate::new(backend, auth)
    }

    fn beta_on(backend: &FakeBackend) {
        *backend.beta.lock().unwrap() = Some(BetaStatus { is_beta_mode: true });
    }

    #[tokio::test]
    async fn test_inactive_beta_allows_everyone() {
        for token in [None, Some("tok")] {
            let backend = Arc::new(FakeBackend::new());
            backend.reply_profile(ProfileReply::Unauthorized);
            let state = gate(Arc::clone(&backend), token).check_beta_status().await;
            assert_eq!(state, BetaState::OPEN);
            assert_eq!(backend.profile_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_flag_outage_fails_open() {
        let backend = Arc::new(FakeBackend::new());
        *backend.beta.lock().unwrap() = None;
        let state = gate(backend, None).check_beta_status().await;
        assert!(!state.beta_mode_active);
        assert!(state.user_allowed);
        assert!(state.checked);
    }

    #[tokio::test]
    async fn test_active_beta_without_token_blocks() {
        let backend = Arc::new(FakeBackend::new());
        beta_on(&backend);
        let state = gate(Arc::clone(&backend), None).check_beta_status().await;
        assert!(state.blocks_user());
        assert_eq!(backend.profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_active_beta_reads_allow_flag() {
        let backend = Arc::new(FakeBackend::new());
        beta_on(&backend);
        backend.reply_profile(ProfileReply::Ok(profile("tester", true)));
        let state = gate(Arc::clone(&backend), Some("tok")).check_beta_status().await;
        assert!(state.beta_mode_active);
        assert!(state.user_allowed);

        let backend = Arc::new(FakeBackend::new());
        beta_on(&backend);
        backend.reply_profile(ProfileReply::Ok(profile("outsider", false)));
        let state = gate(backend, Some("tok")).check_beta_status().await;
        assert!(state.blocks_user());
    }

    #[tokio::test]
    async fn test_profile_failure_means_not_allowed() {
        let backend = Arc::new(FakeBackend::new());
        beta_on(&backend);
        backend.reply_profile(ProfileReply::ServerError);
        let state = gate(backend, Some("tok")).check_beta_status().await;
        assert!(state.blocks_user());
    }

    #[tokio::test]
    async fn test_state_is_cached_forever() {
        let backend = Arc::new(FakeBackend::new());
        let gate = gate(Arc::clone(&backend), None);
        assert!(gate.cached().is_none());
        assert_eq!(gate.check_beta_status().await, BetaState::OPEN);

        // Flipping the flag server-side has no effect on this process
        beta_on(&backend);
        assert_eq!(gate.check_beta_status().await, BetaState::OPEN);
        assert_eq!(backend.beta_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.cached(), Some(BetaState::OPEN));
    }
}

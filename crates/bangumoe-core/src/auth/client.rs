//! Login, registration, profile and token validation against the remote API.
//!
//! `AuthClient` owns the token store and the session cache. Concurrent
//! profile lookups are coalesced into one request, and a 401 from the profile
//! endpoint ends the session exactly once per failed request.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::coalesce::SingleFlight;
use super::session::{SessionCache, SessionState};
use super::token_store::TokenStore;
use crate::api::{ApiError, ApiResult, AuthBackend};
use crate::guard::{login_redirect, Location};
use crate::models::{Credentials, ProfileUpdate, RegistrationForm, UserProfile};

/// Why a profile lookup produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No token stored; nothing was sent
    NoToken,
    /// Server answered 401; the session has been ended
    Expired,
    /// Transport or server failure; the session flag is untouched
    Failed(String),
}

/// Result of validating the stored token against the server.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Valid(UserProfile),
    Missing,
    /// 401; the session has been ended
    Expired,
    /// Server or network trouble; says nothing about the token
    Unavailable,
}

impl TokenStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, TokenStatus::Valid(_))
    }
}

type ProfileLookup = Result<UserProfile, ProfileError>;

/// State shared with the coalesced profile request, which outlives any
/// single caller.
struct AuthCore {
    backend: Arc<dyn AuthBackend>,
    tokens: Arc<dyn TokenStore>,
    session: Arc<SessionCache>,
}

impl AuthCore {
    fn end_session(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear stored token");
        }
        self.session.clear();
        self.session.advance_epoch();
    }

    /// The single network round-trip behind `get_profile`.
    async fn load_profile(self: Arc<Self>) -> ProfileLookup {
        let epoch = self.session.epoch();
        // The token may have been removed while this request was queued
        let Some(token) = self.tokens.get() else {
            self.session.update_if_current(epoch, |s| s.authenticated = false);
            return Err(ProfileError::NoToken);
        };

        match self.backend.fetch_profile(&token).await {
            Ok(profile) => {
                let stored = profile.clone();
                let applied = self.session.update_if_current(epoch, move |s| {
                    s.authenticated = true;
                    s.user = Some(stored);
                });
                if !applied {
                    debug!("Discarding profile fetched for an ended session");
                }
                Ok(profile)
            }
            Err(ApiError::Unauthorized) => {
                if self.session.epoch() == epoch {
                    info!("Profile request rejected with 401, ending session");
                    self.end_session();
                }
                Err(ProfileError::Expired)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch user profile");
                self.session.forget_profile(epoch);
                Err(ProfileError::Failed(e.to_string()))
            }
        }
    }
}

pub struct AuthClient {
    core: Arc<AuthCore>,
    profile_flight: SingleFlight<ProfileLookup>,
}

impl AuthClient {
    /// The session starts out authenticated iff a token is already stored.
    pub fn new(backend: Arc<dyn AuthBackend>, tokens: Arc<dyn TokenStore>) -> Self {
        let session = Arc::new(SessionCache::restore(tokens.has_token()));
        Self::with_session(backend, tokens, session)
    }

    pub fn with_session(
        backend: Arc<dyn AuthBackend>,
        tokens: Arc<dyn TokenStore>,
        session: Arc<SessionCache>,
    ) -> Self {
        Self {
            core: Arc::new(AuthCore {
                backend,
                tokens,
                session,
            }),
            profile_flight: SingleFlight::new(),
        }
    }

    pub fn session(&self) -> &Arc<SessionCache> {
        &self.core.session
    }

    pub fn session_state(&self) -> SessionState {
        self.core.session.snapshot()
    }

    pub fn token(&self) -> Option<String> {
        self.core.tokens.get()
    }

    /// Quick local check; says nothing about whether the server still accepts it.
    pub fn has_token(&self) -> bool {
        self.core.tokens.has_token()
    }

    pub fn is_profile_fetch_in_flight(&self) -> bool {
        self.profile_flight.is_in_flight()
    }

    /// Log in and persist the returned token.
    ///
    /// A response without a token is a failure even on HTTP 200. Any failure
    /// leaves the client logged out.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<Option<UserProfile>> {
        match self.try_login(credentials).await {
            Ok(user) => {
                info!(username = %credentials.username, "Login succeeded");
                Ok(user)
            }
            Err(e) => {
                warn!(username = %credentials.username, error = %e, "Login failed");
                self.logout();
                Err(e)
            }
        }
    }

    async fn try_login(&self, credentials: &Credentials) -> ApiResult<Option<UserProfile>> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::validation("请输入用户名和密码"));
        }

        let response = self.core.backend.login(credentials).await?;
        let token = response
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ApiError::MissingToken)?;

        self.core
            .tokens
            .set(&token)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        // A new session invalidates whatever the old one had in flight
        self.core.session.advance_epoch();
        self.profile_flight.clear();

        match response.user {
            Some(ref user) => self.core.session.set_authenticated(Some(user.clone())),
            None => self.core.session.mark_pending_profile(),
        }
        Ok(response.user)
    }

    /// Register a new account. Does not log in or touch the session.
    pub async fn register(&self, form: &RegistrationForm) -> ApiResult<Option<UserProfile>> {
        form.validate()?;
        let response = self.core.backend.register(form).await.map_err(|e| {
            warn!(username = %form.username, error = %e, "Registration failed");
            e
        })?;
        info!(username = %form.username, "Registration succeeded");
        Ok(response.user)
    }

    /// The current user's profile, or `None` when logged out or the lookup failed.
    pub async fn get_profile(&self) -> Option<UserProfile> {
        self.fetch_profile().await.ok()
    }

    /// Like [`get_profile`](Self::get_profile), reporting why nothing came back.
    ///
    /// Served from the session cache when possible. Otherwise at most one
    /// request is outstanding; concurrent callers share its result.
    pub async fn fetch_profile(&self) -> ProfileLookup {
        if !self.core.tokens.has_token() {
            self.core.session.clear();
            return Err(ProfileError::NoToken);
        }
        if let Some(profile) = self.core.session.cached_profile() {
            return Ok(profile);
        }
        let core = Arc::clone(&self.core);
        self.profile_flight.run(move || core.load_profile()).await
    }

    /// Submit profile changes.
    ///
    /// The session cache is deliberately not refreshed with the response;
    /// callers that display the profile must fetch it again.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        let token = self.core.tokens.get().ok_or(ApiError::NotAuthenticated)?;
        update.validate()?;
        let profile = self.core.backend.update_profile(&token, update).await?;
        info!(?update, "Profile updated");
        Ok(profile)
    }

    /// Validate the stored token against the server.
    pub async fn check_token(&self) -> bool {
        self.validate_token().await.is_valid()
    }

    /// [`check_token`](Self::check_token) with the reason attached.
    ///
    /// Only a 401 ends the session; server errors and network failures
    /// return `Unavailable` and leave it alone.
    pub async fn validate_token(&self) -> TokenStatus {
        let Some(token) = self.core.tokens.get() else {
            self.core.session.clear();
            return TokenStatus::Missing;
        };
        let epoch = self.core.session.epoch();

        match self.core.backend.fetch_profile(&token).await {
            Ok(profile) => {
                let stored = profile.clone();
                self.core.session.update_if_current(epoch, move |s| {
                    s.authenticated = true;
                    s.user = Some(stored);
                });
                TokenStatus::Valid(profile)
            }
            Err(ApiError::Unauthorized) => {
                warn!("Token check failed (401), ending session");
                if self.core.session.epoch() == epoch {
                    self.logout();
                }
                TokenStatus::Expired
            }
            Err(ApiError::Network(e)) => {
                warn!(error = %e, "Token check could not reach the server");
                TokenStatus::Unavailable
            }
            Err(e) => {
                warn!(error = %e, status = ?e.status(), "Token check failed");
                TokenStatus::Unavailable
            }
        }
    }

    /// Clear token, session and any in-flight profile request. Idempotent.
    pub fn logout(&self) {
        self.core.end_session();
        self.profile_flight.clear();
        debug!("Logged out");
    }

    /// Log out and return where the user should be sent: the login page,
    /// carrying `current` as the return target. `None` when `current` is
    /// already the login or register page.
    pub fn handle_token_expiration(&self, current: &Location) -> Option<Location> {
        info!(path = %current, "Handling token expiration");
        self.logout();
        login_redirect(current)
    }

    /// React to a 401 from `path`. The profile and beta endpoints manage the
    /// session themselves; anywhere else the token is treated as expired.
    pub fn observe_unauthorized(&self, path: &str) {
        if crate::api::is_session_probe(path) {
            return;
        }
        warn!(path = path, "Request received 401, clearing session");
        self.logout();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{LoginResponse, RegisterResponse};
    use crate::auth::MemoryTokenStore;
    use crate::models::BetaStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// What the fake server answers on the profile endpoint.
    #[derive(Clone)]
    pub(crate) enum ProfileReply {
        Ok(UserProfile),
        Unauthorized,
        ServerError,
    }

    /// In-memory stand-in for the Bangumoe API.
    pub(crate) struct FakeBackend {
        pub login_reply: Mutex<Option<LoginResponse>>,
        pub profile_reply: Mutex<ProfileReply>,
        pub beta: Mutex<Option<BetaStatus>>,
        pub profile_calls: AtomicUsize,
        pub login_calls: AtomicUsize,
        pub beta_calls: AtomicUsize,
        /// When set, profile requests wait for a notification
        pub profile_gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self {
                login_reply: Mutex::new(None),
                profile_reply: Mutex::new(ProfileReply::Ok(profile("mikan", true))),
                beta: Mutex::new(Some(BetaStatus { is_beta_mode: false })),
                profile_calls: AtomicUsize::new(0),
                login_calls: AtomicUsize::new(0),
                beta_calls: AtomicUsize::new(0),
                profile_gate: None,
            }
        }

        pub fn gated(gate: Arc<Notify>) -> Self {
            Self {
                profile_gate: Some(gate),
                ..Self::new()
            }
        }

        pub fn reply_profile(&self, reply: ProfileReply) {
            *self.profile_reply.lock().unwrap() = reply;
        }

        pub fn reply_login(&self, reply: LoginResponse) {
            *self.login_reply.lock().unwrap() = Some(reply);
        }

        pub fn profile_calls(&self) -> usize {
            self.profile_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn login(&self, _credentials: &Credentials) -> ApiResult<LoginResponse> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            self.login_reply
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ApiError::from_status(reqwest::StatusCode::BAD_REQUEST, r#"{"message":"用户名或密码错误"}"#))
        }

        async fn register(&self, form: &RegistrationForm) -> ApiResult<RegisterResponse> {
            Ok(RegisterResponse {
                user: Some(profile(&form.username, false)),
                message: None,
            })
        }

        async fn fetch_profile(&self, token: &str) -> ApiResult<UserProfile> {
            assert!(!token.is_empty());
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref gate) = self.profile_gate {
                gate.notified().await;
            }
            let reply = self.profile_reply.lock().unwrap().clone();
            match reply {
                ProfileReply::Ok(p) => Ok(p),
                ProfileReply::Unauthorized => Err(ApiError::Unauthorized),
                ProfileReply::ServerError => Err(ApiError::from_status(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    "",
                )),
            }
        }

        async fn update_profile(&self, _token: &str, update: &ProfileUpdate) -> ApiResult<UserProfile> {
            if matches!(*self.profile_reply.lock().unwrap(), ProfileReply::Unauthorized) {
                return Err(ApiError::Unauthorized);
            }
            let mut p = profile("mikan", true);
            if let Some(ref email) = update.email {
                p.email = email.clone();
            }
            Ok(p)
        }

        async fn beta_status(&self, _token: Option<&str>) -> ApiResult<BetaStatus> {
            self.beta_calls.fetch_add(1, Ordering::SeqCst);
            self.beta
                .lock()
                .unwrap()
                .ok_or_else(|| ApiError::from_status(reqwest::StatusCode::BAD_GATEWAY, ""))
        }
    }

    pub(crate) fn profile(username: &str, is_allowed: bool) -> UserProfile {
        UserProfile {
            id: 1,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            avatar: None,
            role: "user".to_string(),
            is_allowed,
            created_at: None,
            updated_at: None,
        }
    }

    fn client(backend: Arc<FakeBackend>, token: Option<&str>) -> AuthClient {
        let tokens: Arc<dyn TokenStore> = match token {
            Some(t) => Arc::new(MemoryTokenStore::with_token(t)),
            None => Arc::new(MemoryTokenStore::default()),
        };
        AuthClient::new(backend, tokens)
    }

    fn creds() -> Credentials {
        Credentials::new("mikan", "secret1")
    }

    #[tokio::test]
    async fn test_login_stores_token_and_profile() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_login(LoginResponse {
            token: Some("tok-1".into()),
            user: Some(profile("mikan", true)),
            message: None,
        });
        let auth = client(Arc::clone(&backend), None);

        let user = auth.login(&creds()).await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("mikan".to_string()));
        assert_eq!(auth.token().as_deref(), Some("tok-1"));
        assert!(auth.session().is_authenticated());

        // Cached profile: no network call
        assert!(auth.get_profile().await.is_some());
        assert_eq!(backend.profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_without_token_fails_and_logs_out() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_login(LoginResponse {
            token: None,
            user: Some(profile("mikan", true)),
            message: Some("ok".into()),
        });
        let auth = client(backend, Some("stale"));

        let err = auth.login(&creds()).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
        assert!(!auth.session().is_authenticated());
        assert!(auth.token().is_none());
    }

    #[tokio::test]
    async fn test_login_rejected_keeps_server_message() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(backend, None);
        let err = auth.login(&creds()).await.unwrap_err();
        assert_eq!(err.user_message("登录失败"), "用户名或密码错误");
        assert!(!auth.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_login_without_user_marks_pending_profile() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_login(LoginResponse {
            token: Some("tok".into()),
            user: None,
            message: None,
        });
        let auth = client(Arc::clone(&backend), None);
        assert!(auth.login(&creds()).await.unwrap().is_none());
        assert!(auth.session().is_authenticated());

        // Profile gets fetched on demand
        assert!(auth.get_profile().await.is_some());
        assert_eq!(backend.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_profile_without_token_clears_session() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(Arc::clone(&backend), None);
        auth.session().mark_pending_profile();

        assert_eq!(auth.fetch_profile().await, Err(ProfileError::NoToken));
        assert!(!auth.session().is_authenticated());
        assert_eq!(backend.profile_calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_get_profile_issues_one_request() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        let auth = Arc::new(client(Arc::clone(&backend), Some("tok")));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move { auth.get_profile().await }));
        }
        while backend.profile_calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(auth.is_profile_fetch_in_flight());
        gate.notify_one();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(backend.profile_calls(), 1);
        assert!(results.iter().all(|r| r == &results[0]));
        assert!(results[0].is_some());
        assert!(!auth.is_profile_fetch_in_flight());
        assert!(auth.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_get_profile_401_ends_session_once() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_profile(ProfileReply::Unauthorized);
        let auth = client(Arc::clone(&backend), Some("tok"));

        assert_eq!(auth.fetch_profile().await, Err(ProfileError::Expired));
        assert!(auth.token().is_none());
        assert!(!auth.session().is_authenticated());

        // Next call short-circuits on the missing token
        assert_eq!(auth.fetch_profile().await, Err(ProfileError::NoToken));
        assert_eq!(backend.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_401_ends_session_once() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        backend.reply_profile(ProfileReply::Unauthorized);
        let auth = Arc::new(client(Arc::clone(&backend), Some("tok")));
        let epoch = auth.session().epoch();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move { auth.fetch_profile().await }));
        }
        while backend.profile_calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err(ProfileError::Expired));
        }
        assert_eq!(backend.profile_calls(), 1);
        assert_eq!(auth.session().epoch(), epoch + 1);
        assert!(auth.token().is_none());
    }

    #[tokio::test]
    async fn test_overlapping_token_checks_log_out_once() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        backend.reply_profile(ProfileReply::Unauthorized);
        let auth = Arc::new(client(Arc::clone(&backend), Some("tok")));
        let epoch = auth.session().epoch();

        let first = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.validate_token().await })
        };
        let second = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.validate_token().await })
        };
        // Token checks are not coalesced: both reach the server
        while backend.profile_calls() < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        gate.notify_one();

        assert_eq!(first.await.unwrap(), TokenStatus::Expired);
        assert_eq!(second.await.unwrap(), TokenStatus::Expired);
        assert_eq!(auth.session().epoch(), epoch + 1);
        assert!(auth.token().is_none());
        assert_eq!(auth.session_state(), SessionState::default());
    }

    #[tokio::test]
    async fn test_get_profile_server_error_keeps_flag_drops_profile() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_profile(ProfileReply::ServerError);
        let auth = client(Arc::clone(&backend), Some("tok"));

        assert!(auth.get_profile().await.is_none());
        assert!(auth.session().is_authenticated());
        assert!(auth.session().user().is_none());
        assert_eq!(auth.token().as_deref(), Some("tok"));

        // Not in flight any more, so a retry goes to the network again
        backend.reply_profile(ProfileReply::Ok(profile("mikan", true)));
        assert!(auth.get_profile().await.is_some());
        assert_eq!(backend.profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_logout_mid_flight_discards_late_profile() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend::gated(Arc::clone(&gate)));
        let auth = Arc::new(client(Arc::clone(&backend), Some("tok")));

        let pending = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.get_profile().await })
        };
        while backend.profile_calls() == 0 {
            tokio::task::yield_now().await;
        }
        auth.logout();
        assert!(!auth.is_profile_fetch_in_flight());
        gate.notify_one();

        // The caller still gets its answer, but the session stays logged out
        assert!(pending.await.unwrap().is_some());
        assert!(!auth.session().is_authenticated());
        assert!(auth.session().user().is_none());
    }

    #[tokio::test]
    async fn test_check_token_outcomes() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(Arc::clone(&backend), Some("tok"));

        assert!(auth.check_token().await);
        assert_eq!(auth.session().user().map(|u| u.username), Some("mikan".into()));

        backend.reply_profile(ProfileReply::ServerError);
        assert_eq!(auth.validate_token().await, TokenStatus::Unavailable);
        assert!(auth.session().is_authenticated());
        assert_eq!(auth.token().as_deref(), Some("tok"));

        backend.reply_profile(ProfileReply::Unauthorized);
        assert!(!auth.check_token().await);
        assert!(auth.token().is_none());
        assert_eq!(auth.session_state(), SessionState::default());

        assert_eq!(auth.validate_token().await, TokenStatus::Missing);
        assert_eq!(backend.profile_calls(), 3);
    }

    #[tokio::test]
    async fn test_update_profile_requires_token_and_leaves_cache() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(Arc::clone(&backend), None);
        let update = ProfileUpdate {
            email: Some("new@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            auth.update_profile(&update).await,
            Err(ApiError::NotAuthenticated)
        ));

        let auth = client(backend, Some("tok"));
        auth.session().set_authenticated(Some(profile("mikan", true)));
        let updated = auth.update_profile(&update).await.unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(
            auth.session().user().map(|u| u.email),
            Some("mikan@example.com".into())
        );
    }

    #[tokio::test]
    async fn test_update_profile_401_keeps_session() {
        let backend = Arc::new(FakeBackend::new());
        backend.reply_profile(ProfileReply::Unauthorized);
        let auth = client(backend, Some("tok"));
        auth.session().set_authenticated(Some(profile("mikan", true)));
        let update = ProfileUpdate {
            email: Some("new@example.com".into()),
            ..Default::default()
        };

        let err = auth.update_profile(&update).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(auth.token().as_deref(), Some("tok"));
        assert!(auth.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_does_not_touch_session() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(backend, None);
        let form = RegistrationForm {
            username: "newbie".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            email: "newbie@example.com".into(),
            avatar: None,
        };
        let user = auth.register(&form).await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("newbie".into()));
        assert!(!auth.session().is_authenticated());
        assert!(auth.token().is_none());

        let bad = RegistrationForm {
            confirm_password: "other".into(),
            ..form
        };
        assert!(matches!(
            auth.register(&bad).await,
            Err(ApiError::Validation { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(backend, Some("tok"));
        auth.session().set_authenticated(Some(profile("mikan", true)));

        auth.logout();
        let once = (auth.token(), auth.session_state(), auth.is_profile_fetch_in_flight());
        auth.logout();
        let twice = (auth.token(), auth.session_state(), auth.is_profile_fetch_in_flight());
        assert_eq!(once, twice);
        assert_eq!(once, (None, SessionState::default(), false));
    }

    #[tokio::test]
    async fn test_handle_token_expiration_redirects() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(backend, Some("tok"));

        let target = auth
            .handle_token_expiration(&Location::parse("/user/profile"))
            .unwrap();
        assert_eq!(target.path, "/login");
        assert_eq!(target.query_value("redirect"), Some("/user/profile"));
        assert!(auth.token().is_none());

        assert!(auth.handle_token_expiration(&Location::parse("/login")).is_none());
    }

    #[tokio::test]
    async fn test_observe_unauthorized_skips_session_probes() {
        let backend = Arc::new(FakeBackend::new());
        let auth = client(backend, Some("tok"));
        auth.observe_unauthorized("/api/v1/beta/status");
        assert!(auth.has_token());
        auth.observe_unauthorized("/api/v1/bangumi/3");
        assert!(!auth.has_token());
    }
}

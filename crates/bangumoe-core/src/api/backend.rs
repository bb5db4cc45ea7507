//! The seam between session logic and the remote API.

use async_trait::async_trait;
use serde::Deserialize;

use super::ApiResult;
use crate::models::{BetaStatus, Credentials, ProfileUpdate, RegistrationForm, UserProfile};

/// Body of a successful `POST /api/v1/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a successful `POST /api/v1/register`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `{data: Profile}` wrapper used by the user-info endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub data: Option<UserProfile>,
}

/// Remote account and feature-flag operations. Implemented over HTTP by
/// [`HttpBackend`](super::HttpBackend) and by in-memory fakes in tests.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;

    async fn register(&self, form: &RegistrationForm) -> ApiResult<RegisterResponse>;

    /// `GET /api/v1/user/info`; `Unauthorized` on 401.
    async fn fetch_profile(&self, token: &str) -> ApiResult<UserProfile>;

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<UserProfile>;

    async fn beta_status(&self, token: Option<&str>) -> ApiResult<BetaStatus>;
}

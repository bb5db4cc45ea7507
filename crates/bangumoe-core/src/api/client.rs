//! HTTP client for the Bangumoe REST API.
//!
//! `HttpBackend` implements [`AuthBackend`] over reqwest and also exposes the
//! bearer-authenticated JSON GET used by the catalogue client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::backend::{AuthBackend, LoginResponse, ProfileEnvelope, RegisterResponse};
use super::{ApiError, ApiResult};
use crate::config::{normalize_base_url, Config};
use crate::models::{BetaStatus, Credentials, ProfileUpdate, RegistrationForm, Upload, UserProfile};

// ============================================================================
// Constants
// ============================================================================

pub const LOGIN_PATH: &str = "/api/v1/login";
pub const REGISTER_PATH: &str = "/api/v1/register";
pub const USER_INFO_PATH: &str = "/api/v1/user/info";
pub const BETA_STATUS_PATH: &str = "/api/v1/beta/status";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Endpoints whose 401 answers are handled by the session logic itself
/// rather than by the generic "token expired" path.
pub fn is_session_probe(path: &str) -> bool {
    path.starts_with(USER_INFO_PATH) || path.starts_with(BETA_STATUS_PATH)
}

/// API client for the Bangumoe server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> ApiResult<Self> {
        Self::with_base_url(&config.api_base_url, config.request_timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Like `check_response`, but a 401 keeps the server's message: on the
    /// login and register forms it means "wrong credentials", not "expired".
    async fn check_form_response(response: Response) -> ApiResult<Response> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(reqwest::StatusCode::BAD_REQUEST, &body)
                .with_status(401));
        }
        Self::check_response(response).await
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, path: &str) -> ApiResult<T> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// GET a JSON document, retrying 429s with exponential backoff.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .request(Method::GET, path, token)
                .query(query)
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(path = path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            return Self::parse_json(response, path).await;
        }
    }

    fn upload_part(upload: &Upload) -> ApiResult<Part> {
        Ok(Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)?)
    }

    fn registration_form(form: &RegistrationForm) -> ApiResult<Form> {
        let mut multipart = Form::new()
            .text("username", form.username.clone())
            .text("password", form.password.clone())
            .text("confirmPassword", form.confirm_password.clone())
            .text("email", form.email.clone());
        if let Some(ref avatar) = form.avatar {
            multipart = multipart.part("avatar", Self::upload_part(avatar)?);
        }
        Ok(multipart)
    }

    fn update_form(update: &ProfileUpdate) -> ApiResult<Form> {
        let mut multipart = Form::new();
        if let Some(ref email) = update.email {
            multipart = multipart.text("email", email.clone());
        }
        if let Some(ref old) = update.old_password {
            multipart = multipart.text("old_password", old.clone());
        }
        if let Some(ref new) = update.new_password {
            multipart = multipart.text("new_password", new.clone());
        }
        if let Some(ref avatar) = update.avatar {
            multipart = multipart.part("avatar", Self::upload_part(avatar)?);
        }
        Ok(multipart)
    }

    fn unwrap_profile(envelope: ProfileEnvelope) -> ApiResult<UserProfile> {
        envelope
            .data
            .ok_or_else(|| ApiError::InvalidResponse("profile response has no data".to_string()))
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        debug!(username = %credentials.username, "Sending login request");
        let response = self
            .request(Method::POST, LOGIN_PATH, None)
            .json(credentials)
            .send()
            .await?;
        let response = Self::check_form_response(response).await?;
        Self::parse_json(response, LOGIN_PATH).await
    }

    async fn register(&self, form: &RegistrationForm) -> ApiResult<RegisterResponse> {
        debug!(username = %form.username, "Sending registration request");
        let response = self
            .request(Method::POST, REGISTER_PATH, None)
            .multipart(Self::registration_form(form)?)
            .send()
            .await?;
        let response = Self::check_form_response(response).await?;
        Self::parse_json(response, REGISTER_PATH).await
    }

    async fn fetch_profile(&self, token: &str) -> ApiResult<UserProfile> {
        let response = self
            .request(Method::GET, USER_INFO_PATH, Some(token))
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::unwrap_profile(Self::parse_json(response, USER_INFO_PATH).await?)
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        let response = self
            .request(Method::PUT, USER_INFO_PATH, Some(token))
            .multipart(Self::update_form(update)?)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        Self::unwrap_profile(Self::parse_json(response, USER_INFO_PATH).await?)
    }

    async fn beta_status(&self, token: Option<&str>) -> ApiResult<BetaStatus> {
        self.get_json(BETA_STATUS_PATH, token, &[]).await
    }
}

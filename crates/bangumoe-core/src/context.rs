//! The explicitly constructed session context.
//!
//! One `SessionContext` per process wires a single token store and session
//! cache into the auth client, beta gate, navigation guard and catalogue
//! client, so every component sees the same session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::api::{AuthBackend, CatalogueClient, HttpBackend};
use crate::auth::{open_token_store, AuthClient, TokenStore};
use crate::beta::BetaGate;
use crate::config::Config;
use crate::guard::{Decision, Location, NavigationGuard};

pub struct SessionContext {
    auth: Arc<AuthClient>,
    beta: Arc<BetaGate>,
    guard: NavigationGuard,
    catalogue: CatalogueClient,
}

impl SessionContext {
    /// Build the context from configuration: reqwest backend plus the
    /// configured token store.
    pub fn open(config: &Config) -> Result<Self> {
        let tokens: Arc<dyn TokenStore> = Arc::from(open_token_store(config)?);
        let http = HttpBackend::new(config).context("Failed to build HTTP client")?;
        debug!(base_url = http.base_url(), "Session context opened");
        let backend: Arc<dyn AuthBackend> = Arc::new(http.clone());
        Ok(Self::from_parts(http, backend, tokens))
    }

    /// Assemble from explicit parts; `backend` serves the session logic and
    /// `http` the catalogue.
    pub fn from_parts(
        http: HttpBackend,
        backend: Arc<dyn AuthBackend>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let auth = Arc::new(AuthClient::new(Arc::clone(&backend), tokens));
        let beta = Arc::new(BetaGate::new(backend, Arc::clone(&auth)));
        let guard = NavigationGuard::new(Arc::clone(&auth), Arc::clone(&beta));
        let catalogue = CatalogueClient::new(http, Arc::clone(&auth));
        Self {
            auth,
            beta,
            guard,
            catalogue,
        }
    }

    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    pub fn beta(&self) -> &Arc<BetaGate> {
        &self.beta
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn catalogue(&self) -> &CatalogueClient {
        &self.catalogue
    }

    /// Run the guard for a transition to `full_path`.
    pub async fn navigate(&self, full_path: &str) -> Decision {
        self.guard.before_each(&Location::parse(full_path)).await
    }
}

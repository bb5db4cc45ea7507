//! Read-only catalogue endpoints: listings, years, detail, rankings, search.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiError, ApiResult, HttpBackend};
use crate::auth::AuthClient;
use crate::models::{Bangumi, Envelope};

/// Page size used by the catalogue grid
pub const CATALOGUE_PAGE_SIZE: u32 = 24;

/// Page size used by the rankings list
pub const RANKINGS_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn catalogue(page: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: CATALOGUE_PAGE_SIZE,
        }
    }

    pub fn rankings(page: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: RANKINGS_PAGE_SIZE,
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ]
    }
}

/// One page of results plus the server's total count, when it sends one.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
}

pub struct CatalogueClient {
    http: HttpBackend,
    auth: Arc<AuthClient>,
}

impl CatalogueClient {
    pub fn new(http: HttpBackend, auth: Arc<AuthClient>) -> Self {
        Self { http, auth }
    }

    /// GET an enveloped document with the bearer token attached. A 401 here
    /// means the token is dead, so the session is ended before returning.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<(T, Option<u64>)> {
        let token = self.auth.token();
        debug!(path = path, authorized = token.is_some(), "Catalogue request");
        match self.http.get_json::<Envelope<T>>(path, token.as_deref(), query).await {
            Ok(envelope) => unwrap_envelope(envelope, path),
            Err(ApiError::Unauthorized) => {
                self.auth.observe_unauthorized(path);
                Err(ApiError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    async fn listing(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Listing<Bangumi>> {
        let (items, total) = self.get::<Vec<Bangumi>>(path, query).await?;
        Ok(Listing { items, total })
    }

    pub async fn list(&self, page: Page) -> ApiResult<Listing<Bangumi>> {
        self.listing("/api/v1/bangumi", &page.query()).await
    }

    pub async fn list_by_year(&self, year: &str, page: Page) -> ApiResult<Listing<Bangumi>> {
        self.listing(&format!("/api/v1/bangumi/year/{}", year), &page.query())
            .await
    }

    pub async fn years(&self) -> ApiResult<Vec<String>> {
        let (years, _) = self.get::<Vec<String>>("/api/v1/bangumi/years", &[]).await?;
        Ok(years)
    }

    pub async fn detail(&self, id: i64) -> ApiResult<Bangumi> {
        let path = format!("/api/v1/bangumi/{}", id);
        let (bangumi, _) = self.get::<Bangumi>(&path, &[]).await?;
        Ok(bangumi)
    }

    /// Per-bangumi statistics. The server does not fix their shape, so the
    /// raw JSON document is returned.
    pub async fn stats(&self, id: i64) -> ApiResult<serde_json::Value> {
        let (stats, _) = self
            .get::<serde_json::Value>(&stats_path(id), &[])
            .await?;
        Ok(stats)
    }

    pub async fn rankings(&self, page: Page) -> ApiResult<Listing<Bangumi>> {
        self.listing("/api/v1/bangumi/stats/rankings", &page.query())
            .await
    }

    pub async fn search(&self, title: &str, page: Page) -> ApiResult<Listing<Bangumi>> {
        let mut query = vec![("title", title.to_string())];
        query.extend(page.query());
        self.listing("/api/v1/bangumi/search", &query).await
    }
}

fn stats_path(id: i64) -> String {
    format!("/api/v1/bangumi/{}/stats", id)
}

fn unwrap_envelope<T>(envelope: Envelope<T>, path: &str) -> ApiResult<(T, Option<u64>)> {
    if !envelope.is_ok() {
        return Err(ApiError::Validation {
            status: u16::try_from(envelope.code).ok(),
            message: envelope.message,
        });
    }
    let total = envelope.total;
    envelope
        .data
        .map(|data| (data, total))
        .ok_or_else(|| ApiError::InvalidResponse(format!("{}: response has no data", path)))
}

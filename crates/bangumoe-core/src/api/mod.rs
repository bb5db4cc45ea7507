//! REST API client module for the Bangumoe server.
//!
//! This module provides the `AuthBackend` seam used by the session logic,
//! its reqwest implementation `HttpBackend`, and the read-only
//! `CatalogueClient` for browsing bangumi.
//!
//! Authenticated requests carry a JWT bearer token obtained from
//! `POST /api/v1/login`.

pub mod backend;
pub mod catalogue;
pub mod client;
pub mod error;

pub use backend::{AuthBackend, LoginResponse, RegisterResponse};
pub use catalogue::{CatalogueClient, Listing, Page};
pub use client::{is_session_probe, HttpBackend};
pub use error::{ApiError, ApiResult};

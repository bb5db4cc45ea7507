//! Core library for the Bangumoe anime catalogue client.
//!
//! This crate provides:
//! - `api`: REST client, error taxonomy and catalogue endpoints
//! - `auth`: token store, session cache and the authenticating client
//! - `beta`: the beta-mode access gate
//! - `guard`: routes and the navigation guard
//! - `context`: the `SessionContext` tying them together
//! - `models`: data types exchanged with the server
//! - `config`: persisted client configuration

pub mod api;
pub mod auth;
pub mod beta;
pub mod config;
pub mod context;
pub mod guard;
pub mod models;

pub use api::{ApiError, ApiResult};
pub use auth::{AuthClient, SessionCache, SessionState, TokenStore};
pub use beta::{BetaGate, BetaState};
pub use config::Config;
pub use context::SessionContext;
pub use guard::{Decision, Location, NavigationGuard, Route};

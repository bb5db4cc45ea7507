//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `TokenStore`: the persisted bearer token (keychain, file or memory)
//! - `SessionCache`: authenticated flag plus the last fetched profile
//! - `SingleFlight`: one-slot request coalescer
//! - `AuthClient`: login, registration, profile and token validation
//!
//! The server is the only authority on token validity; a stored token is
//! just a claim until a round-trip confirms it.

pub mod client;
pub mod coalesce;
pub mod session;
pub mod token_store;

pub use client::{AuthClient, ProfileError, TokenStatus};
pub use coalesce::SingleFlight;
pub use session::{SessionCache, SessionState};
pub use token_store::{
    open_token_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore,
};

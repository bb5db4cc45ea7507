//! Data models exchanged with the Bangumoe API.
//!
//! - `UserProfile`, `Credentials`, `RegistrationForm`, `ProfileUpdate`: account data
//! - `BetaStatus`: the remote beta-mode flag
//! - `Bangumi`, `Envelope`: catalogue entries and the standard response wrapper

pub mod bangumi;
pub mod beta;
pub mod user;

pub use bangumi::{Bangumi, Envelope};
pub use beta::BetaStatus;
pub use user::{Credentials, ProfileUpdate, RegistrationForm, Upload, UserProfile};

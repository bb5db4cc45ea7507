//! Beta gating: a server-controlled switch that restricts the site to an
//! allow-list of users while active.

pub mod gate;

pub use gate::{BetaGate, BetaState};

//! Navigation guard: decides, before each page transition, whether to
//! admit it, send the user elsewhere, or cancel it.
//!
//! Decisions come from an ordered list of policy rules (`policy`) over the
//! target route (`route`), the beta state and the token's validity.

pub mod location;
pub mod navigation;
pub mod policy;
pub mod route;

pub use location::Location;
pub use navigation::{Decision, NavigationGuard};
pub use policy::{default_rules, AuthView, PolicyRule, RuleInput, Verdict};
pub use route::{login_redirect, Route, REDIRECT_QUERY, SITE_TITLE};

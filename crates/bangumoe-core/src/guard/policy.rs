//! The guard's rules, in priority order. Each rule is a pure function of
//! its input; the first one to return a verdict decides.

use super::{Location, Route};
use crate::beta::BetaState;

/// What the guard knows about the session when rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthView {
    pub token_present: bool,
    /// `None` when no rule needed a server round-trip for this target
    pub token_valid: Option<bool>,
}

impl AuthView {
    pub fn is_valid(&self) -> bool {
        self.token_valid == Some(true)
    }
}

pub struct RuleInput<'a> {
    pub target: &'a Location,
    pub route: &'a Route,
    pub beta: BetaState,
    pub auth: AuthView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Redirect(Location),
    Deny,
    /// Session must end and the user log in again
    RequireLogin,
}

pub trait PolicyRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Verdict>;
}

/// The no-access page is only for users the beta gate is holding back;
/// anyone else landing there goes home.
pub struct NoAccessPageRule;

impl PolicyRule for NoAccessPageRule {
    fn name(&self) -> &'static str {
        "no-access-page"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Verdict> {
        if *input.route != Route::NoAccess {
            return None;
        }
        if input.beta.blocks_user() {
            Some(Verdict::Admit)
        } else {
            Some(Verdict::Redirect(Route::Home.location()))
        }
    }
}

/// During beta, users off the allow-list only reach the auth and legal pages.
pub struct BetaAllowListRule;

impl PolicyRule for BetaAllowListRule {
    fn name(&self) -> &'static str {
        "beta-allow-list"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Verdict> {
        if input.beta.blocks_user() && !input.route.is_beta_exempt() {
            Some(Verdict::Redirect(Route::NoAccess.location()))
        } else {
            None
        }
    }
}

pub struct RequiresAuthRule;

impl PolicyRule for RequiresAuthRule {
    fn name(&self) -> &'static str {
        "requires-auth"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Verdict> {
        if !input.route.requires_auth() {
            return None;
        }
        if input.auth.is_valid() {
            Some(Verdict::Admit)
        } else {
            Some(Verdict::RequireLogin)
        }
    }
}

/// A logged-in user has no business on the login page.
pub struct LoginWhileAuthenticatedRule;

impl PolicyRule for LoginWhileAuthenticatedRule {
    fn name(&self) -> &'static str {
        "login-while-authenticated"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Verdict> {
        if *input.route == Route::Login && input.auth.is_valid() {
            Some(Verdict::Redirect(Route::Home.location()))
        } else {
            None
        }
    }
}

pub fn default_rules() -> Vec<Box<dyn PolicyRule>> {
    vec![
        Box::new(NoAccessPageRule),
        Box::new(BetaAllowListRule),
        Box::new(RequiresAuthRule),
        Box::new(LoginWhileAuthenticatedRule),
    ]
}

/// Run `rules` in order; `Admit` when none fires.
pub fn evaluate(rules: &[Box<dyn PolicyRule>], input: &RuleInput<'_>) -> (Verdict, &'static str) {
    rules
        .iter()
        .find_map(|rule| rule.evaluate(input).map(|v| (v, rule.name())))
        .unwrap_or((Verdict::Admit, "default"))
}

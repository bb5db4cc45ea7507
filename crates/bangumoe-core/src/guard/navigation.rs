use std::sync::Arc;

use tracing::{debug, info};

use super::policy::{default_rules, evaluate, AuthView, PolicyRule, RuleInput, Verdict};
use super::{Location, Route};
use crate::auth::AuthClient;
use crate::beta::BetaGate;

/// Outcome of one attempted page transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Redirect(Location),
    Deny,
    /// Navigation cancelled and the session ended. The caller should replace
    /// the current location with the given login page, if any.
    Reauthenticate(Option<Location>),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit)
    }

    /// Where the caller should go instead, if anywhere.
    pub fn destination(&self) -> Option<&Location> {
        match self {
            Decision::Redirect(loc) | Decision::Reauthenticate(Some(loc)) => Some(loc),
            _ => None,
        }
    }
}

pub struct NavigationGuard {
    auth: Arc<AuthClient>,
    beta: Arc<BetaGate>,
    rules: Vec<Box<dyn PolicyRule>>,
}

impl NavigationGuard {
    pub fn new(auth: Arc<AuthClient>, beta: Arc<BetaGate>) -> Self {
        Self::with_rules(auth, beta, default_rules())
    }

    pub fn with_rules(
        auth: Arc<AuthClient>,
        beta: Arc<BetaGate>,
        rules: Vec<Box<dyn PolicyRule>>,
    ) -> Self {
        Self { auth, beta, rules }
    }

    /// Evaluate a transition to `target`.
    pub async fn before_each(&self, target: &Location) -> Decision {
        let route = Route::resolve(&target.path);
        debug!(path = %target, route = route.name(), "Navigating");

        let beta = self.beta.check_beta_status().await;
        let auth = self.auth_view(&route, beta.blocks_user()).await;

        let input = RuleInput {
            target,
            route: &route,
            beta,
            auth,
        };
        let (verdict, rule) = evaluate(&self.rules, &input);
        debug!(rule = rule, ?verdict, "Guard verdict");

        match verdict {
            Verdict::Admit => Decision::Admit,
            Verdict::Redirect(to) => {
                info!(from = %target, to = %to, rule = rule, "Redirecting navigation");
                Decision::Redirect(to)
            }
            Verdict::Deny => Decision::Deny,
            Verdict::RequireLogin => {
                info!(path = %target, "Token invalid, cancelling navigation");
                Decision::Reauthenticate(self.auth.handle_token_expiration(target))
            }
        }
    }

    /// Only hit the server when a rule that could fire needs the answer.
    /// A blocked beta user never reaches a protected page, but the login
    /// page is exempt from the beta rule and still wants the check.
    async fn auth_view(&self, route: &Route, beta_blocks: bool) -> AuthView {
        let token_present = self.auth.has_token();
        let needs_check = (route.requires_auth() && !beta_blocks)
            || (*route == Route::Login && token_present);
        let token_valid = if needs_check {
            Some(self.auth.check_token().await)
        } else {
            None
        };
        AuthView {
            token_present,
            token_valid,
        }
    }
}

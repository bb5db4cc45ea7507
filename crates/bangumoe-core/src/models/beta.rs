use serde::{Deserialize, Serialize};

/// Response of `GET /api/v1/beta/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaStatus {
    #[serde(default)]
    pub is_beta_mode: bool,
}

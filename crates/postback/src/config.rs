//! Postback shared-secret and auto-approval settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostbackConfig {
    /// Shared HMAC secret. When absent, signatures are not checked and
    /// every accepted postback is logged as unverified.
    #[serde(default)]
    pub secret: Option<String>,
    /// Credit trusted postbacks immediately instead of queueing them for
    /// manual review
    #[serde(default)]
    pub auto_approve: bool,
}

impl PostbackConfig {
    /// Read `POSTBACK_SECRET` and `AUTO_APPROVE_TRUSTED_POSTBACKS` from the
    /// environment. An empty secret counts as unset.
    pub fn from_env() -> Self {
        let secret = std::env::var("POSTBACK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let auto_approve = std::env::var("AUTO_APPROVE_TRUSTED_POSTBACKS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self {
            secret,
            auto_approve,
        }
    }
}

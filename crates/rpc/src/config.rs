//! Aggregate application configuration
//!
//! Each subsystem owns its config struct; this type bundles them for file
//! loading and the environment overrides the deployment actually uses.

use serde::{Deserialize, Serialize};
use taskpay_fraud::FraudConfig;
use taskpay_ledger::WithdrawalConfig;
use taskpay_postback::PostbackConfig;
use taskpay_ratelimit::RateLimitConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub postback: PostbackConfig,
    #[serde(default)]
    pub withdrawal: WithdrawalConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Defaults overridden by the environment surface
    pub fn from_env() -> Self {
        Self {
            rate_limit: RateLimitConfig::from_env(),
            fraud: FraudConfig::from_env(),
            postback: PostbackConfig::from_env(),
            withdrawal: WithdrawalConfig::from_env(),
        }
    }
}

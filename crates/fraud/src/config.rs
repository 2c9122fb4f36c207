//! Fraud thresholds, overridable from the environment

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Scores at or above this value flag the task for review
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: u8,
    /// Daily approved-earnings cap for accounts younger than two days
    #[serde(default = "default_new_user_daily_cap")]
    pub new_user_daily_cap: Decimal,
}

fn default_flag_threshold() -> u8 {
    60
}

fn default_new_user_daily_cap() -> Decimal {
    Decimal::from(200)
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            flag_threshold: default_flag_threshold(),
            new_user_daily_cap: default_new_user_daily_cap(),
        }
    }
}

impl FraudConfig {
    /// Read overrides from `FRAUD_SCORE_THRESHOLD` and `NEW_USER_DAILY_CAP`.
    /// Unset or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<u8>("FRAUD_SCORE_THRESHOLD") {
            config.flag_threshold = v.min(100);
        }
        if let Some(v) = env_parse::<Decimal>("NEW_USER_DAILY_CAP") {
            if v >= Decimal::ZERO {
                config.new_user_daily_cap = v;
            }
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

//! Pure additive scoring over gathered signals

/// Signals gathered for a single task completion
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudSignals {
    /// Milliseconds between task start and completion
    pub elapsed_ms: i64,
    /// Expected duration for the offer in milliseconds (0 = unknown)
    pub expected_duration_ms: i64,
    /// Device records sharing this IP in the last 24 hours
    pub devices_on_ip_24h: i64,
    /// Records carrying this device hash in the last 7 days
    pub device_seen_7d: i64,
    /// Offer required proof but none was provided
    pub missing_proof: bool,
    /// Account age in whole days
    pub account_age_days: i64,
    /// Lifetime approved task count
    pub approved_tasks: i64,
}

/// Weighted sum of signals, clamped to 0..=100.
///
/// Rushed completions and shared infrastructure add, a long good track
/// record subtracts. The result is advisory only.
pub fn compute_fraud_score(signals: &FraudSignals) -> u8 {
    let mut score: i32 = 0;

    // Finished in under 30% of the expected time
    if signals.expected_duration_ms > 0
        && signals.elapsed_ms * 10 < signals.expected_duration_ms * 3
    {
        score += 40;
    }

    if signals.devices_on_ip_24h > 5 {
        score += 30;
    }

    if signals.device_seen_7d > 10 {
        score += 20;
    }

    if signals.missing_proof {
        score += 10;
    }

    // Established accounts earn back trust
    if signals.account_age_days > 7 && signals.approved_tasks > 50 {
        score -= 15;
    }

    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_completion_scores_zero() {
        let signals = FraudSignals {
            elapsed_ms: 60_000,
            expected_duration_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 0);
    }

    #[test]
    fn test_rushed_completion() {
        let signals = FraudSignals {
            elapsed_ms: 10_000,
            expected_duration_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 40);
    }

    #[test]
    fn test_thirty_percent_boundary() {
        // Exactly 30% of expected is not rushed
        let at_boundary = FraudSignals {
            elapsed_ms: 18_000,
            expected_duration_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&at_boundary), 0);

        let just_under = FraudSignals {
            elapsed_ms: 17_999,
            expected_duration_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&just_under), 40);
    }

    #[test]
    fn test_shared_ip_and_device_reuse() {
        let signals = FraudSignals {
            elapsed_ms: 60_000,
            expected_duration_ms: 60_000,
            devices_on_ip_24h: 6,
            device_seen_7d: 11,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 50);
    }

    #[test]
    fn test_infrastructure_thresholds_exclusive() {
        // Exactly 5 devices on the IP and exactly 10 sightings do not score
        let signals = FraudSignals {
            elapsed_ms: 60_000,
            expected_duration_ms: 60_000,
            devices_on_ip_24h: 5,
            device_seen_7d: 10,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 0);
    }

    #[test]
    fn test_trust_discount() {
        let signals = FraudSignals {
            elapsed_ms: 10_000,
            expected_duration_ms: 60_000,
            account_age_days: 8,
            approved_tasks: 51,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 25);
    }

    #[test]
    fn test_trust_discount_clamped_at_zero() {
        let signals = FraudSignals {
            elapsed_ms: 60_000,
            expected_duration_ms: 60_000,
            account_age_days: 30,
            approved_tasks: 200,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 0);
    }

    #[test]
    fn test_all_signals_clamped_at_hundred() {
        let signals = FraudSignals {
            elapsed_ms: 1,
            expected_duration_ms: 60_000,
            devices_on_ip_24h: 100,
            device_seen_7d: 100,
            missing_proof: true,
            ..Default::default()
        };
        // 40 + 30 + 20 + 10 = 100, already at the ceiling
        assert_eq!(compute_fraud_score(&signals), 100);
    }

    #[test]
    fn test_unknown_expected_duration_skips_timing() {
        let signals = FraudSignals {
            elapsed_ms: 1,
            expected_duration_ms: 0,
            ..Default::default()
        };
        assert_eq!(compute_fraud_score(&signals), 0);
    }
}

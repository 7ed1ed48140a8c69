use serde::Deserialize;

use crate::response::ServerResult;

/// Thresholds and tunables consumed at `DynamicWeightManager` construction.
///
/// Mirrors the spec's "Config surface": a flat record of numeric thresholds,
/// readable from the environment the way the rest of this server's
/// configuration is, with a `Default` impl so embedders and tests can
/// construct a manager directly without touching the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Health-score penalty per consecutive failure.
    pub consecutive_failure_penalty_per_failure: f64,
    /// Cap on the total consecutive-failure penalty.
    pub max_consecutive_failure_penalty: f64,
    /// Maximum penalty applied when the last failure is recent.
    pub recent_failure_penalty: f64,
    /// Window, in seconds, over which the recent-failure penalty decays to 0.
    pub recent_failure_window_secs: i64,
    /// 180-day success rate below which the low-success-rate penalty applies.
    pub low_success_rate_threshold: f64,
    /// Minimum 180-day sample count before the low-success-rate penalty can apply.
    pub min_samples_for_rate_check: u64,
    /// Penalty applied when the low-success-rate condition holds.
    pub success_rate_penalty: f64,
    /// Health score at or below which effective weight is capped at 1.0.
    pub critical_health_threshold: f64,
    /// Health score at or above which effective weight scales linearly.
    pub medium_health_threshold: f64,
    /// Exponent applied to health in the medium zone (`base * h^exponent`).
    pub medium_health_penalty_exponent: i32,
    /// Lower bound of `CalculateHealthScore`'s output.
    pub min_health_score: f64,
    /// Multiplier used to convert a float effective weight to an integer
    /// weight before handing it to the weighted-random primitive.
    pub effective_weight_precision_multiplier: f64,
    /// On a store error, treat the probed resource as available (fail-open)
    /// rather than unavailable (fail-closed). See spec §9 Open Questions.
    pub fail_open_on_store_error: bool,
    /// Per-window weights for the weighted success-rate roll-up, ordered
    /// 7d/14d/30d/90d/180d, most-recent first. See spec §9 Open Questions.
    pub window_weights: [f64; 5],
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_penalty_per_failure: 0.08,
            max_consecutive_failure_penalty: 0.40,
            recent_failure_penalty: 0.12,
            recent_failure_window_secs: 5 * 60,
            low_success_rate_threshold: 0.40,
            min_samples_for_rate_check: 20,
            success_rate_penalty: 0.18,
            critical_health_threshold: 0.50,
            medium_health_threshold: 0.75,
            medium_health_penalty_exponent: 2,
            min_health_score: 0.1,
            effective_weight_precision_multiplier: 10.0,
            fail_open_on_store_error: true,
            window_weights: [5.0, 3.0, 2.0, 1.5, 1.0],
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Self {
        let d = Self::default();

        let f64_env = |key: &str, default: f64| -> f64 {
            std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        Self {
            consecutive_failure_penalty_per_failure: f64_env(
                "CONSECUTIVE_FAILURE_PENALTY_PER_FAILURE",
                d.consecutive_failure_penalty_per_failure,
            ),
            max_consecutive_failure_penalty: f64_env(
                "MAX_CONSECUTIVE_FAILURE_PENALTY",
                d.max_consecutive_failure_penalty,
            ),
            recent_failure_penalty: f64_env("RECENT_FAILURE_PENALTY", d.recent_failure_penalty),
            recent_failure_window_secs: std::env::var("RECENT_FAILURE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.recent_failure_window_secs),
            low_success_rate_threshold: f64_env(
                "LOW_SUCCESS_RATE_THRESHOLD",
                d.low_success_rate_threshold,
            ),
            min_samples_for_rate_check: std::env::var("MIN_SAMPLES_FOR_RATE_CHECK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.min_samples_for_rate_check),
            success_rate_penalty: f64_env("SUCCESS_RATE_PENALTY", d.success_rate_penalty),
            critical_health_threshold: f64_env(
                "CRITICAL_HEALTH_THRESHOLD",
                d.critical_health_threshold,
            ),
            medium_health_threshold: f64_env("MEDIUM_HEALTH_THRESHOLD", d.medium_health_threshold),
            medium_health_penalty_exponent: std::env::var("MEDIUM_HEALTH_PENALTY_EXPONENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.medium_health_penalty_exponent),
            min_health_score: f64_env("MIN_HEALTH_SCORE", d.min_health_score),
            effective_weight_precision_multiplier: f64_env(
                "EFFECTIVE_WEIGHT_PRECISION_MULTIPLIER",
                d.effective_weight_precision_multiplier,
            ),
            fail_open_on_store_error: std::env::var("FAIL_OPEN_ON_STORE_ERROR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.fail_open_on_store_error),
            window_weights: d.window_weights,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub admin_port: u16,
    pub router: RouterConfig,
}

impl AppConfig {
    pub fn from_env() -> ServerResult<Self> {
        let admin_port = std::env::var("ADMIN_PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .unwrap();

        Ok(Self {
            admin_port,
            router: RouterConfig::from_env(),
        })
    }
}

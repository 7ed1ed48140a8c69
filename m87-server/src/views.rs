//! Aggregated views for external inspection and the telemetry API (spec C6).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dwm::DynamicWeightManager;
use crate::metrics::DynamicWeightMetrics;
use crate::rules::{ModelRedirectRuleV2, SubGroupConfig};

/// A single candidate's base/effective/health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DynamicWeightInfo {
    pub name: String,
    pub base_weight: i64,
    pub health_score: f64,
    pub effective_weight: f64,
    pub request_count: u64,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
}

fn snapshot(name: String, base_weight: i64, dwm: &DynamicWeightManager, metrics: &DynamicWeightMetrics) -> DynamicWeightInfo {
    let success_rate = if metrics.request_count > 0 {
        metrics.success_count as f64 / metrics.request_count as f64 * 100.0
    } else {
        100.0
    };

    DynamicWeightInfo {
        name,
        base_weight,
        health_score: dwm.calculate_health_score(Some(metrics)),
        effective_weight: dwm.get_effective_weight(base_weight, Some(metrics)),
        request_count: metrics.request_count,
        success_rate,
        last_failure_at: metrics.last_failure_at,
        last_success_at: metrics.last_success_at,
    }
}

/// Snapshots for every sub-group in an aggregate group.
pub fn sub_group_views(
    dwm: &DynamicWeightManager,
    group_id: u64,
    sub_groups: &[SubGroupConfig],
) -> Vec<DynamicWeightInfo> {
    sub_groups
        .iter()
        .map(|sg| {
            let metrics = dwm.get_sub_group_metrics(group_id, sg.sub_group_id);
            snapshot(sg.name.clone(), sg.weight, dwm, &metrics)
        })
        .collect()
}

/// Snapshots for every target in a v2 redirect rule.
pub fn redirect_target_views(
    dwm: &DynamicWeightManager,
    group_id: u64,
    rule: &ModelRedirectRuleV2,
) -> Vec<DynamicWeightInfo> {
    rule.targets
        .iter()
        .map(|target| {
            let metrics = dwm.get_model_redirect_metrics(group_id, &rule.source_model, &target.model);
            snapshot(target.model.clone(), target.get_weight(), dwm, &metrics)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::rules::RedirectTarget;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn dwm() -> DynamicWeightManager {
        DynamicWeightManager::new(RouterConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn fresh_sub_group_reports_full_health_and_no_timestamps() {
        let manager = dwm();
        let sub_groups = vec![SubGroupConfig {
            sub_group_id: 1,
            name: "primary".into(),
            weight: 100,
            enabled: true,
        }];
        let views = sub_group_views(&manager, 1, &sub_groups);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].health_score, 1.0);
        assert_eq!(views[0].request_count, 0);
        assert_eq!(views[0].success_rate, 100.0);
        assert!(views[0].last_failure_at.is_none());
    }

    #[tokio::test]
    async fn success_rate_reflects_lifetime_counters() {
        let manager = dwm();
        manager.record_sub_group_success(1, 1).await;
        manager.record_sub_group_success(1, 1).await;
        manager.record_sub_group_failure(1, 1).await;

        let sub_groups = vec![SubGroupConfig {
            sub_group_id: 1,
            name: "primary".into(),
            weight: 100,
            enabled: true,
        }];
        let views = sub_group_views(&manager, 1, &sub_groups);
        assert_eq!(views[0].request_count, 3);
        assert!((views[0].success_rate - 66.66).abs() < 0.1);
        assert!(views[0].last_success_at.is_some());
        assert!(views[0].last_failure_at.is_some());
    }

    #[test]
    fn redirect_views_cover_every_target() {
        let manager = dwm();
        let rule = ModelRedirectRuleV2 {
            source_model: "gpt-4".into(),
            targets: vec![
                RedirectTarget {
                    model: "a".into(),
                    weight: 70,
                    enabled: Some(true),
                },
                RedirectTarget {
                    model: "b".into(),
                    weight: 30,
                    enabled: Some(true),
                },
            ],
        };
        let views = redirect_target_views(&manager, 1, &rule);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].name, "a");
        assert_eq!(views[1].name, "b");
    }
}

//! Sub-Group Selector (spec C4): the per-aggregate weighted-random picker.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dwm::DynamicWeightManager;
use crate::rules::SubGroupConfig;
use crate::store::{active_keys_key, Store};
use crate::weighted::weighted_random_index;

/// A selector bound to one aggregate group. `mu` serializes selection
/// within this aggregate; selection across different aggregates proceeds
/// in parallel since each candidate list is tiny relative to the cost of
/// the downstream I/O a selection precedes.
pub struct SubGroupSelector {
    group_id: u64,
    group_name: String,
    sub_groups: Vec<SubGroupConfig>,
    dwm: Option<Arc<DynamicWeightManager>>,
    store: Arc<dyn Store>,
    fail_open_on_store_error: bool,
    mu: Mutex<()>,
}

impl SubGroupSelector {
    pub fn new(
        group_id: u64,
        group_name: String,
        sub_groups: Vec<SubGroupConfig>,
        dwm: Option<Arc<DynamicWeightManager>>,
        store: Arc<dyn Store>,
        fail_open_on_store_error: bool,
    ) -> Self {
        Self {
            group_id,
            group_name,
            sub_groups,
            dwm,
            store,
            fail_open_on_store_error,
            mu: Mutex::new(()),
        }
    }

    pub fn group_id(&self) -> u64 {
        self.group_id
    }

    /// No exclusion. Returns `""` when no sub-group is eligible.
    pub async fn select_next(&self) -> String {
        self.select_next_with_exclusion(&HashSet::new()).await.0
    }

    /// Returns `(name, id)`, or `("", 0)` when no eligible sub-group
    /// remains (P9: an excluded id is never returned).
    pub async fn select_next_with_exclusion(&self, exclude_ids: &HashSet<u64>) -> (String, u64) {
        let _guard = self.mu.lock().await;

        if self.sub_groups.is_empty() {
            return (String::new(), 0);
        }

        if self.sub_groups.len() == 1 {
            let sg = &self.sub_groups[0];
            if sg.enabled
                && !exclude_ids.contains(&sg.sub_group_id)
                && self.has_active_keys(sg.sub_group_id).await
            {
                return (sg.name.clone(), sg.sub_group_id);
            }
            return (String::new(), 0);
        }

        let weights: Vec<i64> = self
            .sub_groups
            .iter()
            .map(|sg| {
                if !sg.enabled || exclude_ids.contains(&sg.sub_group_id) {
                    0
                } else if let Some(dwm) = &self.dwm {
                    let metrics = dwm.get_sub_group_metrics(self.group_id, sg.sub_group_id);
                    dwm.effective_integer_weight(sg.weight, Some(&metrics))
                } else {
                    sg.weight
                }
            })
            .collect();

        let mut attempted = HashSet::new();
        for _ in 0..self.sub_groups.len() {
            let idx = weighted_random_index(&weights);
            if idx < 0 {
                break;
            }
            let idx = idx as usize;
            if attempted.contains(&idx) {
                continue;
            }
            attempted.insert(idx);

            let sg = &self.sub_groups[idx];
            if !sg.enabled || exclude_ids.contains(&sg.sub_group_id) {
                continue;
            }
            if self.has_active_keys(sg.sub_group_id).await {
                return (sg.name.clone(), sg.sub_group_id);
            }
        }

        warn!(group = %self.group_name, "sub-group selection exhausted with no eligible candidate");
        (String::new(), 0)
    }

    async fn has_active_keys(&self, sub_group_id: u64) -> bool {
        match self.store.llen(&active_keys_key(sub_group_id)).await {
            Ok(n) => n > 0,
            Err(err) => {
                debug!(sub_group_id, error = %err, "active-key probe failed");
                self.fail_open_on_store_error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn sg(id: u64, name: &str, weight: i64, enabled: bool) -> SubGroupConfig {
        SubGroupConfig {
            sub_group_id: id,
            name: name.to_string(),
            weight,
            enabled,
        }
    }

    async fn selector_with_active_keys(sub_groups: Vec<SubGroupConfig>) -> SubGroupSelector {
        let store = Arc::new(MemoryStore::new());
        for sg in &sub_groups {
            store
                .lpush(&active_keys_key(sg.sub_group_id), &["key"])
                .await
                .unwrap();
        }
        SubGroupSelector::new(1, "agg".into(), sub_groups, None, store, true)
    }

    #[tokio::test]
    async fn empty_selector_returns_empty() {
        let selector = selector_with_active_keys(vec![]).await;
        assert_eq!(selector.select_next().await, "");
    }

    #[tokio::test]
    async fn single_disabled_sub_group_returns_empty() {
        let selector = selector_with_active_keys(vec![sg(1, "a", 100, false)]).await;
        assert_eq!(selector.select_next().await, "");
    }

    #[tokio::test]
    async fn single_enabled_sub_group_with_active_keys_is_returned() {
        let selector = selector_with_active_keys(vec![sg(1, "a", 100, true)]).await;
        assert_eq!(selector.select_next().await, "a");
    }

    #[tokio::test]
    async fn single_sub_group_without_active_keys_and_fail_closed_returns_empty() {
        let store = Arc::new(MemoryStore::new());
        let selector = SubGroupSelector::new(1, "agg".into(), vec![sg(1, "a", 100, true)], None, store, false);
        assert_eq!(selector.select_next().await, "");
    }

    // Scenario 4: retry exclusion never returns an excluded id.
    #[tokio::test]
    async fn exclusion_never_returns_excluded_sub_group() {
        let selector = selector_with_active_keys(vec![
            sg(1, "one", 100, true),
            sg(2, "two", 100, true),
            sg(3, "three", 100, true),
        ])
        .await;

        let mut excluded = HashSet::new();
        excluded.insert(1u64);

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let (name, id) = selector.select_next_with_exclusion(&excluded).await;
            assert_ne!(id, 1, "excluded sub-group must never be returned");
            if !name.is_empty() {
                seen.insert(id);
            }
        }
        assert!(seen.contains(&2));
        assert!(seen.contains(&3));
    }

    // P9: excluding everything yields the empty sentinel.
    #[tokio::test]
    async fn excluding_all_candidates_returns_empty_sentinel() {
        let selector =
            selector_with_active_keys(vec![sg(1, "one", 100, true), sg(2, "two", 100, true)]).await;

        let mut excluded = HashSet::new();
        excluded.insert(1u64);
        excluded.insert(2u64);

        let (name, id) = selector.select_next_with_exclusion(&excluded).await;
        assert_eq!(name, "");
        assert_eq!(id, 0);
    }

    #[tokio::test]
    async fn sub_group_without_active_keys_is_skipped_in_favor_of_another() {
        let store = Arc::new(MemoryStore::new());
        store.lpush(&active_keys_key(2), &["key"]).await.unwrap();
        // sub-group 1 has no active keys; selector must still reach sub-group 2.
        let selector = SubGroupSelector::new(
            1,
            "agg".into(),
            vec![sg(1, "one", 100, true), sg(2, "two", 100, true)],
            None,
            store,
            false,
        );

        let mut saw_two = false;
        for _ in 0..50 {
            let (name, _) = selector.select_next().await;
            if name == "two" {
                saw_two = true;
            }
            assert_ne!(name, "one");
        }
        assert!(saw_two);
    }
}

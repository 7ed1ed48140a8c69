//! Model-Redirect Selector (spec C5): the per-rule weighted-random picker.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dwm::DynamicWeightManager;
use crate::response::{ServerError, ServerResult};
use crate::rules::ModelRedirectRuleV2;
use crate::weighted::weighted_random_index;

pub struct ModelRedirectSelector {
    dwm: Option<Arc<DynamicWeightManager>>,
}

impl ModelRedirectSelector {
    pub fn new(dwm: Option<Arc<DynamicWeightManager>>) -> Self {
        Self { dwm }
    }

    /// Returns `(target_model, index_within_rule.targets)`.
    ///
    /// P10: a rule with exactly one enabled target takes the fast path and
    /// performs zero DWM lookups.
    pub fn select_target_with_context(
        &self,
        rule: &ModelRedirectRuleV2,
        group_id: u64,
    ) -> ServerResult<(String, i64)> {
        if rule.targets.is_empty() {
            return Err(ServerError::bad_request("no targets configured"));
        }

        let enabled_indices: Vec<usize> = rule
            .targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_enabled() && t.get_weight() > 0)
            .map(|(i, _)| i)
            .collect();

        if enabled_indices.is_empty() {
            return Err(ServerError::bad_request("no enabled targets available"));
        }

        if enabled_indices.len() == 1 {
            let idx = enabled_indices[0];
            return Ok((rule.targets[idx].model.clone(), idx as i64));
        }

        let weights: Vec<i64> = enabled_indices
            .iter()
            .map(|&i| {
                let target = &rule.targets[i];
                match &self.dwm {
                    Some(dwm) => {
                        let metrics =
                            dwm.get_model_redirect_metrics(group_id, &rule.source_model, &target.model);
                        dwm.effective_integer_weight(target.get_weight(), Some(&metrics))
                    }
                    None => target.get_weight(),
                }
            })
            .collect();

        let picked = weighted_random_index(&weights);
        if picked < 0 || picked as usize >= enabled_indices.len() {
            return Err(ServerError::internal_error("weighted selection failed"));
        }

        let idx = enabled_indices[picked as usize];
        Ok((rule.targets[idx].model.clone(), idx as i64))
    }
}

/// Outcome of resolving a source model against the v2/v1 rule maps.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectResolution {
    V2 {
        target_model: String,
        target_count: usize,
        selected_index: i64,
    },
    V1 {
        target_model: String,
    },
    NotFound,
}

/// Convenience resolver: consult the v2-rule map first, then fall back to
/// the v1 plain `source -> target` map. Not-found is not an error.
pub fn resolve_redirect(
    selector: &ModelRedirectSelector,
    v2_rules: &HashMap<String, ModelRedirectRuleV2>,
    v1_rules: &HashMap<String, String>,
    group_id: u64,
    source_model: &str,
) -> ServerResult<RedirectResolution> {
    if let Some(rule) = v2_rules.get(source_model) {
        let (target_model, selected_index) = selector.select_target_with_context(rule, group_id)?;
        return Ok(RedirectResolution::V2 {
            target_model,
            target_count: rule.targets.len(),
            selected_index,
        });
    }

    if let Some(target_model) = v1_rules.get(source_model) {
        return Ok(RedirectResolution::V1 {
            target_model: target_model.clone(),
        });
    }

    Ok(RedirectResolution::NotFound)
}

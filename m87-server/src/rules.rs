//! Rule surface shapes consumed by the selectors (spec §3, §6).

use serde::{Deserialize, Serialize};

/// A sub-group as configured on an aggregate group (spec §3, Selector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGroupConfig {
    pub sub_group_id: u64,
    pub name: String,
    pub weight: i64,
    pub enabled: bool,
}

/// An aggregate group: a name, id, and its member sub-groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateGroupConfig {
    pub group_id: u64,
    pub group_name: String,
    pub sub_groups: Vec<SubGroupConfig>,
}

/// One candidate target within a v2 model-redirect rule.
///
/// `GetWeight()` treats a zero/unset weight as 100; `IsEnabled()` treats an
/// absent `enabled` field as `true` — both per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub model: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl RedirectTarget {
    pub fn get_weight(&self) -> i64 {
        if self.weight == 0 {
            100
        } else {
            self.weight
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// A v2 redirect rule: a source model name mapped to weighted candidate targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRedirectRuleV2 {
    pub source_model: String,
    pub targets: Vec<RedirectTarget>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_defaults_to_100() {
        let target = RedirectTarget {
            model: "a".into(),
            weight: 0,
            enabled: None,
        };
        assert_eq!(target.get_weight(), 100);
    }

    #[test]
    fn nonzero_weight_is_kept() {
        let target = RedirectTarget {
            model: "a".into(),
            weight: 30,
            enabled: Some(true),
        };
        assert_eq!(target.get_weight(), 30);
    }

    #[test]
    fn absent_enabled_defaults_true() {
        let target = RedirectTarget {
            model: "a".into(),
            weight: 10,
            enabled: None,
        };
        assert!(target.is_enabled());
    }

    #[test]
    fn explicit_enabled_false_is_respected() {
        let target = RedirectTarget {
            model: "a".into(),
            weight: 10,
            enabled: Some(false),
        };
        assert!(!target.is_enabled());
    }
}

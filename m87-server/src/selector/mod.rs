//! Weighted selectors over the two routing surfaces (spec C4, C5).

pub mod redirect;
pub mod subgroup;

pub use redirect::ModelRedirectSelector;
pub use subgroup::SubGroupSelector;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Process-wide registry of sub-group selectors, keyed by aggregate group id.
///
/// Rebuild is a whole-map swap under a brief write lock (`ArcSwap::store`);
/// in-flight selections holding a cloned `Arc<SubGroupSelector>` continue to
/// operate against the selector they started with, per spec §5.
pub struct SelectorRegistry {
    selectors: ArcSwap<HashMap<u64, Arc<SubGroupSelector>>>,
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self {
            selectors: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn get(&self, group_id: u64) -> Option<Arc<SubGroupSelector>> {
        self.selectors.load().get(&group_id).cloned()
    }

    /// Replace the whole registry, e.g. after a configuration reload.
    pub fn rebuild(&self, selectors: HashMap<u64, Arc<SubGroupSelector>>) {
        self.selectors.store(Arc::new(selectors));
    }
}

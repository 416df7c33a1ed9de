//! Per-tab origin stickiness.
//!
//! When a tab's top-level document was proxied by a matched rule, its
//! sub-resource requests reuse that decision without matching. An entry
//! lives until the tab navigates at top level or the host reports the tab
//! closed through [`DecisionEngine::tab_closed`].
//!
//! [`DecisionEngine::tab_closed`]: crate::engine::DecisionEngine::tab_closed

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::decision::RoutingDecision;

/// Sticky decisions keyed by tab id.
#[derive(Debug, Default)]
pub struct OriginStickiness {
    tabs: Mutex<FxHashMap<i64, RoutingDecision>>,
}

impl OriginStickiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tab_id: i64) -> Option<RoutingDecision> {
        self.tabs.lock().get(&tab_id).cloned()
    }

    /// Remember the decision of a tab's top-level request.
    pub fn mark(&self, tab_id: i64, decision: RoutingDecision) {
        self.tabs.lock().insert(tab_id, decision);
    }

    /// Forget a tab, on top-level navigation or when the tab closes.
    pub fn invalidate(&self, tab_id: i64) -> bool {
        self.tabs.lock().remove(&tab_id).is_some()
    }

    pub fn clear(&self) {
        self.tabs.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.tabs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.lock().is_empty()
    }
}

//! One-shot per-URL routing overrides.
//!
//! Keys are exact, case-sensitive URLs. An entry is removed by the first
//! request that uses it unless it was registered as non-consuming.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::rule::ProxyServer;

/// What a special URL forces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "proxy", rename_all = "snake_case")]
pub enum SpecialAction {
    Direct,
    /// The default proxy current at decision time.
    DefaultProxy,
    Proxy(Arc<ProxyServer>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialUrlEntry {
    pub action: SpecialAction,
    /// Removed on first use when true.
    pub consume: bool,
}

/// Table of special-URL overrides owned by the decision engine.
#[derive(Debug, Default)]
pub struct SpecialUrlTable {
    entries: Mutex<FxHashMap<String, SpecialUrlEntry>>,
}

impl SpecialUrlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the override for `url`.
    pub fn register(&self, url: impl Into<String>, action: SpecialAction, consume: bool) {
        let url = url.into();
        debug!(url = %url, ?action, consume, "special url registered");
        self.entries
            .lock()
            .insert(url, SpecialUrlEntry { action, consume });
    }

    /// Look up an entry without consuming it.
    pub fn peek(&self, url: &str) -> Option<SpecialUrlEntry> {
        self.entries.lock().get(url).cloned()
    }

    /// Look up an entry for a request, removing it when it is consuming.
    ///
    /// Lookup and removal happen under one lock, so a consuming entry is
    /// handed out exactly once.
    pub fn take(&self, url: &str) -> Option<SpecialAction> {
        let mut entries = self.entries.lock();
        let entry = entries.get(url)?;
        if entry.consume {
            entries.remove(url).map(|entry| entry.action)
        } else {
            Some(entry.action.clone())
        }
    }

    /// Remove and return an entry regardless of its consume flag.
    pub fn consume(&self, url: &str) -> Option<SpecialUrlEntry> {
        self.entries.lock().remove(url)
    }

    pub fn remove(&self, url: &str) -> bool {
        self.entries.lock().remove(url).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of every entry, sorted by URL.
    pub fn snapshot(&self) -> Vec<(String, SpecialUrlEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(url, entry)| (url.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

//! Roadmap cache — remembers successful roadmap artifacts per horizon.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use super::state::Horizon;

/// Session-lifetime store of roadmap artifacts.
///
/// Entries are written only for successful, non-blank results and are never
/// evicted. Failures never touch the cache.
#[derive(Debug, Default)]
pub struct RoadmapCache {
    entries: Mutex<HashMap<Horizon, String>>,
}

impl RoadmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, horizon: Horizon) -> Option<String> {
        let hit = self.lock().get(&horizon).cloned();
        debug!(horizon = %horizon, hit = hit.is_some(), "Roadmap cache lookup");
        hit
    }

    /// Store an artifact. Blank text is not stored.
    pub fn put(&self, horizon: Horizon, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        self.lock().insert(horizon, text);
        debug!(horizon = %horizon, "Roadmap cached");
        true
    }

    pub fn contains(&self, horizon: Horizon) -> bool {
        self.lock().contains_key(&horizon)
    }

    /// Horizons with a cached artifact, in `Horizon::ALL` order.
    pub fn horizons(&self) -> Vec<Horizon> {
        let entries = self.lock();
        Horizon::ALL
            .into_iter()
            .filter(|h| entries.contains_key(h))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Horizon, String>> {
        // The map is always left consistent, so a poisoned guard is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

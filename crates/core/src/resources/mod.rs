use std::collections::{BTreeMap, BTreeSet};

use crate::preset::ResourceConfig;

/// Readiness change reported by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Ready,
    NotReady,
}

/// Tracks the external resources a preset is waiting for.
///
/// Fetching happens elsewhere; the gate only records which keys are still
/// pending. A failed resource stays pending, so the gate never turns ready
/// on its own.
#[derive(Debug, Default)]
pub struct ResourceGate {
    uris: BTreeMap<String, String>,
    pending: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl ResourceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(String::as_str)
    }

    pub fn uri(&self, key: &str) -> Option<&str> {
        self.uris.get(key).map(String::as_str)
    }

    /// Replaces the tracked set with a preset's resources, all pending.
    pub fn reset(&mut self, resources: &ResourceConfig) -> Option<GateSignal> {
        let was_ready = self.is_ready();
        self.uris = resources.uris.clone();
        self.pending = resources.uris.keys().cloned().collect();
        self.failed.clear();
        self.transition(was_ready)
    }

    /// Marks a key as being fetched.
    pub fn begin(&mut self, key: impl Into<String>) -> Option<GateSignal> {
        let was_ready = self.is_ready();
        let key = key.into();
        self.failed.remove(&key);
        self.pending.insert(key);
        self.transition(was_ready)
    }

    pub fn loaded(&mut self, key: &str) -> Option<GateSignal> {
        let was_ready = self.is_ready();
        if !self.pending.remove(key) {
            tracing::debug!(key, "load reported for a resource that was not pending");
        }
        self.failed.remove(key);
        self.transition(was_ready)
    }

    pub fn failed_to_load(&mut self, key: &str) {
        tracing::warn!(key, uri = self.uri(key), "resource failed to load");
        self.failed.insert(key.to_string());
        self.pending.insert(key.to_string());
    }

    fn transition(&self, was_ready: bool) -> Option<GateSignal> {
        match (was_ready, self.is_ready()) {
            (true, false) => Some(GateSignal::NotReady),
            (false, true) => Some(GateSignal::Ready),
            _ => None,
        }
    }
}

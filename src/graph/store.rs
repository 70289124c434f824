//! The identity-map store
//!
//! Keeps every model keyed by (type, id) so that all inbound references
//! to one logical resource resolve to the same allocation. Each type also
//! carries a recency order: an upsert moves the id to the tail, and
//! `find_all` enumerates oldest-touched first. The order governs
//! enumeration only; nothing is ever evicted.

use std::collections::HashMap;

use crate::document::ResourceId;

use super::model::{Model, ModelHandle};
use super::window::{TimeRangeSpec, WindowState};

/// The graph of normalized models. Construct one per logical session;
/// independent stores share no state.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) graph: HashMap<String, HashMap<ResourceId, ModelHandle>>,
    pub(crate) order: HashMap<String, Vec<ResourceId>>,
    pub(crate) windows: HashMap<String, WindowState>,
}

impl Store {
    /// An empty store with no time-window configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with a time-range attribute designated for the
    /// given types.
    pub fn with_time_ranges<I, K>(specs: I) -> Self
    where
        I: IntoIterator<Item = (K, TimeRangeSpec)>,
        K: Into<String>,
    {
        let mut store = Self::new();
        for (kind, spec) in specs {
            store.windows.insert(kind.into(), WindowState::new(spec));
        }
        store
    }

    /// Existing model for (kind, id), or a newly registered one. The
    /// caller decides the placeholder flag. Touches the recency order
    /// either way: an already-known id moves to the tail.
    pub(crate) fn create_or_fetch(&mut self, kind: &str, id: &ResourceId) -> ModelHandle {
        let by_id = self.graph.entry(kind.to_string()).or_default();
        let order = self.order.entry(kind.to_string()).or_default();

        let handle = by_id
            .entry(id.clone())
            .or_insert_with(|| Model::new(kind, id.clone()))
            .clone();

        if let Some(position) = order.iter().position(|known| known == id) {
            order.remove(position);
        }
        order.push(id.clone());

        handle
    }

    /// Constant-time lookup. No side effects; the recency order is not
    /// touched.
    pub fn find(&self, kind: &str, id: impl Into<ResourceId>) -> Option<ModelHandle> {
        let id = id.into();
        self.graph.get(kind).and_then(|by_id| by_id.get(&id)).cloned()
    }

    /// All models of `kind`, oldest-touched first. Empty for unknown
    /// types.
    pub fn find_all(&self, kind: &str) -> Vec<ModelHandle> {
        let by_id = match self.graph.get(kind) {
            Some(by_id) => by_id,
            None => return Vec::new(),
        };
        match self.order.get(kind) {
            Some(order) => order
                .iter()
                .filter_map(|id| by_id.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove a model from the store. Inbound relationship references
    /// held by other models are left in place: the destroyed model stays
    /// reachable through them until they are themselves updated or
    /// destroyed. No-op for fresh models and ids the store does not know.
    pub fn destroy(&mut self, model: &Model) {
        let id = match model.id() {
            Some(id) => id,
            // fresh models are never registered
            None => return,
        };
        if let Some(by_id) = self.graph.get_mut(model.kind()) {
            by_id.remove(id);
        }
        if let Some(order) = self.order.get_mut(model.kind()) {
            if let Some(position) = order.iter().position(|known| known == id) {
                order.remove(position);
            }
        }
    }

    /// Empty the store. The time-window configuration survives; parsed
    /// windows and indexes are dropped. Outstanding handles stay valid
    /// objects, merely unreachable through the store.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.order.clear();
        for state in self.windows.values_mut() {
            state.clear();
        }
    }
}

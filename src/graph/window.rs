//! Time-window index
//!
//! Optional per-type secondary index over an attribute holding a textual
//! timestamp range, answering "active during [start, end)" queries
//! without re-scanning the whole graph. Parsed windows are refreshed once
//! per sync pass; for `indexed` types an interval tree is rebuilt from
//! scratch at the same time. The index is a derived cache over the live
//! graph: queries resolve ids through the graph, so an entry left stale
//! by `destroy` between syncs is skipped harmlessly.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::document::{ResourceId, ResourceIdentifier};

use super::model::{Model, ModelHandle, Relation};
use super::store::Store;

/// Per-type configuration for the window subsystem.
#[derive(Clone, Debug)]
pub struct TimeRangeSpec {
    pub field: String,
    pub indexed: bool,
}

impl TimeRangeSpec {
    /// Designate `name` as the range attribute; queries scan linearly.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: name.into(),
            indexed: false,
        }
    }

    /// Designate `name` as the range attribute and keep an interval index
    /// rebuilt after every sync pass.
    pub fn indexed(name: impl Into<String>) -> Self {
        Self {
            field: name.into(),
            indexed: true,
        }
    }
}

/// A half-open `[start, end)` range in epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Overlap against query bounds: `start < query_end && end >= query_start`.
    pub fn overlaps(&self, query_start: i64, query_end: i64) -> bool {
        self.start < query_end && self.end >= query_start
    }
}

/// Parse the textual two-quoted-timestamp range form, e.g.
/// `["2024-05-04 10:00:00+00","2024-05-04 12:00:00+00")`. Anything that
/// does not contain exactly two parsable quoted timestamps yields `None`.
fn parse_window(value: &Value) -> Option<TimeWindow> {
    let text = value.as_str()?;

    let mut stamps = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('"') {
        let tail = &rest[open + 1..];
        let close = tail.find('"')?;
        stamps.push(&tail[..close]);
        rest = &tail[close + 1..];
    }
    if stamps.len() != 2 {
        return None;
    }

    let start = parse_timestamp(stamps[0])?;
    let end = parse_timestamp(stamps[1])?;
    Some(TimeWindow { start, end })
}

fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed.timestamp_millis());
    }
    // offset-less values are read as UTC
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc().timestamp_millis());
    }
    None
}

/// Window bookkeeping for one configured type.
#[derive(Debug)]
pub(crate) struct WindowState {
    spec: TimeRangeSpec,
    parsed: HashMap<ResourceId, Option<TimeWindow>>,
    index: Option<IntervalIndex>,
}

impl WindowState {
    pub(crate) fn new(spec: TimeRangeSpec) -> Self {
        Self {
            spec,
            parsed: HashMap::new(),
            index: None,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.parsed.clear();
        self.index = None;
    }
}

#[derive(Clone, Debug)]
struct IndexEntry {
    window: TimeWindow,
    /// Position in the type's recency order at build time, so query hits
    /// come back in enumeration order.
    position: usize,
    id: ResourceId,
}

/// Static interval tree: entries sorted by window start, with the maximum
/// window end of every subtree precomputed for pruning. Rebuilt from
/// scratch after each sync pass.
#[derive(Debug)]
struct IntervalIndex {
    entries: Vec<IndexEntry>,
    max_end: Vec<i64>,
}

impl IntervalIndex {
    fn build(mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by(|a, b| {
            (a.window.start, a.position).cmp(&(b.window.start, b.position))
        });
        let mut max_end = vec![i64::MIN; entries.len()];
        fill_max_end(&entries, &mut max_end, 0, entries.len());
        Self { entries, max_end }
    }

    /// Ids whose windows overlap `[start, end)`, in recency order.
    fn query(&self, start: i64, end: i64) -> Vec<ResourceId> {
        let mut hits = Vec::new();
        self.collect(0, self.entries.len(), start, end, &mut hits);
        hits.sort_by_key(|(position, _)| *position);
        hits.into_iter().map(|(_, id)| id).collect()
    }

    fn collect(
        &self,
        lo: usize,
        hi: usize,
        start: i64,
        end: i64,
        hits: &mut Vec<(usize, ResourceId)>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        // nothing in this subtree ends late enough
        if self.max_end[mid] < start {
            return;
        }
        self.collect(lo, mid, start, end, hits);

        let entry = &self.entries[mid];
        if entry.window.overlaps(start, end) {
            hits.push((entry.position, entry.id.clone()));
        }
        // sorted by start: past the query end no window can begin in range
        if entry.window.start < end {
            self.collect(mid + 1, hi, start, end, hits);
        }
    }
}

fn fill_max_end(entries: &[IndexEntry], max_end: &mut [i64], lo: usize, hi: usize) -> i64 {
    if lo >= hi {
        return i64::MIN;
    }
    let mid = lo + (hi - lo) / 2;
    let left = fill_max_end(entries, max_end, lo, mid);
    let right = fill_max_end(entries, max_end, mid + 1, hi);
    let best = entries[mid].window.end.max(left).max(right);
    max_end[mid] = best;
    best
}

impl Store {
    /// Re-parse designated attributes and rebuild interval indexes for
    /// configured types. Runs once per completed sync pass.
    pub(crate) fn process_windows(&mut self) {
        for (kind, state) in self.windows.iter_mut() {
            state.parsed.clear();
            let mut entries = Vec::new();

            if let (Some(by_id), Some(order)) = (self.graph.get(kind), self.order.get(kind)) {
                for (position, id) in order.iter().enumerate() {
                    let model = match by_id.get(id) {
                        Some(model) => model,
                        None => continue,
                    };
                    let window = model
                        .attribute(&state.spec.field)
                        .and_then(|value| parse_window(&value));
                    if let Some(window) = window {
                        entries.push(IndexEntry {
                            window,
                            position,
                            id: id.clone(),
                        });
                    }
                    state.parsed.insert(id.clone(), window);
                }
            }

            state.index = if state.spec.indexed {
                Some(IntervalIndex::build(entries))
            } else {
                None
            };
        }
    }

    /// Models of `kind` whose parsed window overlaps `[start, end)`, in
    /// enumeration order.
    ///
    /// With neither bound this is exactly [`Store::find_all`]. Otherwise a
    /// missing start is treated as -inf and a missing end as +inf. Records
    /// whose designated attribute did not parse never match, and a type
    /// with no time-range configuration matches nothing once a bound is
    /// given.
    pub fn find_all_by_window(
        &self,
        kind: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Vec<ModelHandle> {
        if start.is_none() && end.is_none() {
            return self.find_all(kind);
        }
        let state = match self.windows.get(kind) {
            Some(state) => state,
            None => return Vec::new(),
        };
        let by_id = match self.graph.get(kind) {
            Some(by_id) => by_id,
            None => return Vec::new(),
        };
        let start = start.unwrap_or(i64::MIN);
        let end = end.unwrap_or(i64::MAX);

        if let Some(index) = &state.index {
            return index
                .query(start, end)
                .into_iter()
                .filter_map(|id| by_id.get(&id).cloned())
                .collect();
        }

        let order = match self.order.get(kind) {
            Some(order) => order,
            None => return Vec::new(),
        };
        let mut matches = Vec::new();
        for id in order {
            let window = match state.parsed.get(id) {
                Some(Some(window)) => window,
                _ => continue,
            };
            if window.overlaps(start, end) {
                if let Some(model) = by_id.get(id) {
                    matches.push(model.clone());
                }
            }
        }
        matches
    }

    /// The parsed window of one record as of the last sync pass, if its
    /// designated attribute held a parsable range.
    pub fn time_window(&self, kind: &str, id: impl Into<ResourceId>) -> Option<TimeWindow> {
        let id = id.into();
        self.windows
            .get(kind)?
            .parsed
            .get(&id)
            .copied()
            .flatten()
    }

    /// A filtered, consolidated snapshot of the graph: records of `kind`
    /// are filtered by the window, every other type carries through
    /// unfiltered, and every surviving relationship is re-pointed at the
    /// counterpart clone inside the snapshot. Relationships whose target
    /// fell outside the filter are dropped (to-many memberships are
    /// filtered, an emptied list stays as an empty list). The snapshot is
    /// a read-only value; the live store is never modified.
    pub fn window_snapshot(
        &self,
        kind: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> GraphSnapshot {
        let mut surviving: HashSet<ResourceIdentifier> = HashSet::new();
        let mut order: HashMap<String, Vec<ResourceId>> = HashMap::new();

        for each_kind in self.graph.keys() {
            let ids: Vec<ResourceId> = if each_kind == kind {
                self.find_all_by_window(kind, start, end)
                    .iter()
                    .filter_map(|model| model.id().cloned())
                    .collect()
            } else {
                self.order.get(each_kind).cloned().unwrap_or_default()
            };
            for id in &ids {
                surviving.insert(ResourceIdentifier::new(each_kind.clone(), id.clone()));
            }
            order.insert(each_kind.clone(), ids);
        }

        let mut records: HashMap<String, HashMap<ResourceId, SnapshotRecord>> = HashMap::new();
        for (each_kind, ids) in &order {
            let by_id = match self.graph.get(each_kind) {
                Some(by_id) => by_id,
                None => continue,
            };
            let mut kind_records = HashMap::new();
            for id in ids {
                let model = match by_id.get(id) {
                    Some(model) => model,
                    None => continue,
                };
                kind_records.insert(id.clone(), snapshot_record(each_kind, id, model, &surviving));
            }
            records.insert(each_kind.clone(), kind_records);
        }

        GraphSnapshot { records, order }
    }
}

fn snapshot_record(
    kind: &str,
    id: &ResourceId,
    model: &Model,
    surviving: &HashSet<ResourceIdentifier>,
) -> SnapshotRecord {
    let mut relations = Vec::new();
    for name in model.relationship_names() {
        match model.relationship(&name) {
            Some(Relation::Empty) => relations.push((name, SnapshotRelation::Empty)),
            Some(Relation::One(target)) => {
                // a to-one target outside the filter (or with no id) drops
                // the relationship entirely
                if let Some(identifier) = target.identifier() {
                    if surviving.contains(&identifier) {
                        relations.push((name, SnapshotRelation::One(identifier)));
                    }
                }
            }
            Some(Relation::Many(targets)) => {
                let kept: Vec<ResourceIdentifier> = targets
                    .iter()
                    .filter_map(|target| target.identifier())
                    .filter(|identifier| surviving.contains(identifier))
                    .collect();
                relations.push((name, SnapshotRelation::Many(kept)));
            }
            None => {}
        }
    }
    SnapshotRecord {
        kind: kind.to_string(),
        id: id.clone(),
        attributes: model.attributes(),
        relations,
    }
}

/// A re-pointed relationship inside a snapshot, by identifier.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotRelation {
    Empty,
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
}

/// One record inside a [`GraphSnapshot`]: a plain attribute clone, not a
/// live handle.
#[derive(Clone, Debug)]
pub struct SnapshotRecord {
    kind: String,
    id: ResourceId,
    attributes: Map<String, Value>,
    relations: Vec<(String, SnapshotRelation)>,
}

impl SnapshotRecord {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    pub fn relation(&self, name: &str) -> Option<&SnapshotRelation> {
        self.relations
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, relation)| relation)
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.relations.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Read-only filtered view of the graph produced by
/// [`Store::window_snapshot`]. Never written back into the live store.
#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    records: HashMap<String, HashMap<ResourceId, SnapshotRecord>>,
    order: HashMap<String, Vec<ResourceId>>,
}

impl GraphSnapshot {
    pub fn get(&self, kind: &str, id: impl Into<ResourceId>) -> Option<&SnapshotRecord> {
        let id = id.into();
        self.records.get(kind)?.get(&id)
    }

    /// All surviving records of `kind`, in the live store's enumeration
    /// order at snapshot time.
    pub fn all(&self, kind: &str) -> Vec<&SnapshotRecord> {
        let by_id = match self.records.get(kind) {
            Some(by_id) => by_id,
            None => return Vec::new(),
        };
        match self.order.get(kind) {
            Some(order) => order.iter().filter_map(|id| by_id.get(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Resolve a to-one relationship within the snapshot.
    pub fn related(&self, record: &SnapshotRecord, name: &str) -> Option<&SnapshotRecord> {
        match record.relation(name)? {
            SnapshotRelation::One(identifier) => self.get(&identifier.kind, &identifier.id),
            _ => None,
        }
    }

    /// Resolve a relationship's full membership within the snapshot.
    pub fn related_all(&self, record: &SnapshotRecord, name: &str) -> Vec<&SnapshotRecord> {
        match record.relation(name) {
            Some(SnapshotRelation::One(identifier)) => self
                .get(&identifier.kind, &identifier.id)
                .into_iter()
                .collect(),
            Some(SnapshotRelation::Many(identifiers)) => identifiers
                .iter()
                .filter_map(|identifier| self.get(&identifier.kind, &identifier.id))
                .collect(),
            _ => Vec::new(),
        }
    }
}

//! jsonapi-graph: a client-side, in-memory JSON:API resource graph
//!
//! Ingests JSON:API documents, normalizes their resources into a
//! deduplicated graph keyed by (type, id), resolves relationships
//! (including forward references and cycles), and serializes models back
//! into JSON:API documents. Single-threaded by design: models are shared
//! `Rc` handles with interior mutability, so every holder sees the same
//! logical resource.

pub mod document;
pub mod graph;

pub use document::{
    Document, DocumentError, Linkage, PrimaryData, Relationship, Resource, ResourceId,
    ResourceIdentifier,
};
pub use graph::{
    GraphSnapshot, Model, ModelHandle, Relation, SerializeOptions, SnapshotRecord,
    SnapshotRelation, Store, SyncOutcome, Synced, TimeRangeSpec, TimeWindow,
};

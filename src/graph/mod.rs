//! The object graph: models, the identity-map store, the sync engine, and
//! the optional time-window index.

mod model;
mod store;
mod sync;
mod window;

pub use model::{Model, ModelHandle, Relation, SerializeOptions};
pub use store::Store;
pub use sync::{SyncOutcome, Synced};
pub use window::{
    GraphSnapshot, SnapshotRecord, SnapshotRelation, TimeRangeSpec, TimeWindow,
};

//! The merge engine
//!
//! Walks a JSON:API document (included resources first, then primary
//! data), creating or updating models through the store and resolving
//! relationship linkage to shared handles. A reference to a resource that
//! has not arrived yet becomes a placeholder model; when that resource is
//! later synced the same allocation gains its attributes, so nothing the
//! caller holds needs re-linking.

use serde_json::Value;

use crate::document::{Document, Linkage, PrimaryData, Resource, ResourceIdentifier};

use super::model::{Model, ModelHandle, Relation};
use super::store::Store;

/// Primary resource(s) normalized by one sync pass.
#[derive(Clone, Debug)]
pub enum Synced {
    Empty,
    One(ModelHandle),
    Many(Vec<ModelHandle>),
}

impl Synced {
    pub fn one(&self) -> Option<&ModelHandle> {
        match self {
            Synced::One(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn many(&self) -> Option<&[ModelHandle]> {
        match self {
            Synced::Many(handles) => Some(handles),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelHandle> {
        let slice: &[ModelHandle] = match self {
            Synced::Empty => &[],
            Synced::One(handle) => std::slice::from_ref(handle),
            Synced::Many(handles) => handles,
        };
        slice.iter()
    }

    pub fn len(&self) -> usize {
        match self {
            Synced::Empty => 0,
            Synced::One(_) => 1,
            Synced::Many(handles) => handles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`Store::sync_with_meta`]: the normalized primary data plus
/// the document's `meta` member, if any.
#[derive(Clone, Debug)]
pub struct SyncOutcome {
    pub data: Synced,
    pub meta: Option<Value>,
}

impl Store {
    /// Merge a document into the store and return the normalized primary
    /// resource(s).
    pub fn sync(&mut self, document: &Document) -> Synced {
        self.sync_with_meta(document).data
    }

    /// Merge a document into the store, returning the normalized primary
    /// resource(s) together with the document's `meta` member.
    ///
    /// A document without a `data` member has nothing to normalize and
    /// leaves the graph untouched. A top-level `errors` member is never
    /// inspected here; callers branch on it before syncing.
    pub fn sync_with_meta(&mut self, document: &Document) -> SyncOutcome {
        let primary = match &document.data {
            Some(primary) => primary,
            None => {
                return SyncOutcome {
                    data: Synced::Empty,
                    meta: None,
                }
            }
        };

        // Included resources first, so the primary resources link to real
        // models rather than placeholders.
        if let Some(included) = &document.included {
            for resource in included {
                self.sync_record(resource);
            }
        }

        let data = match primary {
            PrimaryData::One(resource) => Synced::One(self.sync_record(resource)),
            PrimaryData::Many(resources) => Synced::Many(
                resources
                    .iter()
                    .map(|resource| self.sync_record(resource))
                    .collect(),
            ),
        };

        self.process_windows();

        SyncOutcome {
            data,
            meta: document.meta.clone(),
        }
    }

    /// Merge one resource object. Attributes overwrite, relationship
    /// linkage resolves through the store, and the placeholder flag clears
    /// because the resource has now been seen with real data (even when it
    /// carries no attributes).
    fn sync_record(&mut self, resource: &Resource) -> ModelHandle {
        let model = match &resource.id {
            Some(id) => self.create_or_fetch(&resource.kind, id),
            // no id: an unregistered model the caller gets back, the graph
            // stays untouched
            None => Model::fresh(resource.kind.clone()),
        };

        model.set_placeholder(false);

        for (name, value) in &resource.attributes {
            model.set_attribute(name.clone(), value.clone());
        }

        if let Some(links) = &resource.links {
            model.set_links(links.clone());
        }

        for (name, relationship) in &resource.relationships {
            match &relationship.data {
                Some(Linkage::Empty) => {
                    model.set_relationship(name.clone(), Relation::Empty);
                }
                Some(Linkage::One(identifier)) => {
                    let target = self.find_or_init(identifier);
                    model.set_relationship(name.clone(), Relation::One(target));
                }
                Some(Linkage::Many(identifiers)) => {
                    let targets = identifiers
                        .iter()
                        .map(|identifier| self.find_or_init(identifier))
                        .collect();
                    model.set_relationship(name.clone(), Relation::Many(targets));
                }
                None => {
                    if relationship.links.is_some() {
                        log::warn!(
                            "relationship '{}' on '{}' carries only links; \
                             links-only relationships are not resolved",
                            name,
                            resource.kind
                        );
                    }
                }
            }
        }

        model
    }

    /// Resolve a relationship identifier to a shared handle, creating a
    /// placeholder when the target has not been synced yet.
    fn find_or_init(&mut self, identifier: &ResourceIdentifier) -> ModelHandle {
        if let Some(existing) = self.find(&identifier.kind, &identifier.id) {
            return existing;
        }
        let target = self.create_or_fetch(&identifier.kind, &identifier.id);
        target.set_placeholder(true);
        target
    }
}

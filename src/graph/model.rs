//! The normalized model
//!
//! A `Model` is the mutable in-memory form of one JSON:API resource,
//! identified by (type, id). Attribute and relationship names are kept in
//! insertion order so serialization reproduces the order the data first
//! arrived in. State lives behind interior mutability: the store and every
//! relationship that points at a model share one allocation, so an update
//! through the sync engine is visible through every outstanding handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::document::{
    Document, Linkage, Relationship, Resource, ResourceId, ResourceIdentifier,
};

/// Shared handle to a model.
pub type ModelHandle = Rc<Model>;

/// A relationship value on a model.
#[derive(Clone)]
pub enum Relation {
    /// Explicit empty linkage (`data: null`).
    Empty,
    One(ModelHandle),
    Many(Vec<ModelHandle>),
}

impl fmt::Debug for Relation {
    // prints identifiers only; relationship graphs may be cyclic
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn label(model: &Model) -> String {
            match model.id() {
                Some(id) => format!("{}:{}", model.kind(), id),
                None => format!("{}:?", model.kind()),
            }
        }
        match self {
            Relation::Empty => f.write_str("Empty"),
            Relation::One(handle) => write!(f, "One({})", label(handle)),
            Relation::Many(handles) => {
                let labels: Vec<String> = handles.iter().map(|h| label(h)).collect();
                write!(f, "Many([{}])", labels.join(", "))
            }
        }
    }
}

pub struct Model {
    kind: String,
    id: Option<ResourceId>,
    attributes: RefCell<Map<String, Value>>,
    relationships: RefCell<Vec<(String, Relation)>>,
    links: RefCell<Option<Value>>,
    placeholder: Cell<bool>,
}

impl Model {
    /// Construct a model with an identity. Models built directly are not
    /// registered in any store; the store constructs its own.
    pub fn new(kind: impl Into<String>, id: impl Into<ResourceId>) -> ModelHandle {
        Rc::new(Model {
            kind: kind.into(),
            id: Some(id.into()),
            attributes: RefCell::new(Map::new()),
            relationships: RefCell::new(Vec::new()),
            links: RefCell::new(None),
            placeholder: Cell::new(false),
        })
    }

    /// A model without an id, for building outbound payloads. Never placed
    /// in a store.
    pub fn fresh(kind: impl Into<String>) -> ModelHandle {
        Rc::new(Model {
            kind: kind.into(),
            id: None,
            attributes: RefCell::new(Map::new()),
            relationships: RefCell::new(Vec::new()),
            links: RefCell::new(None),
            placeholder: Cell::new(false),
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&ResourceId> {
        self.id.as_ref()
    }

    /// The `{type, id}` pair naming this model, if it has an id.
    pub fn identifier(&self) -> Option<ResourceIdentifier> {
        self.id
            .clone()
            .map(|id| ResourceIdentifier::new(self.kind.clone(), id))
    }

    /// True while the model exists only because something referenced it
    /// and its own resource data has not arrived yet.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder.get()
    }

    pub(crate) fn set_placeholder(&self, value: bool) {
        self.placeholder.set(value);
    }

    /// Set or add an attribute. The name is registered once; repeated
    /// calls overwrite the value and keep the original position.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    /// Attribute names in insertion order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.borrow().keys().cloned().collect()
    }

    /// A clone of the full attribute map, in insertion order.
    pub fn attributes(&self) -> Map<String, Value> {
        self.attributes.borrow().clone()
    }

    /// Set or add a relationship, with the same append-once semantics as
    /// [`Model::set_attribute`].
    pub fn set_relationship(&self, name: impl Into<String>, relation: Relation) {
        let name = name.into();
        let mut relationships = self.relationships.borrow_mut();
        match relationships.iter_mut().find(|(known, _)| *known == name) {
            Some((_, slot)) => *slot = relation,
            None => relationships.push((name, relation)),
        }
    }

    pub fn relationship(&self, name: &str) -> Option<Relation> {
        self.relationships
            .borrow()
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, relation)| relation.clone())
    }

    /// Relationship names in insertion order.
    pub fn relationship_names(&self) -> Vec<String> {
        self.relationships
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The related model under `name`, if the relationship is to-one.
    pub fn related(&self, name: &str) -> Option<ModelHandle> {
        match self.relationship(name)? {
            Relation::One(handle) => Some(handle),
            _ => None,
        }
    }

    /// All related models under `name`; a to-one relationship yields one
    /// element, an empty or absent relationship yields none.
    pub fn related_all(&self, name: &str) -> Vec<ModelHandle> {
        match self.relationship(name) {
            Some(Relation::One(handle)) => vec![handle],
            Some(Relation::Many(handles)) => handles,
            _ => Vec::new(),
        }
    }

    /// The resource-level `links` member, when the last synced resource
    /// carried one.
    pub fn links(&self) -> Option<Value> {
        self.links.borrow().clone()
    }

    pub(crate) fn set_links(&self, links: Value) {
        *self.links.borrow_mut() = Some(links);
    }

    /// Serialize the model into a JSON:API document with every attribute
    /// and relationship included.
    pub fn serialize(&self) -> Document {
        self.serialize_with(&SerializeOptions::default())
    }

    /// Serialize with allow-lists.
    ///
    /// `id` appears only when the model has one. The `attributes` and
    /// `relationships` sections appear only when non-empty after the
    /// allow-list is applied. Relationships emit identifiers only, never
    /// nested bodies, which keeps cyclic graphs serializable.
    pub fn serialize_with(&self, options: &SerializeOptions) -> Document {
        let source = self.attributes.borrow();
        let mut attributes = Map::new();
        match &options.attributes {
            Some(names) => {
                for name in names {
                    if let Some(value) = source.get(name) {
                        attributes.insert(name.clone(), value.clone());
                    }
                }
            }
            None => attributes = source.clone(),
        }
        drop(source);

        let source = self.relationships.borrow();
        let mut relationships = Vec::new();
        match &options.relationships {
            Some(names) => {
                for name in names {
                    if let Some((_, relation)) =
                        source.iter().find(|(known, _)| known == name)
                    {
                        relationships.push((name.clone(), relation_member(relation)));
                    }
                }
            }
            None => {
                for (name, relation) in source.iter() {
                    relationships.push((name.clone(), relation_member(relation)));
                }
            }
        }
        drop(source);

        Document::one(Resource {
            kind: self.kind.clone(),
            id: self.id.clone(),
            attributes,
            relationships,
            links: None,
        })
    }
}

fn relation_member(relation: &Relation) -> Relationship {
    let data = match relation {
        Relation::Empty => Linkage::Empty,
        // a fresh target has no identifier to emit
        Relation::One(handle) => match handle.identifier() {
            Some(identifier) => Linkage::One(identifier),
            None => Linkage::Empty,
        },
        Relation::Many(handles) => Linkage::Many(
            handles
                .iter()
                .filter_map(|handle| handle.identifier())
                .collect(),
        ),
    };
    Relationship {
        data: Some(data),
        links: None,
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("placeholder", &self.placeholder.get())
            .field("attributes", &self.attribute_names())
            .field("relationships", &self.relationship_names())
            .finish()
    }
}

/// Allow-lists for [`Model::serialize_with`]. `None` means every name the
/// model knows.
#[derive(Clone, Debug, Default)]
pub struct SerializeOptions {
    pub attributes: Option<Vec<String>>,
    pub relationships: Option<Vec<String>>,
}

//! Typed JSON:API wire subset
//!
//! The store consumes already-parsed documents; these types cover the
//! subset of the JSON:API document structure that the sync engine reads
//! and the serializer emits. Unknown members are ignored on input, absent
//! members are omitted on output. Typed deserialization is the one place
//! malformed payloads surface as an error; the sync engine itself never
//! validates.

use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("malformed JSON:API document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A resource id. JSON:API permits string and number ids; the two are
/// distinct keys, so `1337` and `"1337"` name different resources.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Number(n) => write!(f, "{}", n),
            ResourceId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId::Number(value)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        ResourceId::Number(value as i64)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId::Text(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId::Text(value)
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(value: &ResourceId) -> Self {
        value.clone()
    }
}

/// A `{type, id}` pair naming one resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: ResourceId,
}

impl ResourceIdentifier {
    pub fn new(kind: impl Into<String>, id: impl Into<ResourceId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// The `data` member of a relationship: one identifier, a list of
/// identifiers, or an explicit null.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
    Empty,
}

/// One entry of a resource's `relationships` object.
///
/// A present-but-null `data` member is an explicit empty linkage
/// (`Some(Linkage::Empty)`); an absent `data` member is `None`. The
/// distinction matters: links-only relationships carry no linkage at all.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(
        default,
        deserialize_with = "linkage_member",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Linkage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

fn linkage_member<'de, D>(deserializer: D) -> Result<Option<Linkage>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(Some(Linkage::Empty));
    }
    serde_json::from_value(value).map(Some).map_err(DeError::custom)
}

/// One JSON:API resource object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(
        default,
        with = "relationship_map",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relationships: Vec<(String, Relationship)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

/// (De)serializes the `relationships` object as an ordered pair list, so
/// relationship resolution and serialization preserve document order.
mod relationship_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::Relationship;

    pub fn serialize<S>(
        pairs: &[(String, Relationship)],
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (name, relationship) in pairs {
            map.serialize_entry(name, relationship)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, Relationship)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairVisitor;

        impl<'de> Visitor<'de> for PairVisitor {
            type Value = Vec<(String, Relationship)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a relationships object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry()? {
                    pairs.push(entry);
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairVisitor)
    }
}

/// The `data` member of a document: a single resource or a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(Resource),
    Many(Vec<Resource>),
}

/// A JSON:API document.
///
/// `errors` is opaque to this crate: the sync engine only inspects
/// `data`, `included`, and `meta`. Callers who care branch on `errors`
/// before syncing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PrimaryData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Resource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

impl Document {
    /// Parse a document from JSON text.
    pub fn from_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a document from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    /// A document holding a single primary resource.
    pub fn one(resource: Resource) -> Self {
        Document {
            data: Some(PrimaryData::One(resource)),
            ..Default::default()
        }
    }

    /// A document holding a resource collection.
    pub fn many(resources: Vec<Resource>) -> Self {
        Document {
            data: Some(PrimaryData::Many(resources)),
            ..Default::default()
        }
    }
}

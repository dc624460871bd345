//! Source tree nodes
//!
//! A [`Node`] is either a scalar or a branch. Branches are JSON objects, or
//! JSON arrays which traverse like objects keyed by their decimal index but
//! convert back to arrays when written out.

use crate::path::TreePath;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;

/// Scalar type tag reported by the sampler instead of the value itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Number,
    Boolean,
}

impl ScalarKind {
    /// Every tag, in display order
    pub const ALL: [ScalarKind; 3] = [Self::String, Self::Number, Self::Boolean];

    /// Stable tag name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Inverse of [`ScalarKind::as_str`]
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Type tag, `None` for null
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ScalarKind::Boolean),
            Self::Number(_) => Some(ScalarKind::Number),
            Self::String(_) => Some(ScalarKind::String),
        }
    }

    /// Convert to a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

/// Node of an untyped source tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Object(IndexMap<String, Node>),
    Array(Vec<Node>),
}

impl Node {
    /// Null leaf
    #[inline]
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(input).map(Self::from)
    }

    /// Parse a JSON document from bytes
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed input.
    pub fn from_slice(input: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Value>(input).map(Self::from)
    }

    /// Whether this node has children to traverse
    #[inline]
    #[must_use]
    pub fn is_branch(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }

    /// Whether this node is a null leaf
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    /// Scalar payload, if this is a leaf
    #[inline]
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Runtime type name, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(Scalar::Null) => "null",
            Self::Scalar(s) => s.kind().map_or("null", ScalarKind::as_str),
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    /// Number of direct children (0 for leaves)
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::Object(map) => map.len(),
            Self::Array(items) => items.len(),
        }
    }

    /// Whether the node has no children
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child by key
    ///
    /// Arrays accept canonical decimal indices only (`"1"`, not `"01"`).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Scalar(_) => None,
            Self::Object(map) => map.get(key),
            Self::Array(items) => parse_index(key).and_then(|i| items.get(i)),
        }
    }

    /// Descendant at `path`
    #[must_use]
    pub fn at(&self, path: &TreePath) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Iterate children in natural order
    #[must_use]
    pub fn entries(&self) -> Entries<'_> {
        match self {
            Self::Scalar(_) => Entries::Empty,
            Self::Object(map) => Entries::Object(map.iter()),
            Self::Array(items) => Entries::Array(items.iter().enumerate()),
        }
    }

    /// Consume the node into its children in natural order
    #[must_use]
    pub fn into_entries(self) -> Vec<(String, Node)> {
        match self {
            Self::Scalar(_) => Vec::new(),
            Self::Object(map) => map.into_iter().collect(),
            Self::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, node)| (i.to_string(), node))
                .collect(),
        }
    }

    /// Convert back to a JSON value
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Scalar(s) => s.to_value(),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    /// Convert into a JSON value without cloning
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Scalar(Scalar::Null) => Value::Null,
            Self::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            Self::Scalar(Scalar::Number(n)) => Value::Number(n),
            Self::Scalar(Scalar::String(s)) => Value::String(s),
            Self::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<_, _>>(),
            ),
            Self::Array(items) => Value::Array(items.into_iter().map(Self::into_value).collect()),
        }
    }

    /// Object fields, if this node is a JSON object
    ///
    /// Arrays and scalars return `None`: a document is a field map.
    #[must_use]
    pub fn into_fields(self) -> Option<Map<String, Value>> {
        if !matches!(self, Self::Object(_)) {
            return None;
        }
        match self.into_value() {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            Value::String(s) => Self::Scalar(Scalar::String(s)),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        node.into_value()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// Iterator over a node's children, see [`Node::entries`]
#[derive(Debug)]
pub enum Entries<'a> {
    Empty,
    Object(indexmap::map::Iter<'a, String, Node>),
    Array(std::iter::Enumerate<std::slice::Iter<'a, Node>>),
}

impl<'a> Iterator for Entries<'a> {
    type Item = (Cow<'a, str>, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Empty => None,
            Self::Object(iter) => iter.next().map(|(k, v)| (Cow::Borrowed(k.as_str()), v)),
            Self::Array(iter) => iter.next().map(|(i, v)| (Cow::Owned(i.to_string()), v)),
        }
    }
}

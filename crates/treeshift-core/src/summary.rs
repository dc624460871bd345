//! Structure summaries
//!
//! A [`Summary`] is the bounded shape of a source tree shown to the operator.
//! It never carries leaf values, only type tags.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use treeshift_tree::{ScalarKind, TreePath};

/// Marker that replaces subtrees past the sampler's depth limit
pub const MAX_DEPTH_MARKER: &str = "Max depth reached";

/// Shape of a sampled subtree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Null or absent node
    Null,
    /// Scalar of the given type
    Leaf(ScalarKind),
    /// Sampled children, in natural order
    Branch(IndexMap<String, Summary>),
    /// Depth limit reached, shape unknown
    MaxDepth,
}

impl Summary {
    /// Whether this is a branch
    #[inline]
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }

    /// Child summary by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Summary> {
        match self {
            Self::Branch(children) => children.get(key),
            _ => None,
        }
    }

    /// Summary at `path`
    #[must_use]
    pub fn at(&self, path: &TreePath) -> Option<&Summary> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Whether `path` addresses a sampled node
    #[must_use]
    pub fn contains(&self, path: &TreePath) -> bool {
        self.at(path).is_some()
    }

    /// Every sampled path below the root, depth-first in natural order
    #[must_use]
    pub fn paths(&self) -> Vec<TreePath> {
        let mut out = Vec::new();
        self.collect_paths(&TreePath::root(), &mut out);
        out
    }

    fn collect_paths(&self, at: &TreePath, out: &mut Vec<TreePath>) {
        if let Self::Branch(children) = self {
            for (key, child) in children {
                let path = at.child(key.as_str());
                out.push(path.clone());
                child.collect_paths(&path, out);
            }
        }
    }

    /// Largest number of children of any branch
    #[must_use]
    pub fn max_fanout(&self) -> usize {
        match self {
            Self::Branch(children) => children
                .values()
                .map(Self::max_fanout)
                .max()
                .unwrap_or(0)
                .max(children.len()),
            _ => 0,
        }
    }

    /// Depth of the deepest node (root is 0)
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Branch(children) => children
                .values()
                .map(|child| child.depth() + 1)
                .max()
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Convert to the JSON shape shown to operators
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Leaf(kind) => Value::String(kind.as_str().to_string()),
            Self::MaxDepth => Value::String(MAX_DEPTH_MARKER.to_string()),
            Self::Branch(children) => Value::Object(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// Parse the JSON shape produced by [`Summary::to_value`]
    ///
    /// # Errors
    /// Returns a message for strings that are neither a type tag nor the
    /// marker, and for arrays, numbers and booleans.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(s) if s == MAX_DEPTH_MARKER => Ok(Self::MaxDepth),
            Value::String(s) => ScalarKind::from_name(s)
                .map(Self::Leaf)
                .ok_or_else(|| format!("unknown type tag '{s}'")),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Self::from_value(v).map(|s| (k.clone(), s)))
                .collect::<Result<IndexMap<_, _>, _>>()
                .map(Self::Branch),
            other => Err(format!("unexpected summary value {other}")),
        }
    }
}

impl Serialize for Summary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Leaf(kind) => serializer.serialize_str(kind.as_str()),
            Self::MaxDepth => serializer.serialize_str(MAX_DEPTH_MARKER),
            Self::Branch(children) => children.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Summary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

//! Target document stores
//!
//! The destination is organised as containers: the root and every
//! (sub)collection. A container holds named documents plus a container-level
//! field map, which is where `field` classifications are merged.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Field map of a document or container
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Handle to the root or a (nested) collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionRef(Vec<String>);

impl CollectionRef {
    /// The database root
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Nested collection `name`
    #[inline]
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Document `id` inside this container
    #[inline]
    #[must_use]
    pub fn document(&self, id: impl Into<String>) -> DocRef {
        DocRef {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Collection names from the root
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root container
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for CollectionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        f.write_str(&self.0.join("/"))
    }
}

/// Handle to one document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocRef {
    collection: CollectionRef,
    id: String,
}

impl DocRef {
    /// Container the document lives in
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    /// Document id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for DocRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.collection.is_root() {
            f.write_str(&self.id)
        } else {
            write!(f, "{}/{}", self.collection, self.id)
        }
    }
}

/// Write access to a document store
///
/// Both operations resolve only once the store has acknowledged the write.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Replace the document wholesale
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError>;

    /// Merge `fields` into the container, leaving other fields untouched
    async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: TargetStore + ?Sized> TargetStore for std::sync::Arc<T> {
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
        (**self).set(doc, fields).await
    }

    async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError> {
        (**self).update(collection, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_refs_nest() {
        let users = CollectionRef::root().collection("users");
        let posts = users.collection("posts");
        assert_eq!(posts.segments(), &["users", "posts"]);
        assert_eq!(posts.to_string(), "users/posts");
        assert!(CollectionRef::root().is_root());
    }

    #[test]
    fn doc_ref_display() {
        assert_eq!(CollectionRef::root().document("a").to_string(), "a");
        let doc = CollectionRef::root().collection("users").document("alice");
        assert_eq!(doc.to_string(), "users/alice");
        assert_eq!(doc.id(), "alice");
        assert_eq!(doc.collection().segments(), &["users"]);
    }

    #[test]
    fn root_display() {
        assert_eq!(CollectionRef::root().to_string(), "(root)");
    }
}

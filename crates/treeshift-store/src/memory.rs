//! In-memory document store
//!
//! Containers are keyed by [`CollectionRef`] in a [`DashMap`], so concurrent
//! writes to different containers do not contend. The whole store can be
//! exported as a nested [`Snapshot`] and persisted as JSON.

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use treeshift_core::{CollectionRef, DocRef, Fields, StoreError, TargetStore};

/// Contents of one container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Container-level field map
    pub fields: Fields,
    /// Documents by id, in write order
    pub documents: IndexMap<String, Fields>,
}

/// Nested export of a store
///
/// ```json
/// {"fields": {..}, "documents": {"id": {..}}, "collections": {"name": {..}}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub documents: IndexMap<String, Fields>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub collections: BTreeMap<String, Snapshot>,
}

impl Snapshot {
    fn descend(&mut self, collection: &CollectionRef) -> &mut Snapshot {
        collection
            .segments()
            .iter()
            .fold(self, |node, name| node.collections.entry(name.clone()).or_default())
    }

    fn flatten(self, at: CollectionRef, out: &mut Vec<(CollectionRef, Container)>) {
        out.push((
            at.clone(),
            Container {
                fields: self.fields,
                documents: self.documents,
            },
        ));
        for (name, child) in self.collections {
            child.flatten(at.collection(name), out);
        }
    }
}

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: DashMap<CollectionRef, Container>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document contents
    #[must_use]
    pub fn document(&self, doc: &DocRef) -> Option<Fields> {
        self.containers
            .get(doc.collection())
            .and_then(|c| c.documents.get(doc.id()).cloned())
    }

    /// Container-level fields (empty for unknown containers)
    #[must_use]
    pub fn fields(&self, collection: &CollectionRef) -> Fields {
        self.containers
            .get(collection)
            .map(|c| c.fields.clone())
            .unwrap_or_default()
    }

    /// Document ids of a container, in write order
    #[must_use]
    pub fn document_ids(&self, collection: &CollectionRef) -> Vec<String> {
        self.containers
            .get(collection)
            .map(|c| c.documents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every container that has been written to, sorted
    #[must_use]
    pub fn collections(&self) -> Vec<CollectionRef> {
        let mut refs: Vec<_> = self.containers.iter().map(|e| e.key().clone()).collect();
        refs.sort();
        refs
    }

    /// Total number of documents
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.containers.iter().map(|e| e.documents.len()).sum()
    }

    /// Whether nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers
            .iter()
            .all(|e| e.fields.is_empty() && e.documents.is_empty())
    }

    /// Nested export of the current contents
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut entries: Vec<_> = self
            .containers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut root = Snapshot::default();
        for (collection, container) in entries {
            let node = root.descend(&collection);
            node.fields = container.fields;
            node.documents = container.documents;
        }
        root
    }

    /// Build a store from a nested export
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut flat = Vec::new();
        snapshot.flatten(CollectionRef::root(), &mut flat);
        let containers = flat
            .into_iter()
            .filter(|(_, c)| !c.fields.is_empty() || !c.documents.is_empty())
            .collect();
        Self { containers }
    }

    /// Nested export as a JSON value
    ///
    /// # Errors
    /// Returns [`StoreError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(self.snapshot())?)
    }

    /// Load a store persisted with [`MemoryStore::save`]
    ///
    /// # Errors
    /// - [`StoreError::Io`] if the file cannot be read
    /// - [`StoreError::Serialization`] if it is not a valid export
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load a persisted store, or start empty if the file does not exist
    ///
    /// # Errors
    /// See [`MemoryStore::load`].
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        match Self::load(path.as_ref()).await {
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(file = %path.as_ref().display(), "no existing store, starting empty");
                Ok(Self::new())
            }
            other => other,
        }
    }

    /// Persist the store as pretty JSON
    ///
    /// Writes a sibling temporary file first and renames it over `path`.
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] or [`StoreError::Serialization`].
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::info!(file = %path.display(), documents = self.document_count(), "store saved");
        Ok(())
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
        self.containers
            .entry(doc.collection().clone())
            .or_default()
            .documents
            .insert(doc.id().to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError> {
        let mut container = self.containers.entry(collection.clone()).or_default();
        for (key, value) in fields {
            container.fields.insert(key, value);
        }
        Ok(())
    }
}

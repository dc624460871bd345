//! Testing utilities for treeshift workspace
//!
//! Shared fixtures plus instrumented source and target doubles.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use treeshift_core::{
    Classification, CollectionRef, DecisionMap, DocRef, Fields, Listing, SourceProvider,
    StoreError, TargetStore,
};
use treeshift_store::{JsonSource, MemoryStore};
use treeshift_tree::{Node, TreePath};

/// `{a: {x: 1, y: 2}, b: "hello"}`
pub fn scenario_tree() -> Value {
    json!({"a": {"x": 1, "y": 2}, "b": "hello"})
}

/// Decisions for [`scenario_tree`]: `a` as document, `b` as field
pub fn scenario_decisions() -> DecisionMap {
    decisions(&[("/a", Classification::Document), ("/b", Classification::Field)])
}

/// Users with nested posts and loose settings
pub fn users_tree() -> Value {
    json!({
        "users": {
            "alice": {"age": 30, "posts": {"p1": {"title": "hi"}}},
            "bob": {"age": 25}
        },
        "settings": {"theme": "dark", "beta": false},
        "version": 3,
        "cache": {"tmp": {"blob": "xxx"}}
    })
}

/// Chain `{"l1": {"l2": ... {"l<levels>": "leaf"}}}`
pub fn deep_chain(levels: usize) -> Value {
    (1..=levels)
        .rev()
        .fold(json!("leaf"), |inner, level| json!({ format!("l{level}"): inner }))
}

/// Path `/l1/l2/.../l<level>`
pub fn chain_path(level: usize) -> TreePath {
    (1..=level).fold(TreePath::root(), |path, l| path.child(format!("l{l}")))
}

/// Classify every level of [`deep_chain`] as collection, the leaf as field
pub fn chain_decisions(levels: usize) -> DecisionMap {
    let mut map = DecisionMap::new();
    for level in 1..levels {
        map.insert(&chain_path(level), Classification::Collection);
    }
    map.insert(&chain_path(levels), Classification::Field);
    map
}

/// Decision map from `(path, classification)` pairs
///
/// # Panics
/// Panics on a malformed path.
pub fn decisions(pairs: &[(&str, Classification)]) -> DecisionMap {
    pairs
        .iter()
        .map(|(path, choice)| (TreePath::parse(path).unwrap(), *choice))
        .collect()
}

/// Source over a JSON value
pub fn source(value: Value) -> JsonSource {
    JsonSource::from_node(Node::from(value))
}

/// Unwrap a JSON object into a field map
///
/// # Panics
/// Panics if `value` is not an object.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Source wrapper that counts reads
#[derive(Debug)]
pub struct CountingSource<S> {
    inner: S,
    child_reads: AtomicUsize,
    full_reads: AtomicUsize,
    limits: Mutex<Vec<Option<usize>>>,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            child_reads: AtomicUsize::new(0),
            full_reads: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
        }
    }

    /// Number of `read_children` calls
    pub fn child_reads(&self) -> usize {
        self.child_reads.load(Ordering::SeqCst)
    }

    /// Number of `read_all` calls
    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    /// Limits passed to `read_children`, in call order
    pub fn limits(&self) -> Vec<Option<usize>> {
        self.limits.lock().clone()
    }
}

#[async_trait]
impl<S: SourceProvider> SourceProvider for CountingSource<S> {
    async fn read_children(
        &self,
        path: &TreePath,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        self.child_reads.fetch_add(1, Ordering::SeqCst);
        self.limits.lock().push(limit);
        self.inner.read_children(path, limit).await
    }

    async fn read_all(&self, path: &TreePath) -> Result<Option<Node>, StoreError> {
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_all(path).await
    }
}

/// Source that fails reads at one path with a retryable error
#[derive(Debug)]
pub struct FailingSource<S> {
    inner: S,
    path: TreePath,
    failures: AtomicUsize,
}

impl<S> FailingSource<S> {
    /// Fail both shallow and full reads of `path`
    pub fn new(inner: S, path: TreePath) -> Self {
        Self {
            inner,
            path,
            failures: AtomicUsize::new(0),
        }
    }

    /// Number of failed reads
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, path: &TreePath) -> Result<(), StoreError> {
        if *path == self.path {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!("read of '{path}'")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: SourceProvider> SourceProvider for FailingSource<S> {
    async fn read_children(
        &self,
        path: &TreePath,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        self.check(path)?;
        self.inner.read_children(path, limit).await
    }

    async fn read_all(&self, path: &TreePath) -> Result<Option<Node>, StoreError> {
        self.check(path)?;
        self.inner.read_all(path).await
    }
}

/// Memory store that rejects writes to chosen documents and containers
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    documents: Vec<DocRef>,
    containers: Vec<CollectionRef>,
    transient: bool,
    rejected: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `set` on `doc`
    #[must_use]
    pub fn failing_document(mut self, doc: DocRef) -> Self {
        self.documents.push(doc);
        self
    }

    /// Reject `update` on `container`
    #[must_use]
    pub fn failing_container(mut self, container: CollectionRef) -> Self {
        self.containers.push(container);
        self
    }

    /// Fail with a retryable error instead of a permission error
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Store holding the accepted writes
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Number of rejected writes
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    fn reject(&self, target: String) -> StoreError {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        if self.transient {
            StoreError::Unavailable(target)
        } else {
            StoreError::PermissionDenied(target)
        }
    }
}

#[async_trait]
impl TargetStore for FailingStore {
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
        if self.documents.contains(doc) {
            return Err(self.reject(doc.to_string()));
        }
        self.inner.set(doc, fields).await
    }

    async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError> {
        if self.containers.contains(collection) {
            return Err(self.reject(collection.to_string()));
        }
        self.inner.update(collection, fields).await
    }
}

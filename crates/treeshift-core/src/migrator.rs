//! Guided migrator
//!
//! Replays a full source tree into a [`TargetStore`] following a
//! [`DecisionMap`]:
//!
//! - `skip`: nothing under the path is written
//! - `collection`: recurse into `container.collection(key)`
//! - `document`: `container.document(key).set(value)`
//! - `field`: `container.update({key: value})`
//!
//! # Ordering
//!
//! Entries are planned in natural order. With `concurrency = 1` every write
//! is awaited before the next one starts. With higher concurrency, document
//! writes and collection recursions of one level run side by side while the
//! level's field merges, which all target the same container, stay on one
//! sequential job.
//!
//! # Partial runs
//!
//! There is no transaction around a run. When a run fails or is cancelled,
//! writes that were acknowledged stay in the target; the error names the path
//! that failed so the run can be resumed from there with
//! [`Migrator::migrate`].

use crate::config::{MigrationConfig, MismatchPolicy, MissingPolicy};
use crate::decision::{Classification, DecisionMap};
use crate::error::MigrationError;
use crate::sampler::with_timeout;
use crate::source::SourceProvider;
use crate::target::{CollectionRef, DocRef, Fields, TargetStore};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use treeshift_tree::{Node, TreePath};

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Documents replaced
    pub documents_written: usize,
    /// Fields merged into containers
    pub fields_merged: usize,
    /// Collections recursed into
    pub collections_entered: usize,
    /// Paths classified `skip`
    pub paths_skipped: usize,
    /// Paths without a classification, skipped under [`MissingPolicy::Skip`]
    pub unclassified: Vec<String>,
    /// Paths whose classification did not fit, skipped under [`MismatchPolicy::Skip`]
    pub mismatched: Vec<String>,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

impl MigrationReport {
    /// Total acknowledged writes
    #[inline]
    #[must_use]
    pub fn writes(&self) -> usize {
        self.documents_written + self.fields_merged
    }
}

/// Counters shared by the jobs of one run
#[derive(Debug, Default)]
struct Tally {
    documents: AtomicUsize,
    fields: AtomicUsize,
    collections: AtomicUsize,
    skipped: AtomicUsize,
    unclassified: Mutex<Vec<String>>,
    mismatched: Mutex<Vec<String>>,
}

impl Tally {
    fn into_report(self, started: Instant) -> MigrationReport {
        MigrationReport {
            documents_written: self.documents.into_inner(),
            fields_merged: self.fields.into_inner(),
            collections_entered: self.collections.into_inner(),
            paths_skipped: self.skipped.into_inner(),
            unclassified: self.unclassified.into_inner(),
            mismatched: self.mismatched.into_inner(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Borrowed state of one run
struct Run<'a, T: ?Sized> {
    target: &'a T,
    decisions: &'a DecisionMap,
    tally: Tally,
}

/// Field merge planned for a container
#[derive(Debug)]
struct FieldWrite {
    path: TreePath,
    key: String,
    value: Value,
}

/// Unit of work planned for one level
#[derive(Debug)]
enum Job {
    /// Field merges into the level's container, applied in order
    Merge(Vec<FieldWrite>),
    /// Document replacement
    Document {
        doc: DocRef,
        path: TreePath,
        fields: Fields,
    },
    /// Recursion into a sub-collection
    Collection {
        collection: CollectionRef,
        path: TreePath,
        node: Node,
    },
    /// Failure reported once earlier jobs have run
    Fail(MigrationError),
}

/// Guided migrator
#[derive(Debug, Clone, Copy, Default)]
pub struct Migrator {
    config: MigrationConfig,
}

impl Migrator {
    /// Create migrator with configuration
    #[inline]
    #[must_use]
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrate the whole source into the target root
    ///
    /// # Errors
    /// See [`Migrator::migrate`].
    pub async fn run<S, T>(
        &self,
        source: &S,
        target: &T,
        decisions: &DecisionMap,
    ) -> Result<MigrationReport, MigrationError>
    where
        S: SourceProvider + ?Sized,
        T: TargetStore + ?Sized,
    {
        self.migrate(source, target, CollectionRef::root(), decisions, TreePath::root())
            .await
    }

    /// Migrate the children of the source node at `path` into `container`
    ///
    /// The subtree is read once, in full, from the source; the structure
    /// summary is never consulted.
    ///
    /// # Errors
    /// - [`MigrationError::StoreIo`] if the read or a write fails
    /// - [`MigrationError::TypeClassification`] under [`MismatchPolicy::Abort`]
    /// - [`MigrationError::MissingClassification`] under [`MissingPolicy::Fail`]
    /// - [`MigrationError::DepthExceeded`] past the configured depth
    pub async fn migrate<S, T>(
        &self,
        source: &S,
        target: &T,
        container: CollectionRef,
        decisions: &DecisionMap,
        path: TreePath,
    ) -> Result<MigrationReport, MigrationError>
    where
        S: SourceProvider + ?Sized,
        T: TargetStore + ?Sized,
    {
        let node = with_timeout(self.config.io_timeout(), source.read_all(&path))
            .await
            .map_err(|e| MigrationError::store_io(path.clone(), None, e))?;
        let Some(node) = node else {
            tracing::warn!(path = %path, "nothing stored at source path");
            return Ok(MigrationReport::default());
        };
        self.migrate_tree(node, target, container, decisions, path)
            .await
    }

    /// Migrate an in-memory tree whose root sits at `path`
    ///
    /// # Errors
    /// See [`Migrator::migrate`].
    pub async fn migrate_tree<T>(
        &self,
        node: Node,
        target: &T,
        container: CollectionRef,
        decisions: &DecisionMap,
        path: TreePath,
    ) -> Result<MigrationReport, MigrationError>
    where
        T: TargetStore + ?Sized,
    {
        let started = Instant::now();
        tracing::info!(
            path = %path,
            container = %container,
            decisions = decisions.len(),
            concurrency = self.config.concurrency,
            "Starting migration"
        );

        let run = Run {
            target,
            decisions,
            tally: Tally::default(),
        };
        let depth = path.len();
        let outcome = self.migrate_level(&run, container, path, node, depth).await;
        let report = run.tally.into_report(started);

        match outcome {
            Ok(()) => {
                tracing::info!(
                    documents = report.documents_written,
                    fields = report.fields_merged,
                    collections = report.collections_entered,
                    skipped = report.paths_skipped,
                    elapsed_ms = report.elapsed_ms,
                    "Migration completed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    writes_applied = report.writes(),
                    "migration stopped; applied writes were not rolled back"
                );
                Err(e)
            }
        }
    }

    fn migrate_level<'a, T>(
        &'a self,
        run: &'a Run<'a, T>,
        container: CollectionRef,
        path: TreePath,
        node: Node,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), MigrationError>>
    where
        T: TargetStore + ?Sized,
    {
        async move {
            if depth > self.config.max_depth {
                return Err(MigrationError::DepthExceeded {
                    path,
                    max_depth: self.config.max_depth,
                });
            }
            if !node.is_branch() {
                tracing::debug!(path = %path, "source node has no entries");
                return Ok(());
            }

            let jobs = self.plan(run, &container, &path, node);
            stream::iter(jobs)
                .map(|job| self.execute(run, &container, job, depth))
                .buffered(self.config.concurrency.max(1))
                .try_collect::<Vec<()>>()
                .await?;
            Ok(())
        }
        .boxed()
    }

    /// Turn the entries of one level into jobs, in natural order
    ///
    /// Planning stops at the first failing entry so no later sibling is
    /// written, even when fields are batched into an earlier merge.
    fn plan<T: ?Sized>(
        &self,
        run: &Run<'_, T>,
        container: &CollectionRef,
        path: &TreePath,
        node: Node,
    ) -> Vec<Job> {
        let sequential = self.config.concurrency <= 1;
        let mut jobs = Vec::new();
        let mut merge_slot: Option<usize> = None;

        for (key, value) in node.into_entries() {
            let child = path.child(key.as_str());
            let Some(choice) = run.decisions.get(&child) else {
                match self.config.on_missing {
                    MissingPolicy::Skip => {
                        tracing::warn!(path = %child, "no classification for path; skipping");
                        run.tally.unclassified.lock().push(child.render());
                    }
                    MissingPolicy::Fail => {
                        jobs.push(Job::Fail(MigrationError::MissingClassification { path: child }));
                        break;
                    }
                }
                continue;
            };

            match choice {
                Classification::Skip => {
                    tracing::debug!(path = %child, "skip");
                    run.tally.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Classification::Collection if value.is_branch() => jobs.push(Job::Collection {
                    collection: container.collection(key),
                    path: child,
                    node: value,
                }),
                Classification::Document if matches!(value, Node::Object(_)) => {
                    if let Some(fields) = value.into_fields() {
                        jobs.push(Job::Document {
                            doc: container.document(key),
                            path: child,
                            fields,
                        });
                    }
                }
                Classification::Collection | Classification::Document => {
                    if let Some(job) = self.mismatch(run, child, choice, &value) {
                        jobs.push(job);
                        break;
                    }
                }
                Classification::Field => {
                    let write = FieldWrite {
                        path: child,
                        key,
                        value: value.into_value(),
                    };
                    match merge_slot {
                        Some(slot) if !sequential => {
                            if let Job::Merge(writes) = &mut jobs[slot] {
                                writes.push(write);
                            }
                        }
                        _ => {
                            merge_slot = Some(jobs.len());
                            jobs.push(Job::Merge(vec![write]));
                        }
                    }
                }
            }
        }
        jobs
    }

    fn mismatch<T: ?Sized>(
        &self,
        run: &Run<'_, T>,
        path: TreePath,
        classification: Classification,
        value: &Node,
    ) -> Option<Job> {
        let found = value.type_name();
        match self.config.on_mismatch {
            MismatchPolicy::Abort => Some(Job::Fail(MigrationError::TypeClassification {
                path,
                classification,
                found,
            })),
            MismatchPolicy::Skip => {
                tracing::warn!(
                    path = %path,
                    classification = %classification,
                    found,
                    "classification does not fit value; skipping"
                );
                run.tally.mismatched.lock().push(path.render());
                None
            }
        }
    }

    fn execute<'a, T>(
        &'a self,
        run: &'a Run<'a, T>,
        container: &CollectionRef,
        job: Job,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), MigrationError>>
    where
        T: TargetStore + ?Sized,
    {
        let container = container.clone();
        async move {
            match job {
                Job::Fail(err) => Err(err),
                Job::Merge(writes) => {
                    for write in writes {
                        let mut fields = Fields::new();
                        fields.insert(write.key, write.value);
                        with_timeout(
                            self.config.io_timeout(),
                            run.target.update(&container, fields),
                        )
                        .await
                        .map_err(|e| {
                            MigrationError::store_io(write.path.clone(), Some(Classification::Field), e)
                        })?;
                        run.tally.fields.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(path = %write.path, container = %container, "field merged");
                    }
                    Ok(())
                }
                Job::Document { doc, path, fields } => {
                    with_timeout(self.config.io_timeout(), run.target.set(&doc, fields))
                        .await
                        .map_err(|e| {
                            MigrationError::store_io(path.clone(), Some(Classification::Document), e)
                        })?;
                    run.tally.documents.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %path, doc = %doc, "document written");
                    Ok(())
                }
                Job::Collection {
                    collection,
                    path,
                    node,
                } => {
                    run.tally.collections.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %path, collection = %collection, "entering collection");
                    self.migrate_level(run, collection, path, node, depth + 1)
                        .await
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Minimal target that logs writes as strings
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    #[async_trait]
    impl TargetStore for Log {
        async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
            self.0
                .lock()
                .push(format!("set {doc} {}", Value::Object(fields)));
            Ok(())
        }

        async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError> {
            self.0
                .lock()
                .push(format!("update {collection} {}", Value::Object(fields)));
            Ok(())
        }
    }

    fn decisions(pairs: &[(&str, Classification)]) -> DecisionMap {
        pairs
            .iter()
            .map(|(p, c)| (TreePath::parse(p).unwrap(), *c))
            .collect()
    }

    async fn run_tree(
        migrator: Migrator,
        tree: Value,
        map: &DecisionMap,
    ) -> (Result<MigrationReport, MigrationError>, Vec<String>) {
        let log = Log::default();
        let result = migrator
            .migrate_tree(Node::from(tree), &log, CollectionRef::root(), map, TreePath::root())
            .await;
        (result, log.0.into_inner())
    }

    #[tokio::test]
    async fn writes_follow_source_order() {
        let map = decisions(&[
            ("/b", Classification::Field),
            ("/a", Classification::Document),
            ("/c", Classification::Field),
        ]);
        let (result, log) =
            run_tree(Migrator::default(), json!({"b": 1, "a": {"x": 1}, "c": 2}), &map).await;
        result.unwrap();
        assert_eq!(
            log,
            vec![
                "update (root) {\"b\":1}",
                "set a {\"x\":1}",
                "update (root) {\"c\":2}",
            ]
        );
    }

    #[tokio::test]
    async fn mismatch_fails_after_earlier_siblings() {
        let map = decisions(&[
            ("/a", Classification::Field),
            ("/b", Classification::Collection),
            ("/c", Classification::Field),
        ]);
        let (result, log) =
            run_tree(Migrator::default(), json!({"a": 1, "b": "scalar", "c": 3}), &map).await;
        let err = result.unwrap_err();
        assert!(matches!(
            &err,
            MigrationError::TypeClassification { path, found: "string", .. }
                if path.render() == "/b"
        ));
        assert_eq!(log, vec!["update (root) {\"a\":1}"]);
    }

    #[tokio::test]
    async fn document_on_array_is_mismatch() {
        let config = MigrationConfig::new().with_mismatch_policy(MismatchPolicy::Skip);
        let map = decisions(&[("/list", Classification::Document)]);
        let (result, log) = run_tree(Migrator::new(config), json!({"list": [1, 2]}), &map).await;
        let report = result.unwrap();
        assert_eq!(report.mismatched, vec!["/list"]);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn concurrent_plan_groups_fields() {
        let config = MigrationConfig::new().with_concurrency(4);
        let map = decisions(&[
            ("/a", Classification::Field),
            ("/b", Classification::Field),
            ("/c", Classification::Field),
        ]);
        let (result, log) = run_tree(Migrator::new(config), json!({"a": 1, "b": 2, "c": 3}), &map).await;
        assert_eq!(result.unwrap().fields_merged, 3);
        assert_eq!(
            log,
            vec![
                "update (root) {\"a\":1}",
                "update (root) {\"b\":2}",
                "update (root) {\"c\":3}",
            ]
        );
    }

    #[tokio::test]
    async fn depth_guard() {
        let config = MigrationConfig::new().with_max_depth(1);
        let map = decisions(&[
            ("/a", Classification::Collection),
            ("/a/b", Classification::Collection),
            ("/a/b/c", Classification::Field),
        ]);
        let (result, _) = run_tree(Migrator::new(config), json!({"a": {"b": {"c": 1}}}), &map).await;
        assert!(matches!(
            result,
            Err(MigrationError::DepthExceeded { max_depth: 1, ref path }) if path.render() == "/a/b"
        ));
    }

    #[test]
    fn report_counts_writes() {
        let report = MigrationReport {
            documents_written: 2,
            fields_merged: 3,
            ..MigrationReport::default()
        };
        assert_eq!(report.writes(), 5);
    }
}

//! Tree sampler
//!
//! Builds a [`Summary`] by visiting at most `limit` children per object, the
//! first ones in natural order, down to `max_depth` levels. Against a
//! [`SourceProvider`] every visited node costs exactly one bounded
//! `read_children` call; subtrees are never fetched whole.

use crate::config::SamplerConfig;
use crate::error::{MigrationError, StoreError};
use crate::source::{Listing, SourceProvider};
use crate::summary::Summary;
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use std::future::Future;
use std::time::Duration;
use treeshift_tree::{Node, TreePath};

/// Structure sampler
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    /// Create sampler with configuration
    #[inline]
    #[must_use]
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample the whole source from its root
    ///
    /// # Errors
    /// Returns [`MigrationError::StoreIo`] with the path of the failed read.
    /// Nothing has been written when sampling fails.
    pub async fn sample<S>(&self, source: &S) -> Result<Summary, MigrationError>
    where
        S: SourceProvider + ?Sized,
    {
        tracing::info!(
            limit = self.config.limit,
            max_depth = self.config.max_depth,
            "Analyzing data structure"
        );
        self.sample_at(source, TreePath::root(), 0).await
    }

    /// Sample the subtree at `path`, treating it as depth `depth`
    ///
    /// # Errors
    /// Returns [`MigrationError::StoreIo`] with the path of the failed read.
    pub fn sample_at<'a, S>(
        &'a self,
        source: &'a S,
        path: TreePath,
        depth: usize,
    ) -> BoxFuture<'a, Result<Summary, MigrationError>>
    where
        S: SourceProvider + ?Sized,
    {
        async move {
            if depth > self.config.max_depth {
                return Ok(Summary::MaxDepth);
            }

            let listing = with_timeout(
                self.config.io_timeout(),
                source.read_children(&path, Some(self.config.limit)),
            )
            .await
            .map_err(|e| MigrationError::store_io(path.clone(), None, e))?;

            match listing {
                Listing::Absent => Ok(Summary::Null),
                Listing::Leaf(scalar) => Ok(scalar.kind().map_or(Summary::Null, Summary::Leaf)),
                Listing::Branch(keys) => {
                    let mut children = IndexMap::with_capacity(keys.len().min(self.config.limit));
                    // Providers are asked for `limit` keys; trim anyway
                    for key in keys.into_iter().take(self.config.limit) {
                        let child = self.sample_at(source, path.child(key.as_str()), depth + 1).await?;
                        children.insert(key, child);
                    }
                    tracing::debug!(path = %path, children = children.len(), "sampled branch");
                    Ok(Summary::Branch(children))
                }
            }
        }
        .boxed()
    }

    /// Sample an in-memory tree without I/O
    ///
    /// Produces the same summary as [`Sampler::sample`] over a provider that
    /// serves `node`.
    #[must_use]
    pub fn sample_node(&self, node: &Node) -> Summary {
        self.sample_node_at(Some(node), 0)
    }

    fn sample_node_at(&self, node: Option<&Node>, depth: usize) -> Summary {
        if depth > self.config.max_depth {
            return Summary::MaxDepth;
        }
        match Listing::of(node, Some(self.config.limit)) {
            Listing::Absent => Summary::Null,
            Listing::Leaf(scalar) => scalar.kind().map_or(Summary::Null, Summary::Leaf),
            Listing::Branch(keys) => {
                let Some(node) = node else {
                    return Summary::Null;
                };
                Summary::Branch(
                    keys.into_iter()
                        .map(|key| {
                            let child = self.sample_node_at(node.get(&key), depth + 1);
                            (key, child)
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Run a store operation under an optional timeout
///
/// An elapsed timeout becomes [`StoreError::Timeout`], which is retryable.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| StoreError::Timeout(limit))?,
        None => op.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use treeshift_tree::ScalarKind;

    fn summary_json(sampler: &Sampler, value: serde_json::Value) -> serde_json::Value {
        sampler.sample_node(&Node::from(value)).to_value()
    }

    #[test]
    fn scenario_shape() {
        let sampler = Sampler::default();
        assert_eq!(
            summary_json(&sampler, json!({"a": {"x": 1, "y": 2}, "b": "hello"})),
            json!({"a": {"x": "number", "y": "number"}, "b": "string"})
        );
    }

    #[test]
    fn keeps_first_entries_in_order() {
        let sampler = Sampler::new(SamplerConfig::new().with_limit(2));
        assert_eq!(
            summary_json(&sampler, json!({"k3": 1, "k1": true, "k2": "s", "k0": null})),
            json!({"k3": "number", "k1": "boolean"})
        );
    }

    #[test]
    fn null_and_scalar_roots() {
        let sampler = Sampler::default();
        assert_eq!(sampler.sample_node(&Node::null()), Summary::Null);
        assert_eq!(
            sampler.sample_node(&Node::from(json!(false))),
            Summary::Leaf(ScalarKind::Boolean)
        );
    }

    #[test]
    fn depth_marker_past_limit() {
        let sampler = Sampler::new(SamplerConfig::new().with_max_depth(1));
        assert_eq!(
            summary_json(&sampler, json!({"a": {"b": {"c": 1}}})),
            json!({"a": {"b": "Max depth reached"}})
        );
    }

    #[test]
    fn arrays_sample_by_index() {
        let sampler = Sampler::default();
        assert_eq!(
            summary_json(&sampler, json!({"tags": ["x", 1, true, "y"]})),
            json!({"tags": {"0": "string", "1": "number", "2": "boolean"}})
        );
    }

    #[test]
    fn empty_object_is_empty_branch() {
        let sampler = Sampler::default();
        assert_eq!(summary_json(&sampler, json!({"a": {}})), json!({"a": {}}));
    }

    #[tokio::test]
    async fn timeout_maps_to_retryable_store_error() {
        let result: Result<(), StoreError> = with_timeout(
            Some(Duration::from_millis(5)),
            futures::future::pending::<Result<(), StoreError>>(),
        )
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert!(result.unwrap_err().is_retryable());
    }
}

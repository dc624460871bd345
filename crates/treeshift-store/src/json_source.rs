//! JSON document source

use async_trait::async_trait;
use std::path::Path;
use treeshift_core::{Listing, MigrationError, SourceProvider, StoreError};
use treeshift_tree::{Node, TreePath};

/// A parsed JSON document served as a source tree
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSource {
    root: Node,
}

impl JsonSource {
    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns [`MigrationError::MalformedInput`] if the input is not JSON.
    pub fn parse(input: &str) -> Result<Self, MigrationError> {
        Node::from_json(input)
            .map(Self::from_node)
            .map_err(|e| MigrationError::malformed(format!("source is not valid JSON: {e}")))
    }

    /// Serve an already parsed tree
    #[inline]
    #[must_use]
    pub fn from_node(root: Node) -> Self {
        Self { root }
    }

    /// Read and parse a JSON file
    ///
    /// # Errors
    /// - [`MigrationError::StoreIo`] at the root path if the file cannot be read
    /// - [`MigrationError::MalformedInput`] if it is not JSON
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MigrationError::store_io(TreePath::root(), None, StoreError::Io(e)))?;
        tracing::debug!(file = %path.display(), bytes = bytes.len(), "source loaded");
        Node::from_slice(&bytes).map(Self::from_node).map_err(|e| {
            MigrationError::malformed(format!("{} is not valid JSON: {e}", path.display()))
        })
    }

    /// Root of the served tree
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }
}

#[async_trait]
impl SourceProvider for JsonSource {
    async fn read_children(
        &self,
        path: &TreePath,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        Ok(Listing::of(self.root.at(path), limit))
    }

    async fn read_all(&self, path: &TreePath) -> Result<Option<Node>, StoreError> {
        Ok(self.root.at(path).filter(|node| !node.is_null()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use treeshift_tree::Scalar;

    #[test]
    fn rejects_malformed_json() {
        let err = JsonSource::parse("{not json").unwrap_err();
        assert!(matches!(err, MigrationError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn listing_is_bounded() {
        let source = JsonSource::parse(r#"{"a": {"x": 1, "y": 2, "z": 3}, "b": "s"}"#).unwrap();
        let listing = source
            .read_children(&TreePath::single("a"), Some(2))
            .await
            .unwrap();
        assert_eq!(listing, Listing::Branch(vec!["x".into(), "y".into()]));

        let leaf = source
            .read_children(&TreePath::single("b"), Some(2))
            .await
            .unwrap();
        assert_eq!(leaf, Listing::Leaf(Scalar::String("s".into())));

        let missing = source
            .read_children(&TreePath::single("nope"), None)
            .await
            .unwrap();
        assert_eq!(missing, Listing::Absent);
    }

    #[tokio::test]
    async fn read_all_returns_subtree() {
        let source = JsonSource::from_node(Node::from(json!({"a": {"x": [1, 2]}, "n": null})));
        let sub = source.read_all(&TreePath::single("a")).await.unwrap();
        assert_eq!(sub.map(Node::into_value), Some(json!({"x": [1, 2]})));
        assert_eq!(source.read_all(&TreePath::single("n")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.json");
        std::fs::write(&file, r#"{"k": true}"#).unwrap();
        let source = JsonSource::load(&file).await.unwrap();
        assert_eq!(source.root().to_value(), json!({"k": true}));

        let err = JsonSource::load(dir.path().join("missing.json")).await.unwrap_err();
        assert!(matches!(err, MigrationError::StoreIo { .. }));
    }
}

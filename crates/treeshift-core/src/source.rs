//! Source providers
//!
//! A [`SourceProvider`] reads the hierarchical tree being migrated. Live
//! stores answer bounded listings with one paginated read; in-memory
//! documents answer by slicing.

use crate::error::StoreError;
use async_trait::async_trait;
use treeshift_tree::{Node, Scalar, TreePath};

/// Shallow view of one node, returned by [`SourceProvider::read_children`]
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Nothing stored at the path
    Absent,
    /// Leaf value
    Leaf(Scalar),
    /// Child keys in natural order, truncated to the requested limit
    Branch(Vec<String>),
}

impl Listing {
    /// Shallow listing of an in-memory node
    #[must_use]
    pub fn of(node: Option<&Node>, limit: Option<usize>) -> Self {
        match node {
            None | Some(Node::Scalar(Scalar::Null)) => Self::Absent,
            Some(Node::Scalar(scalar)) => Self::Leaf(scalar.clone()),
            Some(branch) => Self::Branch(
                branch
                    .entries()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|(key, _)| key.into_owned())
                    .collect(),
            ),
        }
    }
}

/// Read access to a source tree
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Shallow read of the node at `path`
    ///
    /// With `Some(limit)` a branch lists at most `limit` keys, the first ones
    /// in natural order. Implementations must not fetch the subtree.
    async fn read_children(
        &self,
        path: &TreePath,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError>;

    /// Full, unsampled read of the subtree at `path`
    async fn read_all(&self, path: &TreePath) -> Result<Option<Node>, StoreError>;
}

#[async_trait]
impl<S: SourceProvider + ?Sized> SourceProvider for std::sync::Arc<S> {
    async fn read_children(
        &self,
        path: &TreePath,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        (**self).read_children(path, limit).await
    }

    async fn read_all(&self, path: &TreePath) -> Result<Option<Node>, StoreError> {
        (**self).read_all(path).await
    }
}

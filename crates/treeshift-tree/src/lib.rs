//! treeshift tree model
//!
//! Untyped hierarchical data as read from a key-value store or a JSON upload.
//!
//! # Core Concepts
//!
//! - [`Node`]: tagged source tree node (scalar, object, or array)
//! - [`ScalarKind`]: type tag reported in place of leaf values
//! - [`TreePath`]: canonical `/a/b/c` path, the join key between the sampler,
//!   the decision map and the migrator
//!
//! # Example
//!
//! ```rust
//! use treeshift_tree::{Node, TreePath};
//!
//! let tree = Node::from_json(r#"{"users": {"alice": {"age": 30}}}"#).unwrap();
//! let path = TreePath::root().child("users").child("alice");
//! assert_eq!(path.render(), "/users/alice");
//! assert!(tree.at(&path).unwrap().is_branch());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod node;
mod path;

pub use node::{Entries, Node, Scalar, ScalarKind};
pub use path::{escape_key, unescape_key, PathError, TreePath, SEPARATOR};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

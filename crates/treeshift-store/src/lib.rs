//! treeshift stores
//!
//! Concrete ends of a migration:
//! - [`JsonSource`]: a JSON document served as a source tree
//! - [`MemoryStore`]: a document store kept in memory, persisted as JSON
//! - [`RecordingStore`]: a target that only records writes (dry runs)

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod json_source;
mod memory;
mod recording;

pub use json_source::JsonSource;
pub use memory::{Container, MemoryStore, Snapshot};
pub use recording::{RecordingStore, WriteOp};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

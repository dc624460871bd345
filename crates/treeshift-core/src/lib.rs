//! treeshift core - structure discovery and guided migration
//!
//! Moves hierarchical key-value data into a document store in two steps:
//! - Samples a bounded structure summary of the source tree
//! - Lets an operator classify every sampled path
//! - Replays the full source into the target following those decisions
//!
//! # Example
//!
//! ```rust,ignore
//! use treeshift_core::prelude::*;
//!
//! # async fn example(source: &dyn SourceProvider, target: &dyn TargetStore)
//! #     -> Result<(), MigrationError> {
//! let summary = Sampler::default().sample(source).await?;
//! println!("{}", serde_json::to_string_pretty(&summary).unwrap());
//!
//! let decisions = DecisionMap::from_json(r#"{"/users": "collection"}"#)?;
//! let report = Migrator::default().run(source, target, &decisions).await?;
//! println!("wrote {} documents", report.documents_written);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod decision;
pub mod error;
pub mod migrator;
pub mod sampler;
pub mod source;
pub mod summary;
pub mod target;

pub use config::{
    Config, MigrationConfig, MismatchPolicy, MissingPolicy, SamplerConfig,
    DEFAULT_MIGRATION_DEPTH, DEFAULT_SAMPLE_DEPTH, DEFAULT_SAMPLE_LIMIT,
};
pub use decision::{
    offered_choices, ChoicePrompt, Classification, Classifier, DecisionMap, PromptError,
};
pub use error::{ConfigError, MigrationError, StoreError};
pub use migrator::{MigrationReport, Migrator};
pub use sampler::Sampler;
pub use source::{Listing, SourceProvider};
pub use summary::{Summary, MAX_DEPTH_MARKER};
pub use target::{CollectionRef, DocRef, Fields, TargetStore};
pub use treeshift_tree::{Node, ScalarKind, TreePath};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with treeshift core
    pub use crate::{
        Classification, Classifier, CollectionRef, DecisionMap, DocRef, MigrationConfig,
        MigrationError, MigrationReport, Migrator, Node, Sampler, SamplerConfig, SourceProvider,
        Summary, TargetStore, TreePath,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Path decision maps
//!
//! A [`DecisionMap`] assigns a [`Classification`] to canonical tree paths. It
//! is built once, before migration starts, either programmatically or with a
//! [`Classifier`] that walks a [`Summary`] and asks a [`ChoicePrompt`].

use crate::error::MigrationError;
use crate::summary::Summary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use treeshift_tree::TreePath;

/// How a source path is replayed into the target store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Object becomes a collection; children are classified one level down
    Collection,
    /// Value replaces the document named after the key
    Document,
    /// Key/value is merged into the enclosing container
    Field,
    /// Nothing under the path is written
    Skip,
}

impl Classification {
    /// Every classification, in prompt order
    pub const ALL: [Classification; 4] = [
        Self::Collection,
        Self::Document,
        Self::Field,
        Self::Skip,
    ];

    /// Lowercase wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Document => "document",
            Self::Field => "field",
            Self::Skip => "skip",
        }
    }

    /// Capitalised name for prompts
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Collection => "Collection",
            Self::Document => "Document",
            Self::Field => "Field",
            Self::Skip => "Skip",
        }
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| MigrationError::malformed(format!("unknown classification '{s}'")))
    }
}

/// Choices offered for a summarized node
///
/// Objects may become collections, documents, or be skipped; everything else
/// is offered as a field. The migrator accepts any classification at any
/// path regardless of what was offered.
#[must_use]
pub fn offered_choices(summary: &Summary) -> &'static [Classification] {
    const BRANCH: &[Classification] = &[
        Classification::Collection,
        Classification::Document,
        Classification::Skip,
    ];
    const LEAF: &[Classification] = &[Classification::Field];
    match summary {
        Summary::Branch(_) => BRANCH,
        Summary::MaxDepth => &Classification::ALL,
        Summary::Leaf(_) | Summary::Null => LEAF,
    }
}

/// Mapping from canonical path to classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionMap(BTreeMap<String, Classification>);

impl DecisionMap {
    /// Create empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `path → choice` pairs as submitted by a form or file
    ///
    /// Empty choices are treated as unanswered and dropped.
    ///
    /// # Errors
    /// Returns [`MigrationError::MalformedInput`] for a path that is not
    /// canonical or a choice that is not a classification.
    pub fn from_raw<I, K, V>(pairs: I) -> Result<Self, MigrationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (path, choice) in pairs {
            let choice = choice.as_ref().trim();
            if choice.is_empty() {
                continue;
            }
            let path = TreePath::parse(path.as_ref())
                .map_err(|e| MigrationError::malformed(format!("decision map: {e}")))?;
            map.insert(&path, choice.parse()?);
        }
        Ok(map)
    }

    /// Parse a JSON object of `path → choice`
    ///
    /// # Errors
    /// Returns [`MigrationError::MalformedInput`] for invalid JSON or entries.
    pub fn from_json(input: &str) -> Result<Self, MigrationError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(input)
            .map_err(|e| MigrationError::malformed(format!("decision map: {e}")))?;
        Self::from_raw(raw)
    }

    /// Parse a YAML mapping of `path → choice`
    ///
    /// # Errors
    /// Returns [`MigrationError::MalformedInput`] for invalid YAML or entries.
    pub fn from_yaml(input: &str) -> Result<Self, MigrationError> {
        let raw: BTreeMap<String, String> = serde_yaml::from_str(input)
            .map_err(|e| MigrationError::malformed(format!("decision map: {e}")))?;
        Self::from_raw(raw)
    }

    /// Pretty JSON, keys sorted
    ///
    /// # Errors
    /// Propagates `serde_json` serialization errors.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Set the classification for `path`
    pub fn insert(&mut self, path: &TreePath, choice: Classification) -> Option<Classification> {
        self.0.insert(path.render(), choice)
    }

    /// Builder form of [`DecisionMap::insert`]
    #[must_use]
    pub fn with(mut self, path: &TreePath, choice: Classification) -> Self {
        self.insert(path, choice);
        self
    }

    /// Classification for `path`
    #[inline]
    #[must_use]
    pub fn get(&self, path: &TreePath) -> Option<Classification> {
        self.0.get(&path.render()).copied()
    }

    /// Number of classified paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no path is classified
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Classification)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Entries that address no node of `summary`
    ///
    /// These are legal (the summary is only a sample) but usually typos.
    #[must_use]
    pub fn unknown_paths(&self, summary: &Summary) -> Vec<&str> {
        self.0
            .keys()
            .filter(|raw| {
                TreePath::parse(raw)
                    .map(|path| !summary.contains(&path))
                    .unwrap_or(true)
            })
            .map(String::as_str)
            .collect()
    }
}

impl FromIterator<(TreePath, Classification)> for DecisionMap {
    fn from_iter<I: IntoIterator<Item = (TreePath, Classification)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, c)| (p.render(), c)).collect())
    }
}

/// Prompt errors
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Operator cancelled
    #[error("classification aborted by operator")]
    Aborted,

    /// Terminal or scripted prompt failed
    #[error("prompt failed: {0}")]
    Failed(String),
}

/// Source of classification answers
pub trait ChoicePrompt {
    /// Pick one of `options` for the node at `path`
    ///
    /// # Errors
    /// Returns [`PromptError`] when no answer can be obtained.
    fn choose(
        &mut self,
        path: &TreePath,
        summary: &Summary,
        options: &[Classification],
    ) -> Result<Classification, PromptError>;
}

/// Builds a decision map by walking a summary
///
/// Children are only visited below nodes classified as collections; the
/// other classifications consume their whole subtree. Nodes with a single
/// offered choice are assigned without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    /// Create classifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify every reachable path of `summary`
    ///
    /// # Errors
    /// Propagates the first [`PromptError`].
    pub fn classify<P>(&self, summary: &Summary, prompt: &mut P) -> Result<DecisionMap, PromptError>
    where
        P: ChoicePrompt + ?Sized,
    {
        let mut map = DecisionMap::new();
        self.visit(summary, &TreePath::root(), prompt, &mut map)?;
        tracing::info!(decisions = map.len(), "classification complete");
        Ok(map)
    }

    fn visit<P>(
        &self,
        summary: &Summary,
        at: &TreePath,
        prompt: &mut P,
        map: &mut DecisionMap,
    ) -> Result<(), PromptError>
    where
        P: ChoicePrompt + ?Sized,
    {
        let Summary::Branch(children) = summary else {
            return Ok(());
        };
        for (key, child) in children {
            let path = at.child(key.as_str());
            let options = offered_choices(child);
            let choice = match options {
                [only] => *only,
                _ => prompt.choose(&path, child, options)?,
            };
            if !options.contains(&choice) {
                return Err(PromptError::Failed(format!(
                    "'{choice}' is not offered for '{path}'"
                )));
            }
            map.insert(&path, choice);
            if choice == Classification::Collection {
                self.visit(child, &path, prompt, map)?;
            }
        }
        Ok(())
    }
}

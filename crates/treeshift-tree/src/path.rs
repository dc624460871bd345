//! Tree paths
//!
//! Provides [`TreePath`], the join key shared by the sampler, the decision map
//! and the migrator.
//!
//! Paths render as `/key1/key2/...` and the root renders as the empty string.
//! Keys are escaped with the JSON Pointer rule (`~` becomes `~0`, `/` becomes
//! `~1`), so a key that contains a slash never collides with a nested path.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Separator between rendered path segments
pub const SEPARATOR: char = '/';

/// Location within a source tree
///
/// # Examples
/// - `[]` → `` (root)
/// - `["users", "alice"]` → `/users/alice`
/// - `["a/b"]` → `/a~1b`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments, which is also the depth below the root
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Alias of [`TreePath::is_root`]
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a key, returning the child path
    ///
    /// This is the only way paths grow. The sampler and the migrator both
    /// descend through it, so the same key sequence always renders the same
    /// string.
    #[inline]
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(key.into());
        new
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Canonical string form
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push(SEPARATOR);
            out.push_str(&escape_key(segment));
        }
        out
    }

    /// Parse the canonical string form
    ///
    /// # Errors
    /// - [`PathError::MissingLeadingSlash`] for non-empty input without `/`
    /// - [`PathError::InvalidEscape`] for `~` not followed by `0` or `1`
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix(SEPARATOR) else {
            return Err(PathError::MissingLeadingSlash(s.to_string()));
        };
        let segments = rest
            .split(SEPARATOR)
            .map(unescape_key)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

/// Escape a key for use as one rendered segment
#[must_use]
pub fn escape_key(key: &str) -> Cow<'_, str> {
    if !key.contains(['~', SEPARATOR]) {
        return Cow::Borrowed(key);
    }
    // `~` first, otherwise the `~1` produced for `/` would be escaped again
    Cow::Owned(key.replace('~', "~0").replace(SEPARATOR, "~1"))
}

/// Reverse [`escape_key`]
///
/// # Errors
/// Returns [`PathError::InvalidEscape`] when `~` is not followed by `0` or `1`.
pub fn unescape_key(segment: &str) -> Result<String, PathError> {
    if !segment.contains('~') {
        return Ok(segment.to_string());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push(SEPARATOR),
            _ => return Err(PathError::InvalidEscape(segment.to_string())),
        }
    }
    Ok(out)
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for TreePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<String>> for TreePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for TreePath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }
}

impl Serialize for TreePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for TreePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Errors related to tree paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Non-root path without the leading separator
    #[error("path '{0}' must be empty or start with '/'")]
    MissingLeadingSlash(String),

    /// Malformed `~` escape in a segment
    #[error("invalid escape in path segment '{0}' (expected ~0 or ~1)")]
    InvalidEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn path_new_and_segments() {
        let path = TreePath::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(path.segments(), &["a", "b"]);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn path_root_renders_empty() {
        let path = TreePath::root();
        assert!(path.is_root());
        assert_eq!(path.render(), "");
    }

    #[test]
    fn path_child_renders_with_slashes() {
        let path = TreePath::root().child("users").child("alice");
        assert_eq!(path.render(), "/users/alice");
        assert_eq!(path.last(), Some("alice"));
    }

    #[test]
    fn path_escapes_slash_and_tilde() {
        let path = TreePath::single("a/b").child("c~d");
        assert_eq!(path.render(), "/a~1b/c~0d");
        assert_ne!(path.render(), TreePath::from(&["a", "b"][..]).render());
    }

    #[test]
    fn path_parse_roundtrip_with_escapes() {
        let parsed = TreePath::parse("/a~1b/c~0d").unwrap();
        assert_eq!(parsed.segments(), &["a/b", "c~d"]);
    }

    #[test]
    fn path_parse_empty_key() {
        let parsed = TreePath::parse("/").unwrap();
        assert_eq!(parsed.segments(), &[""]);
    }

    #[test]
    fn path_parse_requires_leading_slash() {
        let result = TreePath::parse("users/alice");
        assert!(matches!(result, Err(PathError::MissingLeadingSlash(_))));
    }

    #[test]
    fn path_parse_rejects_bad_escape() {
        assert!(matches!(
            TreePath::parse("/a~2"),
            Err(PathError::InvalidEscape(_))
        ));
        assert!(matches!(
            TreePath::parse("/trailing~"),
            Err(PathError::InvalidEscape(_))
        ));
    }

    #[test]
    fn path_serde_as_string() {
        let path = TreePath::single("a/b");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"/a~1b\"");
        let back: TreePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    proptest! {
        #[test]
        fn prop_render_parse_inverse(keys in prop::collection::vec(".*", 0..6)) {
            let path = TreePath::new(keys);
            prop_assert_eq!(TreePath::parse(&path.render()).unwrap(), path);
        }

        #[test]
        fn prop_distinct_key_sequences_render_distinct(
            a in prop::collection::vec("[a-c/~]{0,3}", 0..4),
            b in prop::collection::vec("[a-c/~]{0,3}", 0..4),
        ) {
            let pa = TreePath::new(a.clone());
            let pb = TreePath::new(b.clone());
            prop_assert_eq!(a == b, pa.render() == pb.render());
        }
    }
}

//! Scene paths for addressing nodes in the scene tree
//!
//! Provides [`PathKey`], the normalized slash-delimited identifier of a node.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path separator used in canonical form.
pub const SEPARATOR: char = '/';

/// Normalized path of a node in the scene tree
///
/// The canonical form always has exactly one leading separator and no
/// trailing separator, so `"a/b"`, `"/a/b"` and `"/a/b/"` all parse to the
/// same key. The root is written `"/"` and is never a node itself.
///
/// # Examples
/// - `"world/robot/arm"` → `/world/robot/arm`
/// - `"/"` → root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathKey(String);

impl PathKey {
    /// The root path (`/`)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Parse and normalize a path
    ///
    /// # Errors
    /// Returns [`PathError`] for empty interior segments or control characters.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        s.parse()
    }

    /// Canonical string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the root path
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Iterator over segments from root to leaf
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Number of segments (0 for root)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment (if not root)
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit(SEPARATOR).next()
        }
    }

    /// Parent path (if not root)
    ///
    /// The parent of a top-level path such as `/a` is the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    /// Append a segment, returning a new path
    ///
    /// # Errors
    /// Returns error if `segment` is empty or contains a separator.
    pub fn child(&self, segment: &str) -> Result<Self, PathError> {
        validate_segment(segment)?;
        if segment.contains(SEPARATOR) {
            return Err(PathError::InvalidSegment(segment.to_string()));
        }
        if self.is_root() {
            Ok(Self(format!("{SEPARATOR}{segment}")))
        } else {
            Ok(Self(format!("{}{SEPARATOR}{segment}", self.0)))
        }
    }

    /// Strict non-root ancestors, ordered from the top of the tree down
    ///
    /// `/a/b/c` yields `[/a, /a/b]`.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = String::new();
        let segments: Vec<&str> = self.segments().collect();
        for seg in segments.iter().take(segments.len().saturating_sub(1)) {
            current.push(SEPARATOR);
            current.push_str(seg);
            out.push(Self(current.clone()));
        }
        out
    }

    /// Check if this path is a prefix of (or equal to) another
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.is_root() {
            return true;
        }
        other.0 == self.0
            || (other.0.starts_with(&self.0)
                && other.0.as_bytes().get(self.0.len()) == Some(&(SEPARATOR as u8)))
    }

    /// Check if this path is a strict ancestor of another
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self != other && self.is_prefix_of(other)
    }
}

fn validate_segment(seg: &str) -> Result<(), PathError> {
    if seg.is_empty() {
        Err(PathError::EmptySegment)
    } else if seg.chars().any(char::is_control) {
        Err(PathError::InvalidSegment(seg.to_string()))
    } else {
        Ok(())
    }
}

impl Display for PathKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PathKey {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix(SEPARATOR).unwrap_or(s);
        let body = body.strip_suffix(SEPARATOR).unwrap_or(body);
        if body.is_empty() {
            return Ok(Self::root());
        }

        let mut canonical = String::with_capacity(body.len() + 1);
        for seg in body.split(SEPARATOR) {
            validate_segment(seg)?;
            canonical.push(SEPARATOR);
            canonical.push_str(seg);
        }
        Ok(Self(canonical))
    }
}

impl TryFrom<String> for PathKey {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for PathKey {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PathKey> for String {
    fn from(path: PathKey) -> Self {
        path.0
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Default for PathKey {
    fn default() -> Self {
        Self::root()
    }
}

/// Errors related to scene paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path (e.g. `a//b`)
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0:?}")]
    InvalidSegment(String),
}

//! Stack paths: ordered sequences of segment tokens that address a level in
//! the middleware tree.
//!
//! A [`StackPath`] is compared segment by segment. There is no pattern
//! syntax; `{id}` or `*` are ordinary segments matched for exact equality.
//!
//! ```rust
//! use hstacks::StackPath;
//!
//! let path = StackPath::from(["a", "b", "c"]);
//! assert_eq!(path.len(), 3);
//! assert_eq!(path.prefix(1), StackPath::from(["a"]));
//! assert_eq!(path.to_string(), "/a/b/c");
//! assert_eq!(StackPath::parse("/a/b/c"), path);
//! ```

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Number of segments stored inline before spilling to the heap.
/// Middleware trees are rarely deeper than this.
pub const MAX_INLINE_SEGMENTS: usize = 8;

/// A single path segment.
///
/// Segments are `Arc<str>` so that prefixes taken during a dispatch share
/// their storage with the dispatched path (O(1) clone).
pub type Segment = Arc<str>;

/// Ordered sequence of segments identifying a location in the tree.
///
/// The empty path is the root level: middleware mounted there runs first for
/// every dispatch.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct StackPath {
    segments: SmallVec<[Segment; MAX_INLINE_SEGMENTS]>,
}

impl StackPath {
    /// The root path (no segments).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a slash separated path. Empty segments are ignored, so `""`,
    /// `"/"` and `"//"` all denote the root.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        path.split('/').filter(|s| !s.is_empty()).collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Alias of [`StackPath::is_root`].
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The leading `len` segments of this path. `len` is clamped to the
    /// path length.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        let len = len.min(self.segments.len());
        Self {
            segments: self.segments[..len].iter().cloned().collect(),
        }
    }

    /// Every prefix of this path, shortest (root) first, the path itself last.
    pub fn prefixes(&self) -> impl Iterator<Item = StackPath> + '_ {
        (0..=self.len()).map(move |len| self.prefix(len))
    }

    /// The path one segment shorter, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(self.prefix(self.len() - 1))
        }
    }

    /// Whether `self` is a prefix of `other` (every path is a prefix of itself).
    #[must_use]
    pub fn is_prefix_of(&self, other: &StackPath) -> bool {
        self.len() <= other.len() && self.segments[..] == other.segments[..self.len()]
    }

    /// Append a segment, returning the extended path.
    #[must_use]
    pub fn join(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl Display for StackPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StackPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.segments.iter().map(|s| s.as_ref()))
            .finish()
    }
}

impl<S: Into<Segment>> FromIterator<S> for StackPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for StackPath {
    fn from(segments: [&str; N]) -> Self {
        segments.into_iter().collect()
    }
}

impl From<&[&str]> for StackPath {
    fn from(segments: &[&str]) -> Self {
        segments.iter().copied().collect()
    }
}

impl From<Vec<String>> for StackPath {
    fn from(segments: Vec<String>) -> Self {
        segments.into_iter().collect()
    }
}

impl From<&[Segment]> for StackPath {
    fn from(segments: &[Segment]) -> Self {
        segments.iter().cloned().collect()
    }
}

impl From<&StackPath> for StackPath {
    fn from(path: &StackPath) -> Self {
        path.clone()
    }
}

impl Serialize for StackPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for segment in &self.segments {
            seq.serialize_element(segment.as_ref())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for StackPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let segments = Vec::<String>::deserialize(deserializer)?;
        Ok(segments.into())
    }
}

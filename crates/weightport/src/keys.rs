//! # Parameter Key Paths
//!
//! A [`KeyPath`] names a parameter inside a model's hierarchical namespace.
//!
//! Foreign checkpoints use flat, delimited names (``layer1.0.conv1.weight``);
//! parsing accepts both ``.`` and ``/`` as separators, and display always
//! uses ``/``.

use std::fmt::{Display, Formatter};

/// A hierarchical parameter name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// The separators accepted by [`KeyPath::parse`].
    pub const SEPARATORS: [char; 2] = ['.', '/'];

    /// Build a path from explicit segments.
    ///
    /// # Panics
    ///
    /// If `segments` is empty, or any segment is empty.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        assert!(!segments.is_empty(), "KeyPath must have at least one segment");
        assert!(
            segments.iter().all(|s| !s.is_empty()),
            "KeyPath segments must be non-empty: {segments:?}"
        );
        Self { segments }
    }

    /// Parse a delimited key.
    ///
    /// Empty segments (leading, trailing or doubled separators) are dropped.
    ///
    /// # Returns
    ///
    /// `None` if the key has no non-empty segments.
    pub fn parse(key: &str) -> Option<Self> {
        let segments: Vec<String> = key
            .split(Self::SEPARATORS)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// A single-segment root path.
    pub fn root(name: &str) -> Self {
        Self::new([name])
    }

    /// Extend this path by one segment.
    pub fn child<S: ToString>(
        &self,
        name: S,
    ) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self::new(segments)
    }

    /// Extend this path by all segments of `other`.
    pub fn join(
        &self,
        other: &KeyPath,
    ) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment; the leaf parameter name.
    pub fn leaf(&self) -> &str {
        // Non-empty by construction.
        &self.segments[self.segments.len() - 1]
    }

    /// The enclosing namespace, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Is `prefix` an (inclusive) ancestor namespace of this path?
    pub fn starts_with(
        &self,
        prefix: &KeyPath,
    ) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl Display for KeyPath {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

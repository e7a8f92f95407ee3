//! Model paths
//!
//! A `ModelPath` names a node in the graph as an ordered sequence of
//! name segments. It defines node identity and a total order used for
//! stable diagnostics.

use std::fmt;

/// Structured identifier for a model node.
///
/// The root path is the empty sequence and displays as `<root>`; every
/// other path displays as its dot-joined segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModelPath {
    segments: Vec<String>,
}

impl ModelPath {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path string, e.g. `components.main.sources`
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// The path of this path's child with the given name
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// The parent path, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The last segment, or `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether `other` is this path or a descendant of it
    pub fn is_prefix_of(&self, other: &ModelPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

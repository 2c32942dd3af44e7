// SPDX-License-Identifier: MIT OR Apache-2.0
//! Absolute document paths and property paths.
//!
//! A [`DocPath`] is a slash separated path such as `/Graph1/Add1`. The empty
//! path means "nothing" and `/` is the pseudo-root that owns every top level
//! node. Node names are identifiers: a letter or underscore followed by
//! letters, digits or underscores.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while parsing or building paths
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path is not absolute or contains an invalid segment
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    /// A node name is not a valid identifier
    #[error("Invalid node name: {0:?}")]
    InvalidName(String),

    /// The operation needs a non-empty path
    #[error("Path is empty")]
    EmptyPath,
}

/// Check whether `name` can be used as a node name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Absolute path of a node in the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(String);

impl DocPath {
    /// Parse a path, accepting the empty path and the pseudo-root
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() || path == "/" {
            return Ok(Self(path.to_string()));
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(PathError::InvalidPath(path.to_string()));
        };
        if !rest.split('/').all(is_valid_name) {
            return Err(PathError::InvalidPath(path.to_string()));
        }
        Ok(Self(path.to_string()))
    }

    /// The empty path
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// The pseudo-root path `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Whether this is the empty path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this is the pseudo-root
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, empty for the pseudo-root and the empty path
    pub fn name(&self) -> &str {
        if self.is_empty() || self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent path, `None` for the pseudo-root and the empty path
    pub fn parent(&self) -> Option<DocPath> {
        if self.is_empty() || self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(index) => Some(Self(self.0[..index].to_string())),
            None => None,
        }
    }

    /// Build the path of a child named `name`
    pub fn child(&self, name: &str) -> Result<DocPath, PathError> {
        if self.is_empty() {
            return Err(PathError::EmptyPath);
        }
        if !is_valid_name(name) {
            return Err(PathError::InvalidName(name.to_string()));
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Number of segments below the pseudo-root
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// True when `self` equals `prefix` or lies underneath it.
    ///
    /// The empty path is never a prefix and never has one.
    pub fn has_prefix(&self, prefix: &DocPath) -> bool {
        if self.is_empty() || prefix.is_empty() {
            return false;
        }
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    /// Swap the leading `old` prefix for `new`, if `self` lies under `old`
    pub fn replace_prefix(&self, old: &DocPath, new: &DocPath) -> Option<DocPath> {
        if !self.has_prefix(old) || old.is_root() || new.is_empty() {
            return None;
        }
        let suffix = &self.0[old.0.len()..];
        if new.is_root() {
            if suffix.is_empty() {
                return Some(Self::root());
            }
            return Some(Self(suffix.to_string()));
        }
        Some(Self(format!("{}{suffix}", new.0)))
    }

    /// Every non-root ancestor from the top down, ending with `self`
    pub fn ancestors(&self) -> Vec<DocPath> {
        let mut current = String::new();
        self.segments()
            .map(|segment| {
                current.push('/');
                current.push_str(segment);
                Self(current.clone())
            })
            .collect()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DocPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Path of a property: the owning node plus the (possibly namespaced) name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyPath {
    /// Owning node
    pub node: DocPath,
    /// Property name, e.g. `inputs:a`
    pub name: String,
}

impl PropertyPath {
    /// Create a property path
    pub fn new(node: DocPath, name: impl Into<String>) -> Self {
        Self {
            node,
            name: name.into(),
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse() {
        assert!(path("").is_empty());
        assert!(path("/").is_root());
        assert_eq!(path("/Graph1/Add1").as_str(), "/Graph1/Add1");
        assert!(DocPath::parse("Graph1").is_err());
        assert!(DocPath::parse("/Graph1/").is_err());
        assert!(DocPath::parse("/1abc").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        let p = path("/Graph1/Add1");
        assert_eq!(p.name(), "Add1");
        assert_eq!(p.parent(), Some(path("/Graph1")));
        assert_eq!(path("/Graph1").parent(), Some(DocPath::root()));
        assert_eq!(DocPath::root().parent(), None);
        assert_eq!(DocPath::root().child("A").unwrap(), path("/A"));
    }

    #[test]
    fn test_prefix() {
        let root = path("/Graph1");
        assert!(path("/Graph1").has_prefix(&root));
        assert!(path("/Graph1/Add1").has_prefix(&root));
        assert!(!path("/Graph10").has_prefix(&root));
        assert!(path("/Graph10").has_prefix(&DocPath::root()));
        assert!(!DocPath::empty().has_prefix(&root));

        let moved = path("/Graph1/Sub/Add1").replace_prefix(&root, &path("/Renamed"));
        assert_eq!(moved, Some(path("/Renamed/Sub/Add1")));
        assert_eq!(path("/Other").replace_prefix(&root, &path("/Renamed")), None);
    }

    #[test]
    fn test_ancestors() {
        let chain = path("/A/B/C").ancestors();
        assert_eq!(chain, vec![path("/A"), path("/A/B"), path("/A/B/C")]);
        assert!(DocPath::root().ancestors().is_empty());
    }

    #[test]
    fn test_names() {
        assert!(is_valid_name("Add_1"));
        assert!(is_valid_name("_hidden"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("with space"));
    }
}

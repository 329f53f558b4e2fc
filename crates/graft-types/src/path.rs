use std::fmt;
use std::sync::Arc;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ordered sequence of segments addressing a location in the graph.
///
/// Paths are persistent: [`Path::child`] shares the parent's segments instead
/// of copying them, so deriving a long chain of contexts stays cheap. The
/// empty path is the root.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    tail: Option<Arc<Link>>,
}

#[derive(PartialEq, Eq, Hash)]
struct Link {
    parent: Path,
    segment: String,
    depth: usize,
}

impl Path {
    /// The root path (no segments).
    pub const fn root() -> Self {
        Self { tail: None }
    }

    /// Build a path from segments in order.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        segments
            .into_iter()
            .fold(Self::root(), |path, segment| path.child(segment))
    }

    /// Split `text` on `separator`, dropping empty segments.
    pub fn parse(text: &str, separator: &str) -> Self {
        if separator.is_empty() {
            return if text.is_empty() {
                Self::root()
            } else {
                Self::root().child(text)
            };
        }
        Self::from_segments(text.split(separator).filter(|s| !s.is_empty()))
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        Self {
            tail: Some(Arc::new(Link {
                parent: self.clone(),
                segment: segment.into(),
                depth: self.len() + 1,
            })),
        }
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.tail.as_ref().map_or(0, |link| link.depth)
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.tail.is_none()
    }

    /// Returns `true` for the root path.
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.tail.as_ref().map(|link| link.segment.as_str())
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Option<&Path> {
        self.tail.as_ref().map(|link| &link.parent)
    }

    /// Segments from first to last.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self;
        while let Some(link) = &cursor.tail {
            out.push(link.segment.as_str());
            cursor = &link.parent;
        }
        out.reverse();
        out
    }

    /// Owned segments from first to last.
    pub fn to_vec(&self) -> Vec<String> {
        self.segments().into_iter().map(str::to_owned).collect()
    }

    /// Serialize to a single string.
    pub fn join(&self, separator: &str) -> String {
        self.segments().join(separator)
    }

    /// Returns `true` if `self` is `other` or lies beneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        let mine = self.segments();
        let theirs = other.segments();
        mine.len() >= theirs.len() && mine[..theirs.len()] == theirs[..]
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.segments())
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}

impl Serialize for Path {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let segments = self.segments();
        let mut seq = serializer.serialize_seq(Some(segments.len()))?;
        for segment in segments {
            seq.serialize_element(segment)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathVisitor;

        impl<'de> Visitor<'de> for PathVisitor {
            type Value = Path;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of path segments")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Path, A::Error> {
                let mut path = Path::root();
                while let Some(segment) = seq.next_element::<String>()? {
                    path = path.child(segment);
                }
                Ok(path)
            }
        }

        deserializer.deserialize_seq(PathVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        let root = Path::root();
        assert!(root.is_root());
        assert_eq!(root.len(), 0);
        assert_eq!(root.last(), None);
        assert_eq!(root.join("/"), "");
    }

    #[test]
    fn child_shares_parent() {
        let account = Path::root().child("account");
        let admin = account.child("admin");
        let guest = account.child("guest");
        assert_eq!(admin.segments(), vec!["account", "admin"]);
        assert_eq!(guest.segments(), vec!["account", "guest"]);
        assert_eq!(admin.parent(), Some(&account));
        assert_eq!(account.segments(), vec!["account"]);
    }

    #[test]
    fn parse_splits_and_skips_empty_segments() {
        let path = Path::parse("/account//admin/", "/");
        assert_eq!(path.segments(), vec!["account", "admin"]);
        assert_eq!(path.join("."), "account.admin");
    }

    #[test]
    fn parse_with_custom_separator() {
        let path = Path::parse("a::b::c", "::");
        assert_eq!(path.len(), 3);
        assert_eq!(path.last(), Some("c"));
    }

    #[test]
    fn structural_equality() {
        let a = Path::from_segments(["x", "y"]);
        let b = Path::root().child("x").child("y");
        assert_eq!(a, b);
        assert_ne!(a, Path::from_segments(["x"]));
    }

    #[test]
    fn starts_with_prefix() {
        let deep = Path::from_segments(["a", "b", "c"]);
        assert!(deep.starts_with(&Path::from_segments(["a", "b"])));
        assert!(deep.starts_with(&Path::root()));
        assert!(!deep.starts_with(&Path::from_segments(["a", "c"])));
    }

    #[test]
    fn serde_as_segment_list() {
        let path = Path::from_segments(["account", "admin"]);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["account","admin"]"#);
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}

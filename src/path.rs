use crate::error::ConfigError;
use std::{borrow::Borrow, fmt};

/// A location in the configuration hierarchy.
///
/// Paths are an ordered list of name segments, such as a source name split on `.` followed by a
/// method name.  The empty path is the root of the hierarchy and is an ancestor of every path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// The empty path.
    pub fn root() -> ConfigPath { ConfigPath(Vec::new()) }

    /// Creates a path from already-split segments.
    pub fn new<I, S>(segments: I) -> ConfigPath
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigPath(segments.into_iter().map(Into::into).collect())
    }

    /// Parses a dotted name such as `org.example.Client.reportSize`.
    ///
    /// The empty string parses to the root path.  Empty segments (`a..b`, `.a`) are rejected.
    pub fn parse(dotted: &str) -> Result<ConfigPath, ConfigError> { ConfigPath::root().join(dotted) }

    /// Appends a possibly-dotted name to this path, returning the child path.
    pub fn join(&self, name: &str) -> Result<ConfigPath, ConfigError> {
        let mut segments = self.0.clone();
        if name.is_empty() {
            return Ok(ConfigPath(segments));
        }

        for segment in name.split('.') {
            if segment.is_empty() {
                return Err(ConfigError::MalformedPath(name.to_owned()));
            }
            segments.push(segment.to_owned());
        }

        Ok(ConfigPath(segments))
    }

    /// Appends a single segment without splitting it.
    pub(crate) fn child(&self, segment: &str) -> ConfigPath {
        let mut segments = self.0.clone();
        segments.push(segment.to_owned());
        ConfigPath(segments)
    }

    pub fn segments(&self) -> &[String] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_root(&self) -> bool { self.0.is_empty() }

    /// The last segment, if any.
    pub fn leaf(&self) -> Option<&str> { self.0.last().map(String::as_str) }

    /// The path without its last segment.  The root is its own parent.
    pub fn parent(&self) -> ConfigPath {
        let end = self.0.len().saturating_sub(1);
        ConfigPath(self.0[..end].to_vec())
    }

    /// Whether this path is a prefix of `other`.  A path contains itself.
    pub fn contains(&self, other: &ConfigPath) -> bool { other.0.starts_with(&self.0) }

    /// Every prefix of this path, longest first, ending with the root.
    pub fn prefixes(&self) -> impl Iterator<Item = &[String]> {
        let segments = &self.0;
        (0..=segments.len()).rev().map(move |i| &segments[..i])
    }
}

impl Borrow<[String]> for ConfigPath {
    fn borrow(&self) -> &[String] { &self.0 }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0.join(".")) }
}

#[cfg(test)]
mod tests {
    use super::ConfigPath;

    #[test]
    fn test_parse_and_display() {
        let path = ConfigPath::parse("org.example.Client.reportSize").unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.leaf(), Some("reportSize"));
        assert_eq!(path.to_string(), "org.example.Client.reportSize");

        assert!(ConfigPath::parse("").unwrap().is_root());
        assert!(ConfigPath::parse("a..b").is_err());
        assert!(ConfigPath::parse(".a").is_err());
    }

    #[test]
    fn test_ancestry() {
        let a = ConfigPath::parse("a").unwrap();
        let ab = ConfigPath::parse("a.b").unwrap();
        let ax = ConfigPath::parse("a.x").unwrap();

        assert!(ConfigPath::root().contains(&ab));
        assert!(a.contains(&ab));
        assert!(ab.contains(&ab));
        assert!(!ab.contains(&a));
        assert!(!ab.contains(&ax));
        assert_eq!(ab.parent(), a);
        assert_eq!(ConfigPath::root().parent(), ConfigPath::root());
    }

    #[test]
    fn test_prefixes_longest_first() {
        let path = ConfigPath::new(vec!["a", "b", "c"]);
        let prefixes: Vec<usize> = path.prefixes().map(|p| p.len()).collect();
        assert_eq!(prefixes, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_join_splits_dotted_names() {
        let base = ConfigPath::parse("a").unwrap();
        let joined = base.join("b.c").unwrap();
        assert_eq!(joined, ConfigPath::new(vec!["a", "b", "c"]));
        assert_eq!(base.child("b.c").len(), 2);
    }
}

use std::{
    collections::{btree_map, BTreeMap},
    fmt,
    iter::FromIterator,
};

/// The identity of one distinct argument combination under a path.
///
/// Tag sets are immutable once built.  Keys are unique and ordering is irrelevant: two tag sets
/// are equal when they hold the same key/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSet {
    tags: BTreeMap<String, String>,
}

impl TagSet {
    /// The tag set with no tags.
    pub fn empty() -> TagSet { TagSet::default() }

    pub fn builder() -> TagSetBuilder { TagSetBuilder::default() }

    pub fn get(&self, key: &str) -> Option<&str> { self.tags.get(key).map(String::as_str) }

    pub fn len(&self) -> usize { self.tags.len() }

    pub fn is_empty(&self) -> bool { self.tags.is_empty() }

    pub fn iter(&self) -> btree_map::Iter<String, String> { self.tags.iter() }

    /// Lays these tags over `base`, returning the union with this set winning on key conflicts.
    pub fn merged_over(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = base.clone();
        for (k, v) in &self.tags {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TagSet {
            tags: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(tags: BTreeMap<String, String>) -> Self { TagSet { tags } }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Builder for a `TagSet`.
///
/// A later tag with the same key replaces an earlier one.
#[derive(Default)]
pub struct TagSetBuilder {
    tags: BTreeMap<String, String>,
}

impl TagSetBuilder {
    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> TagSet { TagSet { tags: self.tags } }
}

//! Metric identity: names and tag sets.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Unique identity of a metric inside a registry.
///
/// Equality, ordering and hashing cover the whole tuple
/// `(group, type, name, scope, tags)`. A name is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricName {
    group: String,
    type_name: String,
    name: String,
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    tags: Tags,
}

impl MetricName {
    /// Create a name from its group, owning type and metric name.
    pub fn new(
        group: impl Into<String>,
        type_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            type_name: type_name.into(),
            name: name.into(),
            scope: None,
            tags: Tags::new(),
        }
    }

    /// Create a name owned by a Rust type; the module path becomes the group.
    pub fn of<T: ?Sized>(name: impl Into<String>) -> Self {
        Self::for_type(std::any::type_name::<T>(), name)
    }

    /// Create a name from a fully qualified owning type path such as `app::server::Handler`.
    pub fn for_type(owning_type: &str, name: impl Into<String>) -> Self {
        match owning_type.rsplit_once("::") {
            Some((group, type_name)) => Self::new(group, type_name, name),
            None => Self::new("", owning_type, name),
        }
    }

    /// Attach a scope, returning a new name.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attach a tag set, returning a new name.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.group.is_empty() {
            write!(f, "{}.", self.group)?;
        }
        write!(f, "{}.{}", self.type_name, self.name)?;
        if let Some(scope) = &self.scope {
            write!(f, ".{scope}")?;
        }
        if !self.tags.is_empty() {
            write!(f, "[{}]", self.tags)?;
        }
        Ok(())
    }
}

/// Unordered set of `(name, value)` tag pairs.
///
/// Tag names are unique; inserting an existing name replaces its value. Two
/// sets compare equal when they hold the same pairs, whatever the insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags {
    pairs: BTreeMap<String, String>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, returning the updated set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.pairs.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in ordinal name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when every pair in `self` is also present in `other`.
    ///
    /// An empty set matches anything.
    pub fn matches_all(&self, other: &Tags) -> bool {
        for (name, value) in &self.pairs {
            if other.pairs.get(name) != Some(value) {
                return false;
            }
        }
        true
    }

    /// Hash that is identical across processes and insertion orders.
    ///
    /// Pairs are visited in ordinal name order and folded as
    /// `hash = hash * 31 + pair_hash`, starting from 17.
    pub fn stable_hash(&self) -> u64 {
        self.pairs.iter().fold(17_u64, |acc, (name, value)| {
            let mut hasher = FxHasher::default();
            name.hash(&mut hasher);
            value.hash(&mut hasher);
            acc.wrapping_mul(31).wrapping_add(hasher.finish())
        })
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.pairs {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Cache key under which a persisted tag set is stored:
/// `<Owner>::tags::<32 lowercase hex digits>`.
pub fn tag_cache_key(owner: &str, id: u128) -> String {
    format!("{owner}::tags::{id:032x}")
}

use std::fmt;
use std::sync::Arc;

use crate::HashSet;

/// Unique name of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn(Arc<str>);

impl Urn {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Urn {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// Physical id assigned to a resource by its provider.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Set of resources a value transitively derives from.
///
/// Immutable once built; cloning shares the underlying set.
/// Union is the only way to combine two sets.
#[derive(Debug, Clone, Default)]
pub struct Dependencies(Arc<HashSet<Urn>>);

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set naming only `urn`.
    pub fn single(urn: Urn) -> Self {
        Self::from_iter([urn])
    }

    /// Union of every set in `sets`.
    pub fn union<I>(sets: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<Dependencies>,
    {
        let mut all = HashSet::default();
        for deps in sets {
            all.extend(deps.as_ref().iter().cloned());
        }
        Self(Arc::new(all))
    }

    pub fn contains(&self, urn: &Urn) -> bool {
        self.0.contains(urn)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Urn> {
        self.0.iter()
    }

    /// Members in a stable order, for display.
    pub fn sorted(&self) -> Vec<&Urn> {
        let mut urns: Vec<_> = self.0.iter().collect();
        urns.sort();
        urns
    }
}

impl AsRef<Dependencies> for Dependencies {
    fn as_ref(&self) -> &Dependencies {
        self
    }
}

impl FromIterator<Urn> for Dependencies {
    fn from_iter<T: IntoIterator<Item = Urn>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl PartialEq for Dependencies {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Dependencies {}

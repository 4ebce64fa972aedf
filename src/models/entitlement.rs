//! Entitlement sets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identity references (AD user or group SIDs) entitled to a pool.
///
/// Membership only: references are opaque and compared exactly. Iteration
/// order is lexical so request bodies and logs are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementSet(BTreeSet<String>);

impl EntitlementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    /// Returns false if the identity was already present
    pub fn insert(&mut self, identity: impl Into<String>) -> bool {
        self.0.insert(identity.into())
    }

    pub fn remove(&mut self, identity: &str) -> bool {
        self.0.remove(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Members of `self` that are not in `other`
    pub fn difference(&self, other: &EntitlementSet) -> EntitlementSet {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn union(&self, other: &EntitlementSet) -> EntitlementSet {
        self.0.union(&other.0).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for EntitlementSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for EntitlementSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for EntitlementSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntitlementSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for EntitlementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, identity) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{identity}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let set: EntitlementSet = ["SID-1", "SID-2", "SID-1"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("SID-1"));
    }

    #[test]
    fn test_order_does_not_matter() {
        let a: EntitlementSet = ["b", "a", "c"].into_iter().collect();
        let b: EntitlementSet = ["c", "b", "a"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.to_vec(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_difference_is_exact_match() {
        let current: EntitlementSet = ["S-1-5-21-100", "S-1-5-21-1000"].into_iter().collect();
        let desired: EntitlementSet = ["S-1-5-21-100"].into_iter().collect();

        let removed = current.difference(&desired);
        assert_eq!(removed.to_vec(), vec!["S-1-5-21-1000"]);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let set: EntitlementSet = ["SID-2", "SID-1"].into_iter().collect();
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            serde_json::json!(["SID-1", "SID-2"])
        );
        assert_eq!(set.to_string(), "{SID-1, SID-2}");
    }
}

//! Attribute value model shared by the directory crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Attribute name to value mapping.
///
/// Keys are compared exactly (case-sensitive) and iterate in ascending order,
/// which keeps generated modify batches deterministic.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Value of a directory attribute.
///
/// The shape is decided once when a value enters the crate; a multi-valued
/// attribute keeps the order in which the values were supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single scalar value.
    Single(String),
    /// An ordered sequence of values.
    Multi(Vec<String>),
}

impl AttributeValue {
    /// Creates a single-valued attribute.
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    /// Creates a multi-valued attribute.
    #[must_use]
    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multi(values.into_iter().map(Into::into).collect())
    }

    /// Builds a value from the list a directory server returned.
    ///
    /// Exactly one value becomes [`AttributeValue::Single`], anything else a
    /// [`AttributeValue::Multi`].
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            Self::Single(values.remove(0))
        } else {
            Self::Multi(values)
        }
    }

    /// Returns true for multi-valued attributes.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// Returns true for a multi-value with no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Returns the value with repeated entries dropped, keeping each first
    /// occurrence in place.
    ///
    /// Directory servers store attribute values as a set, so this is the form
    /// a multi-value takes once written.
    #[must_use]
    pub fn without_duplicates(&self) -> Self {
        match self {
            Self::Single(value) => Self::Single(value.clone()),
            Self::Multi(values) => {
                let mut seen = HashSet::with_capacity(values.len());
                Self::Multi(
                    values
                        .iter()
                        .filter(|value| seen.insert(value.as_str()))
                        .cloned()
                        .collect(),
                )
            }
        }
    }

    /// Returns the values as a slice, in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        }
    }

    /// Returns the first value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }

    /// Returns the values as an owned vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.as_slice().to_vec()
    }

    /// Consumes the value and returns its values.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value],
            Self::Multi(values) => values,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        Self::multi(values)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => f.write_str(value),
            Self::Multi(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_picks_shape() {
        assert_eq!(
            AttributeValue::from_values(vec!["alice".to_string()]),
            AttributeValue::single("alice")
        );
        assert_eq!(
            AttributeValue::from_values(vec!["a".to_string(), "b".to_string()]),
            AttributeValue::multi(["a", "b"])
        );
        assert_eq!(
            AttributeValue::from_values(Vec::new()),
            AttributeValue::Multi(Vec::new())
        );
    }

    #[test]
    fn multi_value_equality_is_order_sensitive() {
        assert_ne!(
            AttributeValue::multi(["a", "b"]),
            AttributeValue::multi(["b", "a"])
        );
        assert_ne!(AttributeValue::single("a"), AttributeValue::multi(["a"]));
    }

    #[test]
    fn accessors() {
        let value = AttributeValue::multi(["a@x.com", "b@x.com"]);
        assert!(value.is_multi());
        assert_eq!(value.first(), Some("a@x.com"));
        assert_eq!(value.as_slice().len(), 2);
        assert_eq!(value.to_string(), "[a@x.com, b@x.com]");

        let single = AttributeValue::from("eng");
        assert!(!single.is_multi());
        assert_eq!(single.into_vec(), vec!["eng".to_string()]);
    }

    #[test]
    fn without_duplicates_keeps_first_occurrences() {
        let value = AttributeValue::multi(["b", "a", "b", "c", "a"]);
        assert_eq!(value.without_duplicates(), AttributeValue::multi(["b", "a", "c"]));

        let unique = AttributeValue::multi(["x", "y"]);
        assert_eq!(unique.without_duplicates(), unique);
        assert_eq!(
            AttributeValue::single("x").without_duplicates(),
            AttributeValue::single("x")
        );
    }

    #[test]
    fn only_an_empty_multi_value_is_empty() {
        assert!(AttributeValue::Multi(Vec::new()).is_empty());
        assert!(!AttributeValue::single("").is_empty());
        assert!(!AttributeValue::multi(["a"]).is_empty());
    }

    #[test]
    fn serde_untagged_shape() {
        let map: AttributeMap =
            serde_json::from_str(r#"{"cn": "alice", "mail": ["a@x.com", "b@x.com"]}"#).unwrap();
        assert_eq!(map["cn"], AttributeValue::single("alice"));
        assert_eq!(map["mail"], AttributeValue::multi(["a@x.com", "b@x.com"]));
    }
}

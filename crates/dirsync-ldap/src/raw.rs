//! Ingestion of raw directory entries.
//!
//! Some directory gateways hand out entries in the shape produced by C-style
//! LDAP bindings: every multi-valued attribute is an object of indexed values
//! plus a `count` field, and the entry itself carries `count`, `dn` and
//! numeric index keys next to the attributes. This module strips that
//! metadata once, so the rest of the crate only sees [`AttributeValue`]s.

use dirsync_core::{AttributeMap, AttributeValue, Error, Result};
use serde_json::{Map, Value};

const COUNT_KEY: &str = "count";
const DN_KEY: &str = "dn";

/// A raw entry with transport metadata removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished name, when the raw entry carried one.
    pub dn: Option<String>,
    /// Attributes of the entry.
    pub attributes: AttributeMap,
}

impl RawEntry {
    /// Parses a raw entry from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAttribute`] if the document is not valid JSON
    /// or contains a value that is not a scalar, an array of scalars, or an
    /// indexed value object.
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    /// Builds a raw entry from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAttribute`] if `value` is not an object or one
    /// of its attribute values cannot be interpreted.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidAttribute("raw entry must be an object".to_string()))?;

        let mut dn = None;
        let mut attributes = AttributeMap::new();
        for (name, raw) in object {
            if name == COUNT_KEY || is_index(name) {
                continue;
            }
            if name == DN_KEY {
                if let Value::String(value) = raw {
                    dn = Some(value.clone());
                    continue;
                }
            }
            attributes.insert(name.clone(), attribute_value(name, raw)?);
        }

        Ok(Self { dn, attributes })
    }
}

/// Converts one raw attribute value, stripping the `count` field of indexed objects.
///
/// Indexed objects are server results and take the same shape as search
/// results: exactly one value becomes [`AttributeValue::Single`]. Arrays are
/// always [`AttributeValue::Multi`] and scalars [`AttributeValue::Single`].
///
/// # Errors
///
/// Returns [`Error::InvalidAttribute`] if the value has an unsupported shape.
pub fn attribute_value(name: &str, raw: &Value) -> Result<AttributeValue> {
    match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| scalar(name, item))
            .collect::<Result<Vec<_>>>()
            .map(AttributeValue::Multi),
        Value::Object(fields) => indexed_values(name, fields).map(AttributeValue::from_values),
        other => scalar(name, other).map(AttributeValue::Single),
    }
}

fn indexed_values(name: &str, fields: &Map<String, Value>) -> Result<Vec<String>> {
    let mut indexed = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        if key == COUNT_KEY {
            continue;
        }
        let index = key.parse::<usize>().map_err(|_| {
            Error::InvalidAttribute(format!("attribute `{name}` has unexpected key `{key}`"))
        })?;
        indexed.push((index, scalar(name, value)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, value)| value).collect())
}

fn scalar(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(value) => Ok(value.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(Error::InvalidAttribute(format!(
            "attribute `{name}` contains a non-scalar value"
        ))),
    }
}

fn is_index(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_count_metadata() {
        let raw = json!({
            "count": 2,
            "0": "cn",
            "1": "mail",
            "dn": "uid=alice,ou=People,dc=example,dc=com",
            "cn": "alice",
            "mail": {"count": 2, "0": "a@x.com", "1": "b@x.com"}
        });

        let entry = RawEntry::from_json(&raw).unwrap();
        assert_eq!(
            entry.dn.as_deref(),
            Some("uid=alice,ou=People,dc=example,dc=com")
        );
        assert_eq!(entry.attributes.len(), 2);
        assert_eq!(entry.attributes["cn"], AttributeValue::single("alice"));
        assert_eq!(
            entry.attributes["mail"],
            AttributeValue::multi(["a@x.com", "b@x.com"])
        );
    }

    #[test]
    fn indexed_values_follow_index_order() {
        let value = attribute_value(
            "mail",
            &json!({"10": "k@x.com", "2": "c@x.com", "count": 2}),
        )
        .unwrap();
        assert_eq!(value, AttributeValue::multi(["c@x.com", "k@x.com"]));
    }

    #[test]
    fn indexed_object_shape_matches_search_results() {
        assert_eq!(
            attribute_value("cn", &json!({"count": 1, "0": "alice"})).unwrap(),
            AttributeValue::single("alice")
        );
        assert_eq!(
            attribute_value("seeAlso", &json!({"count": 0})).unwrap(),
            AttributeValue::Multi(Vec::new())
        );
        assert_eq!(
            attribute_value("mail", &json!(["a@x.com"])).unwrap(),
            AttributeValue::multi(["a@x.com"])
        );
    }

    #[test]
    fn arrays_and_scalars() {
        assert_eq!(
            attribute_value("mail", &json!(["b", "a"])).unwrap(),
            AttributeValue::multi(["b", "a"])
        );
        assert_eq!(
            attribute_value("uidNumber", &json!(1001)).unwrap(),
            AttributeValue::single("1001")
        );
        assert_eq!(
            attribute_value("enabled", &json!(true)).unwrap(),
            AttributeValue::single("true")
        );
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(matches!(
            attribute_value("cn", &Value::Null),
            Err(Error::InvalidAttribute(_))
        ));
        assert!(matches!(
            attribute_value("mail", &json!({"primary": "a@x.com"})),
            Err(Error::InvalidAttribute(_))
        ));
        assert!(matches!(
            RawEntry::from_json(&json!(["cn"])),
            Err(Error::InvalidAttribute(_))
        ));
    }

    #[test]
    fn parse_reports_malformed_json() {
        assert!(matches!(
            RawEntry::parse("{not json"),
            Err(Error::InvalidAttribute(_))
        ));
    }
}

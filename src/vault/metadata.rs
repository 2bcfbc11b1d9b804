//! Metadata values attached to indexed items.
//!
//! Metadata carries provenance (source, title, chunk index, owning document)
//! and is the only thing search filters look at. Values are a closed set of
//! kinds so that filter equality stays well-defined.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the chunk position within its document.
pub const CHUNK_KEY: &str = "chunk";

/// Metadata key holding the id prefix shared by all chunks of a document.
pub const DOCUMENT_ID_KEY: &str = "document_id";

/// Metadata key holding a human readable document title.
pub const TITLE_KEY: &str = "title";

/// Metadata mapping. Ordered so that serialized output is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a command-line style value.
    ///
    /// JSON literals (`0`, `true`, `null`, `[...]`) keep their kind, anything
    /// else is taken verbatim as a string.
    pub fn parse_loose(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| MetadataValue::String(raw.to_string()))
    }
}

// Integers and floats compare numerically, so a filter of `1` matches a
// stored `1.0`. The comparison is exact, never through a lossy cast.
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        use MetadataValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Integer(a), Float(b)) | (Float(b), Integer(a)) => int_eq_float(*a, *b),
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            _ => false,
        }
    }
}

fn int_eq_float(int: i64, float: f64) -> bool {
    // 2^63, the first float past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    float.fract() == 0.0 && (-LIMIT..LIMIT).contains(&float) && float as i64 == int
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(values: Vec<T>) -> Self {
        MetadataValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Check that every filter entry is present in `metadata` with an equal value.
///
/// An empty filter set matches everything.
pub fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

/// Build a [`Metadata`] map from key/value pairs.
#[macro_export]
macro_rules! metadata {
    () => {
        $crate::vault::Metadata::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::vault::Metadata::new();
        $( map.insert($key.to_string(), $crate::vault::MetadataValue::from($value)); )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    #[test]
    fn test_integer_float_equality() {
        assert_eq!(MetadataValue::Integer(1), MetadataValue::Float(1.0));
        assert_ne!(MetadataValue::Integer(1), MetadataValue::Float(1.5));
        assert_ne!(MetadataValue::Integer(1), MetadataValue::String("1".into()));
    }

    #[test]
    fn test_large_integer_float_equality_is_exact() {
        use MetadataValue::{Float, Integer};

        let big = 1i64 << 53;
        assert_eq!(Integer(big), Float(big as f64));
        assert_ne!(Integer(big + 1), Float(big as f64));
        assert_ne!(Float(big as f64), Integer(big + 1));
        assert_ne!(Integer(i64::MAX), Float(i64::MAX as f64));
        assert_eq!(Integer(i64::MIN), Float(i64::MIN as f64));
        assert_ne!(Integer(0), Float(f64::NAN));
        assert_ne!(Integer(i64::MAX), Float(f64::INFINITY));

        let stored = metadata! { "mrn" => big + 1 };
        let rounded = metadata! { "mrn" => big as f64 };
        assert!(!matches_filters(&stored, &rounded));
        assert!(matches_filters(&stored, &stored.clone()));
    }

    #[test]
    fn test_deserialize_kinds() {
        let json = r#"{
            "a": null, "b": true, "c": 3, "d": 2.5, "e": "x",
            "f": [1, "y"], "g": {"h": 1}
        }"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();

        assert_eq!(meta["a"], MetadataValue::Null);
        assert_eq!(meta["b"], MetadataValue::Bool(true));
        assert!(matches!(meta["c"], MetadataValue::Integer(3)));
        assert!(matches!(meta["d"], MetadataValue::Float(_)));
        assert_eq!(meta["e"].as_str(), Some("x"));
        let list = vec![MetadataValue::Integer(1), MetadataValue::from("y")];
        assert_eq!(meta["f"], MetadataValue::List(list));
        assert!(matches!(meta["g"], MetadataValue::Map(_)));
    }

    #[test]
    fn test_serialize_integer_stays_integer() {
        let meta = metadata! { "chunk" => 0usize };
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"chunk":0}"#);
    }

    #[test]
    fn test_matches_filters() {
        let meta = metadata! { "type" => "note", "patient_id" => "PT-1" };
        let note = metadata! { "type" => "note" };
        let lab = metadata! { "type" => "lab" };
        let missing = metadata! { "missing" => "note" };
        let other_patient = metadata! { "type" => "note", "patient_id" => "PT-2" };

        assert!(matches_filters(&meta, &Metadata::new()));
        assert!(matches_filters(&meta, &note));
        assert!(!matches_filters(&meta, &lab));
        assert!(!matches_filters(&meta, &missing));
        assert!(!matches_filters(&meta, &other_patient));
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(MetadataValue::parse_loose("0"), MetadataValue::Integer(0));
        assert_eq!(
            MetadataValue::parse_loose("true"),
            MetadataValue::Bool(true)
        );
        assert_eq!(
            MetadataValue::parse_loose("PT-1"),
            MetadataValue::String("PT-1".into())
        );
        assert_eq!(
            MetadataValue::parse_loose("\"quoted\""),
            MetadataValue::String("quoted".into())
        );
    }
}

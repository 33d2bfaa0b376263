//! Totally ordered heterogeneous values.
//!
//! Cross-type ordering is fixed by a type rank:
//! MinKey < Null < Bool < numbers < String < DateTime < Object < Array < MaxKey.
//! Int and Float share a rank and compare numerically, so `Int(1)` and
//! `Float(1.0)` are equal. Equality is defined through the comparison to
//! keep the two consistent.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

/// A single ordered value, as stored in an index key or supplied as a
/// query operand.
///
/// `MinKey` and `MaxKey` are sentinels: no concrete document value
/// compares equal to either, and every concrete value sorts between
/// them.
#[derive(Debug, Clone)]
pub enum KeyValue {
    /// Sentinel below every concrete value
    MinKey,
    /// Null value
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point; NaN sorts below every other number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Timestamp with UTC timezone
    DateTime(DateTime<Utc>),
    /// Subdocument, compared field by field
    Object(Vec<(String, KeyValue)>),
    /// Array, compared element by element
    Array(Vec<KeyValue>),
    /// Sentinel above every concrete value
    MaxKey,
}

impl KeyValue {
    /// Rank used for cross-type comparison. Int and Float share a rank.
    fn type_rank(&self) -> u8 {
        match self {
            KeyValue::MinKey => 0,
            KeyValue::Null => 1,
            KeyValue::Bool(_) => 2,
            KeyValue::Int(_) | KeyValue::Float(_) => 3,
            KeyValue::String(_) => 4,
            KeyValue::DateTime(_) => 5,
            KeyValue::Object(_) => 6,
            KeyValue::Array(_) => 7,
            KeyValue::MaxKey => 8,
        }
    }

    /// Returns the type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyValue::MinKey => "minKey",
            KeyValue::Null => "null",
            KeyValue::Bool(_) => "bool",
            KeyValue::Int(_) => "int",
            KeyValue::Float(_) => "float",
            KeyValue::String(_) => "string",
            KeyValue::DateTime(_) => "date",
            KeyValue::Object(_) => "object",
            KeyValue::Array(_) => "array",
            KeyValue::MaxKey => "maxKey",
        }
    }

    /// Converts a JSON value into an ordered value.
    ///
    /// Extended literals are recognized: `{"$date": "<rfc3339>"}`
    /// parses to a timestamp, `{"$minKey": 1}` / `{"$maxKey": 1}` to
    /// the sentinels. Any other object converts to `Object`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => KeyValue::Null,
            serde_json::Value::Bool(b) => KeyValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    KeyValue::Int(i)
                } else {
                    KeyValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => KeyValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                KeyValue::Array(items.iter().map(KeyValue::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(literal) = Self::extended_literal(map) {
                        return literal;
                    }
                }
                KeyValue::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), KeyValue::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    fn extended_literal(map: &serde_json::Map<String, serde_json::Value>) -> Option<KeyValue> {
        let (key, value) = map.iter().next()?;
        match key.as_str() {
            "$minKey" => Some(KeyValue::MinKey),
            "$maxKey" => Some(KeyValue::MaxKey),
            "$date" => {
                let text = value.as_str()?;
                let parsed = DateTime::parse_from_rfc3339(text).ok()?;
                Some(KeyValue::DateTime(parsed.with_timezone(&Utc)))
            }
            _ => None,
        }
    }

    /// Converts back to JSON, using the extended literal forms for the
    /// sentinels and timestamps. NaN has no JSON representation and
    /// renders as null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            KeyValue::MinKey => json!({ "$minKey": 1 }),
            KeyValue::Null => serde_json::Value::Null,
            KeyValue::Bool(b) => json!(b),
            KeyValue::Int(i) => json!(i),
            KeyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            KeyValue::String(s) => json!(s),
            KeyValue::DateTime(dt) => json!({ "$date": dt.to_rfc3339() }),
            KeyValue::Object(fields) => {
                let mut map = serde_json::Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            KeyValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(KeyValue::to_json).collect())
            }
            KeyValue::MaxKey => json!({ "$maxKey": 1 }),
        }
    }
}

/// Total order over floats: NaN below everything else, -0.0 == 0.0.
fn float_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn pairs_cmp(a: &[(String, KeyValue)], b: &[(String, KeyValue)]) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let key_cmp = ka.cmp(kb);
        if key_cmp != Ordering::Equal {
            return key_cmp;
        }
        let value_cmp = va.cmp(vb);
        if value_cmp != Ordering::Equal {
            return value_cmp;
        }
    }
    a.len().cmp(&b.len())
}

fn items_cmp(a: &[KeyValue], b: &[KeyValue]) -> Ordering {
    for (va, vb) in a.iter().zip(b.iter()) {
        let value_cmp = va.cmp(vb);
        if value_cmp != Ordering::Equal {
            return value_cmp;
        }
    }
    a.len().cmp(&b.len())
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }
        match (self, other) {
            (KeyValue::Bool(a), KeyValue::Bool(b)) => a.cmp(b),
            (KeyValue::Int(a), KeyValue::Int(b)) => a.cmp(b),
            (KeyValue::Int(a), KeyValue::Float(b)) => float_cmp(*a as f64, *b),
            (KeyValue::Float(a), KeyValue::Int(b)) => float_cmp(*a, *b as f64),
            (KeyValue::Float(a), KeyValue::Float(b)) => float_cmp(*a, *b),
            (KeyValue::String(a), KeyValue::String(b)) => a.cmp(b),
            (KeyValue::DateTime(a), KeyValue::DateTime(b)) => a.cmp(b),
            (KeyValue::Object(a), KeyValue::Object(b)) => pairs_cmp(a, b),
            (KeyValue::Array(a), KeyValue::Array(b)) => items_cmp(a, b),
            // same rank implies same variant for the remaining cases
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for KeyValue {
    fn from(b: bool) -> Self {
        KeyValue::Bool(b)
    }
}

impl From<i64> for KeyValue {
    fn from(i: i64) -> Self {
        KeyValue::Int(i)
    }
}

impl From<f64> for KeyValue {
    fn from(f: f64) -> Self {
        KeyValue::Float(f)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::String(s.to_owned())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cross_type_ordering() {
        let values = vec![
            KeyValue::MinKey,
            KeyValue::Null,
            KeyValue::Bool(false),
            KeyValue::Bool(true),
            KeyValue::Int(-100),
            KeyValue::Float(0.5),
            KeyValue::Int(100),
            KeyValue::String("aaa".into()),
            KeyValue::String("zzz".into()),
            KeyValue::Array(vec![KeyValue::Int(1)]),
            KeyValue::MaxKey,
        ];

        for i in 1..values.len() {
            assert!(values[i - 1] < values[i], "values should be ordered");
        }
    }

    #[test]
    fn test_numeric_equality_across_variants() {
        assert_eq!(KeyValue::Int(1), KeyValue::Float(1.0));
        assert!(KeyValue::Int(1) < KeyValue::Float(1.5));
        assert!(KeyValue::Float(1.5) < KeyValue::Int(2));
    }

    #[test]
    fn test_nan_sorts_below_numbers() {
        assert!(KeyValue::Float(f64::NAN) < KeyValue::Float(f64::NEG_INFINITY));
        assert!(KeyValue::Float(f64::NAN) < KeyValue::Int(i64::MIN));
        assert_eq!(KeyValue::Float(f64::NAN), KeyValue::Float(f64::NAN));
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        assert_eq!(KeyValue::Float(-0.0), KeyValue::Float(0.0));
    }

    #[test]
    fn test_sentinels_bracket_everything() {
        let concrete = vec![
            KeyValue::Null,
            KeyValue::Bool(true),
            KeyValue::Int(i64::MIN),
            KeyValue::Int(i64::MAX),
            KeyValue::String(String::new()),
            KeyValue::Array(vec![]),
        ];
        for v in &concrete {
            assert!(KeyValue::MinKey < *v);
            assert!(*v < KeyValue::MaxKey);
        }
        assert!(KeyValue::MinKey < KeyValue::MaxKey);
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(KeyValue::from_json(&json!(null)), KeyValue::Null);
        assert_eq!(KeyValue::from_json(&json!(true)), KeyValue::Bool(true));
        assert_eq!(KeyValue::from_json(&json!(42)), KeyValue::Int(42));
        assert_eq!(KeyValue::from_json(&json!(2.5)), KeyValue::Float(2.5));
        assert_eq!(
            KeyValue::from_json(&json!("hello")),
            KeyValue::String("hello".into())
        );
    }

    #[test]
    fn test_from_json_extended_literals() {
        assert_eq!(KeyValue::from_json(&json!({ "$minKey": 1 })), KeyValue::MinKey);
        assert_eq!(KeyValue::from_json(&json!({ "$maxKey": 1 })), KeyValue::MaxKey);

        let date = KeyValue::from_json(&json!({ "$date": "2026-01-15T00:00:00Z" }));
        assert!(matches!(date, KeyValue::DateTime(_)));

        // a malformed $date falls back to a plain object
        let not_a_date = KeyValue::from_json(&json!({ "$date": "yesterday" }));
        assert!(matches!(not_a_date, KeyValue::Object(_)));
    }

    #[test]
    fn test_array_and_object_comparison() {
        let short = KeyValue::from_json(&json!([1, 2]));
        let long = KeyValue::from_json(&json!([1, 2, 0]));
        assert!(short < long);

        let a = KeyValue::from_json(&json!({ "x": 1 }));
        let b = KeyValue::from_json(&json!({ "x": 2 }));
        assert!(a < b);
        assert_eq!(a, KeyValue::from_json(&json!({ "x": 1.0 })));
    }

    #[test]
    fn test_to_json_round_trip() {
        for v in [
            json!(null),
            json!(false),
            json!(7),
            json!("text"),
            json!([1, "two", null]),
            json!({ "nested": { "k": 1 } }),
        ] {
            assert_eq!(KeyValue::from_json(&v).to_json(), v);
        }
        assert_eq!(KeyValue::MinKey.to_json(), json!({ "$minKey": 1 }));
    }
}

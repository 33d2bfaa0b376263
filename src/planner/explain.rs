//! Explain output for index bound projections.
//!
//! Produces a deterministic, human-readable report of the key
//! intervals a projection will scan. The same projection always
//! renders the same report.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::index::KeyPattern;

use super::vector::FieldRangeVector;

/// Bound report for one projection
#[derive(Debug, Clone, Serialize)]
pub struct ExplainBounds {
    /// Index key pattern the ranges are aligned to
    pub index: KeyPattern,
    /// Scan direction, +1 or -1
    pub direction: i32,
    /// Number of boxes in the interval cross product
    pub size: u64,
    /// Per-field `[lower, upper]` bound pairs
    pub bounds: Value,
    /// Compound start key of the traversal
    pub start_key: Vec<Value>,
    /// Compound end key of the traversal
    pub end_key: Vec<Value>,
}

impl ExplainBounds {
    /// Creates a report from a projection
    pub fn from_vector(vector: &FieldRangeVector) -> Self {
        Self {
            index: vector.key_pattern().clone(),
            direction: vector.direction(),
            size: vector.size(),
            bounds: vector.obj(),
            start_key: vector.start_key().iter().map(|v| v.to_json()).collect(),
            end_key: vector.end_key().iter().map(|v| v.to_json()).collect(),
        }
    }
}

impl fmt::Display for ExplainBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== INDEX BOUNDS ===")?;
        let pattern: Vec<String> = self
            .index
            .fields()
            .iter()
            .map(|c| format!("{}:{}", c.name, c.sign))
            .collect();
        writeln!(f, "Index: {{{}}}", pattern.join(", "))?;
        writeln!(f, "Direction: {}", self.direction)?;
        writeln!(f, "Ranges: {}", self.size)?;
        writeln!(f, "Bounds: {}", self.bounds)?;
        writeln!(
            f,
            "Start Key: {}",
            Value::Array(self.start_key.clone())
        )?;
        writeln!(f, "End Key: {}", Value::Array(self.end_key.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FieldRangeSet;
    use serde_json::json;

    fn vector(query: serde_json::Value, pattern: &KeyPattern) -> FieldRangeVector {
        let frs = FieldRangeSet::new("test.docs", &query).unwrap();
        FieldRangeVector::new(&frs, pattern, 1).unwrap()
    }

    #[test]
    fn test_explain_content() {
        let v = vector(
            json!({ "a": 1, "b": { "$gt": 2, "$lte": 5 } }),
            &KeyPattern::ascending(["a", "b"]),
        );
        let explain = ExplainBounds::from_vector(&v);

        assert_eq!(explain.size, 1);
        assert_eq!(explain.bounds, json!({ "a": [[1, 1]], "b": [[2, 5]] }));
        assert_eq!(explain.start_key, vec![json!(1), json!(2)]);

        let output = format!("{}", explain);
        assert!(output.contains("INDEX BOUNDS"));
        assert!(output.contains("a:1"));
        assert!(output.contains("Direction: 1"));
    }

    #[test]
    fn test_explain_deterministic() {
        let v = vector(
            json!({ "a": { "$in": [3, 1, 2] } }),
            &KeyPattern::ascending(["a"]),
        );
        let first = format!("{}", ExplainBounds::from_vector(&v));
        let second = format!("{}", ExplainBounds::from_vector(&v));
        assert_eq!(first, second);
    }
}

//! Query pattern fingerprints.
//!
//! Two queries that constrain the same fields the same way and request
//! the same sort should reuse the same cached plan. The fingerprint
//! records, per constrained field, only the kind of constraint, plus a
//! sort normalized so that a spec and its exact reverse land on the
//! same pattern.

use std::collections::BTreeMap;

use crate::index::KeyPattern;

/// Kind of constraint a field range expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatternKind {
    /// Single-value equality (or enumerated set)
    Equality,
    /// Bounded from below only
    LowerBound,
    /// Bounded from above only
    UpperBound,
    /// Bounded on both sides
    UpperAndLowerBound,
}

/// Normalized fingerprint of a query's constraint shape and sort.
///
/// Ordering is lexicographic over the (field, kind) entries and then
/// over the normalized sort, which gives the total order a plan-cache
/// map needs. Equality is agreement in both.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryPattern {
    field_kinds: BTreeMap<String, PatternKind>,
    sort: Vec<(String, i32)>,
}

impl QueryPattern {
    pub(crate) fn new(field_kinds: BTreeMap<String, PatternKind>, sort: &KeyPattern) -> Self {
        Self {
            field_kinds,
            sort: Self::normalize_sort(sort),
        }
    }

    /// The first sort key fixes the canonical direction; every
    /// component records its sign relative to it. A sort and its exact
    /// reverse normalize identically.
    fn normalize_sort(sort: &KeyPattern) -> Vec<(String, i32)> {
        let Some(first) = sort.fields().first() else {
            return Vec::new();
        };
        let direction = first.sign;
        sort.fields()
            .iter()
            .map(|f| (f.name.clone(), f.sign * direction))
            .collect()
    }

    /// Constraint kinds per field, in field-name order
    pub fn field_kinds(&self) -> &BTreeMap<String, PatternKind> {
        &self.field_kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FieldRangeSet;
    use serde_json::json;

    fn pattern(query: serde_json::Value, sort: &KeyPattern) -> QueryPattern {
        FieldRangeSet::new("test.docs", &query)
            .unwrap()
            .pattern(sort)
    }

    #[test]
    fn test_field_kinds() {
        let p = pattern(
            json!({
                "a": 1,
                "b": { "$gt": 0 },
                "c": { "$lt": 9 },
                "d": { "$gt": 0, "$lt": 9 }
            }),
            &KeyPattern::default(),
        );
        let kinds: Vec<(&str, PatternKind)> = p
            .field_kinds()
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", PatternKind::Equality),
                ("b", PatternKind::LowerBound),
                ("c", PatternKind::UpperBound),
                ("d", PatternKind::UpperAndLowerBound),
            ]
        );
    }

    #[test]
    fn test_same_shape_same_pattern() {
        let sort = KeyPattern::new([("a", 1)]);
        let p1 = pattern(json!({ "a": 1, "b": { "$gt": 2 } }), &sort);
        let p2 = pattern(json!({ "a": 99, "b": { "$gt": -7 } }), &sort);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_different_kind_different_pattern() {
        let sort = KeyPattern::default();
        let p1 = pattern(json!({ "a": 1 }), &sort);
        let p2 = pattern(json!({ "a": { "$gt": 1 } }), &sort);
        assert_ne!(p1, p2);
        // the order is total: exactly one direction holds
        assert!((p1 < p2) ^ (p2 < p1));
    }

    #[test]
    fn test_sort_and_reverse_sort_normalize_identically() {
        let forward = KeyPattern::new([("a", 1), ("b", -1)]);
        let backward = KeyPattern::new([("a", -1), ("b", 1)]);
        let p1 = pattern(json!({ "a": 1 }), &forward);
        let p2 = pattern(json!({ "a": 1 }), &backward);
        assert_eq!(p1, p2);

        let unrelated = KeyPattern::new([("a", 1), ("b", 1)]);
        let p3 = pattern(json!({ "a": 1 }), &unrelated);
        assert_ne!(p1, p3);
    }

    #[test]
    fn test_trivial_fields_excluded() {
        let p1 = pattern(json!({ "a": 1, "b": { "$exists": true } }), &KeyPattern::default());
        let p2 = pattern(json!({ "a": 2 }), &KeyPattern::default());
        assert_eq!(p1, p2);
    }
}

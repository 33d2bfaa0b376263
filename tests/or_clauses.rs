//! Disjunction Tests
//!
//! Clause-at-a-time iteration over $or queries:
//! - popped clauses subtract their bounds from later clauses
//! - fully covered clauses are dropped, never scanned
//! - index-pattern-restricted subtraction only excludes indexed fields

use keyspan::index::KeyPattern;
use keyspan::planner::{FieldRangeOrSet, FieldRangeVector, ScanAdvance};
use keyspan::value::KeyValue;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn or_set(query: serde_json::Value) -> FieldRangeOrSet {
    FieldRangeOrSet::new("test.docs", &query).unwrap()
}

// =============================================================================
// Clause De-duplication Tests
// =============================================================================

/// A duplicated clause is fully subtracted and dropped.
#[test]
fn test_duplicate_clause_dropped() {
    let mut s = or_set(json!({ "$or": [{ "a": 1 }, { "a": 2 }, { "a": 1 }] }));

    // first clause: {a: 1}
    let top = s.top_frs();
    assert_eq!(*top.range("a").min(), KeyValue::Int(1));
    s.pop_or_clause(None);

    // second clause survives: {a: 2} shares nothing with {a: 1}
    assert!(s.more_or_clauses());
    let top = s.top_frs();
    assert_eq!(*top.range("a").min(), KeyValue::Int(2));
    s.pop_or_clause(None);

    // the third clause {a: 1} was fully covered by the first and is
    // gone
    assert!(!s.more_or_clauses());
    assert!(s.or_finished());
}

/// Overlapping ranges shrink instead of disappearing.
#[test]
fn test_overlapping_clause_shrinks() {
    let mut s = or_set(json!({
        "$or": [
            { "a": { "$gte": 0, "$lte": 10 } },
            { "a": { "$gte": 5, "$lte": 20 } }
        ]
    }));
    s.pop_or_clause(None);

    let top = s.top_frs();
    let range = top.range("a");
    // [5,20] minus [0,10] leaves (10,20]
    assert_eq!(*range.min(), KeyValue::Int(10));
    assert!(!range.min_inclusive());
    assert_eq!(*range.max(), KeyValue::Int(20));

    // the original clause bounds stay loose for cheap operations
    let original = s.top_frs_original();
    assert_eq!(*original.range("a").min(), KeyValue::Int(5));
}

/// Restricting subtraction to the index pattern ignores off-index
/// fields.
#[test]
fn test_index_pattern_restricted_subtraction() {
    let query = json!({ "$or": [{ "a": 1, "b": 1 }, { "a": 1, "b": 2 }] });

    // the scan of clause one visited every a=1 key, so clause two has
    // nothing left on an {a} index
    let mut s = or_set(query.clone());
    s.pop_or_clause(Some(&KeyPattern::ascending(["a"])));
    assert!(s.or_finished());

    // on an {a, b} index the clauses occupy different key ranges
    let mut s = or_set(query);
    s.pop_or_clause(Some(&KeyPattern::ascending(["a", "b"])));
    assert!(s.more_or_clauses());
    let top = s.top_frs();
    assert_eq!(*top.range("b").min(), KeyValue::Int(2));
}

/// An empty key pattern subtracts on all fields, like no pattern.
#[test]
fn test_empty_pattern_subtracts_everything() {
    let mut s = or_set(json!({ "$or": [{ "a": 1 }, { "a": 1 }] }));
    s.pop_or_clause(Some(&KeyPattern::default()));
    assert!(s.or_finished());
}

// =============================================================================
// Driver State Tests
// =============================================================================

/// Base conjuncts constrain every clause.
#[test]
fn test_base_set_intersects_clauses() {
    let s = or_set(json!({ "x": { "$gt": 0 }, "$or": [{ "a": 1 }] }));
    let top = s.top_frs();
    assert_eq!(*top.range("x").min(), KeyValue::Int(0));
    assert!(top.range("a").equality());
}

/// or_finished stays false until a present disjunction is consumed.
#[test]
fn test_or_finished_lifecycle() {
    let mut s = or_set(json!({ "$or": [{ "a": 1 }, { "a": 2 }] }));
    assert!(!s.or_finished());
    assert!(s.more_or_clauses());

    s.pop_or_clause(None);
    assert!(!s.or_finished());

    s.pop_or_clause(None);
    assert!(s.or_finished());
    assert!(!s.more_or_clauses());

    // a query without $or never finishes a disjunction
    let plain = or_set(json!({ "a": 1 }));
    assert!(!plain.or_finished());
}

/// Remaining clauses report their simplified forms.
#[test]
fn test_all_clauses_simplified() {
    let s = or_set(json!({ "$or": [{ "a": { "$gt": 1, "$lt": 9 } }, { "b": 2 }] }));
    assert_eq!(
        s.all_clauses_simplified(),
        vec![json!({ "a": { "$gt": 1, "$lt": 9 } }), json!({ "b": 2 })]
    );
}

// =============================================================================
// Duplicate Suppression via matches()
// =============================================================================

/// A document matching an earlier clause's projection is recognized so
/// the scan of a later clause can suppress it.
#[test]
fn test_projection_matches_for_dedup() {
    let mut s = or_set(json!({ "$or": [{ "a": { "$lte": 5 } }, { "b": 7 }] }));
    let pattern = KeyPattern::ascending(["a"]);

    let first = s.top_frs();
    let first_proj = FieldRangeVector::new(&first, &pattern, 1).unwrap();
    s.pop_or_clause(Some(&pattern));

    // this document will turn up in the second clause's scan too; the
    // first projection claims it
    let doc = json!({ "a": 3, "b": 7 });
    assert!(first_proj.matches(&doc));
    assert!(!first_proj.matches(&json!({ "a": 6, "b": 7 })));
}

/// The precise second-clause projection starts where the first ended.
#[test]
fn test_popped_bounds_shift_projection() {
    let mut s = or_set(json!({
        "$or": [
            { "a": { "$gte": 0, "$lte": 10 } },
            { "a": { "$gte": 0, "$lte": 20 } }
        ]
    }));
    s.pop_or_clause(None);

    let second = s.top_frs();
    let proj = FieldRangeVector::new(&second, &KeyPattern::ascending(["a"]), 1).unwrap();
    assert_eq!(proj.start_key(), vec![KeyValue::Int(10)]);
    assert_eq!(proj.end_key(), vec![KeyValue::Int(20)]);

    // a key the first clause already scanned is out of bounds now
    let mut it = proj.iter();
    assert_eq!(it.advance(&[KeyValue::Int(10)]), ScanAdvance::SkipPrefix(1));
    assert!(it.after());
}

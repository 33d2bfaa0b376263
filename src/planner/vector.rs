//! Projection of field ranges onto an index key pattern, and the
//! key-skipping scan iterator.
//!
//! A projection aligns one range per key-pattern component, reversing
//! components whose sort sign disagrees with the scan direction. Each
//! combination of one interval per component is a box in key space;
//! the iterator tells a sorted cursor, for any key it just read,
//! whether to keep scanning, where to jump next, or that no further
//! key can match.

use std::cmp::Ordering;

use serde_json::Value;

use crate::index::KeyPattern;
use crate::value::KeyValue;

use super::errors::{PlannerError, PlannerResult};
use super::limits::MAX_IN_PARTITIONS;
use super::range::FieldRange;
use super::range_set::FieldRangeSet;

/// Per-component field ranges aligned to an index key pattern and scan
/// direction
#[derive(Debug, Clone)]
pub struct FieldRangeVector {
    ranges: Vec<FieldRange>,
    key_pattern: KeyPattern,
    direction: i32,
}

/// Instruction for a sorted cursor after reading a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAdvance {
    /// No further key can match; stop scanning
    Done,
    /// The key is inside the current box; continue to the next sorted
    /// key
    Next,
    /// Seek to the key composed of the first `prefix` components of
    /// the current key followed by the iterator's `cmp()` targets
    /// (inclusivity per `inc()`). If `after()` is set, land strictly
    /// past that key.
    SkipPrefix(usize),
}

impl FieldRangeVector {
    /// Projects a constraint set onto an index.
    ///
    /// Components whose sort sign disagrees with the scan direction
    /// take the reversed range. Fails when the interval cross-product
    /// exceeds the partition budget. Fields delegated to a special
    /// index must not be projected here.
    pub fn new(
        frs: &FieldRangeSet,
        key_pattern: &KeyPattern,
        direction: i32,
    ) -> PlannerResult<Self> {
        let direction = if direction >= 0 { 1 } else { -1 };
        let mut ranges = Vec::with_capacity(key_pattern.len());
        for component in key_pattern.fields() {
            let range = frs.range(&component.name);
            if component.sign * direction > 0 {
                ranges.push(range.clone());
            } else {
                ranges.push(range.reversed());
            }
        }
        let vector = Self {
            ranges,
            key_pattern: key_pattern.clone(),
            direction,
        };
        if vector.size() >= MAX_IN_PARTITIONS {
            return Err(PlannerError::in_partition_limit());
        }
        tracing::debug!(size = vector.size(), "projected ranges onto index");
        Ok(vector)
    }

    /// Number of boxes in the cross product of the component intervals
    pub fn size(&self) -> u64 {
        self.ranges
            .iter()
            .fold(1u64, |acc, r| acc.saturating_mul(r.intervals().len() as u64))
    }

    /// Scan direction, +1 or -1
    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// The backing key pattern
    pub fn key_pattern(&self) -> &KeyPattern {
        &self.key_pattern
    }

    /// The projected range of each component, in key-pattern order
    pub fn ranges(&self) -> &[FieldRange] {
        &self.ranges
    }

    fn component_reversed(&self, i: usize) -> bool {
        (self.key_pattern.fields()[i].sign < 0) ^ (self.direction < 0)
    }

    /// Starting point of the whole traversal: the lower bound of each
    /// component's first interval. Empty when the projection admits no
    /// key.
    pub fn start_key(&self) -> Vec<KeyValue> {
        let mut key = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            let Some(interval) = range.intervals().first() else {
                return Vec::new();
            };
            key.push(interval.lower.value.clone());
        }
        key
    }

    /// End point of the whole traversal: the upper bound of each
    /// component's last interval. Empty when the projection admits no
    /// key.
    pub fn end_key(&self) -> Vec<KeyValue> {
        let mut key = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            let Some(interval) = range.intervals().last() else {
                return Vec::new();
            };
            key.push(interval.upper.value.clone());
        }
        key
    }

    /// Client-readable report: per field, the list of `[lower, upper]`
    /// bound pairs
    pub fn obj(&self) -> Value {
        let mut doc = serde_json::Map::new();
        for (component, range) in self.key_pattern.fields().iter().zip(&self.ranges) {
            let pairs: Vec<Value> = range
                .intervals()
                .iter()
                .map(|fi| {
                    Value::Array(vec![fi.lower.value.to_json(), fi.upper.value.to_json()])
                })
                .collect();
            doc.insert(component.name.clone(), Value::Array(pairs));
        }
        Value::Object(doc)
    }

    /// Returns true iff the document's indexed values all fall within
    /// the projected ranges, i.e. iff a scan of this projection would
    /// return the document. Used to suppress duplicates across
    /// disjunction clauses.
    pub fn matches(&self, doc: &Value) -> bool {
        for (i, component) in self.key_pattern.fields().iter().enumerate() {
            let value = doc
                .get(&component.name)
                .map(KeyValue::from_json)
                .unwrap_or(KeyValue::Null);
            if !self.matches_element(&value, i, !self.component_reversed(i)) {
                return false;
            }
        }
        true
    }

    fn matches_element(&self, e: &KeyValue, i: usize, forward: bool) -> bool {
        let (l, _) = self.matching_low_element(e, i, forward);
        l % 2 == 0
    }

    /// Binary search over the 2n interval endpoints of component `i`,
    /// oriented by `forward`. Returns the position of `e` among them:
    /// an even result means `e` lies inside interval `result / 2`; an
    /// odd result means it falls in the gap after that interval's
    /// upper bound (-1: before everything). `low_equality` reports
    /// that `e` landed exactly on an exclusive lower bound.
    fn matching_low_element(&self, e: &KeyValue, i: usize, forward: bool) -> (isize, bool) {
        let intervals = self.ranges[i].intervals();
        let mut l: isize = -1;
        let mut h: isize = intervals.len() as isize * 2;
        while l + 1 < h {
            let m = (l + h) / 2;
            let interval = &intervals[(m / 2) as usize];
            let (bound_value, bound_inclusive) = if m % 2 == 0 {
                (&interval.lower.value, interval.lower.inclusive)
            } else {
                (&interval.upper.value, interval.upper.inclusive)
            };
            let cmp = if forward {
                bound_value.cmp(e)
            } else {
                e.cmp(bound_value)
            };
            match cmp {
                Ordering::Less => l = m,
                Ordering::Greater => h = m,
                Ordering::Equal => {
                    let low_equality = m % 2 == 0 && !bound_inclusive;
                    let mut ret = m;
                    // landing on an excluded endpoint counts as the
                    // adjacent gap
                    if (m % 2 == 0 && !bound_inclusive) || (m % 2 == 1 && bound_inclusive) {
                        ret -= 1;
                    }
                    return (ret, low_equality);
                }
            }
        }
        (l, false)
    }

    /// Creates a scan iterator borrowing this projection
    pub fn iter(&self) -> FieldRangeVectorIterator<'_> {
        FieldRangeVectorIterator::new(self)
    }
}

/// Iterator matching a stream of sorted index keys against a
/// projection, producing skip instructions.
///
/// State per component: the index of the interval the scan is
/// currently inside (-1 when unknown), and the seek target (`cmp`,
/// `inc`) backing the most recent `SkipPrefix` instruction.
#[derive(Debug)]
pub struct FieldRangeVectorIterator<'a> {
    v: &'a FieldRangeVector,
    i: Vec<isize>,
    cmp: Vec<KeyValue>,
    inc: Vec<bool>,
    after: bool,
}

impl<'a> FieldRangeVectorIterator<'a> {
    fn new(v: &'a FieldRangeVector) -> Self {
        let n = v.ranges.len();
        Self {
            v,
            i: vec![-1; n],
            cmp: vec![KeyValue::MinKey; n],
            inc: vec![false; n],
            after: false,
        }
    }

    /// Seek targets for the components past a `SkipPrefix` prefix
    pub fn cmp(&self) -> &[KeyValue] {
        &self.cmp
    }

    /// Inclusivity flags parallel to `cmp()`
    pub fn inc(&self) -> &[bool] {
        &self.inc
    }

    /// True iff the last `SkipPrefix` seek must land strictly past the
    /// composed key
    pub fn after(&self) -> bool {
        self.after
    }

    /// True while the leading component has intervals left
    pub fn ok(&self) -> bool {
        !self.i.is_empty()
            && self.i[0] < self.v.ranges[0].intervals().len() as isize
    }

    fn intervals_len(&self, i: usize) -> isize {
        self.v.ranges[i].intervals().len() as isize
    }

    fn set_zero(&mut self, from: usize) {
        for j in from..self.i.len() {
            self.i[j] = 0;
        }
    }

    fn set_minus(&mut self, from: usize) {
        for j in from..self.i.len() {
            self.i[j] = -1;
        }
    }

    /// Seek to component `i`'s current interval lower bound, with the
    /// tail components at their first interval lower bounds
    fn set_cmp_from(&mut self, i: usize) {
        let interval = &self.v.ranges[i].intervals()[self.i[i] as usize];
        self.cmp[i] = interval.lower.value.clone();
        self.inc[i] = interval.lower.inclusive;
        for j in (i + 1)..self.i.len() {
            let first = &self.v.ranges[j].intervals()[0];
            self.cmp[j] = first.lower.value.clone();
            self.inc[j] = first.lower.inclusive;
        }
    }

    /// Fill the tail seek targets with the traversal-order extremes,
    /// used with `after` to skip everything sharing a key prefix
    fn set_superlative(&mut self, from: usize) {
        for j in from..self.i.len() {
            self.cmp[j] = if self.v.component_reversed(j) {
                KeyValue::MinKey
            } else {
                KeyValue::MaxKey
            };
            self.inc[j] = true;
        }
    }

    /// Steps to the next box of the interval grid, rolling over like
    /// an odometer. A fresh iterator steps to the first box. Returns
    /// `ok()`.
    pub fn advance_cell(&mut self) -> bool {
        if self.i.is_empty() || self.v.ranges.iter().any(|r| r.intervals().is_empty()) {
            return false;
        }
        if self.i.iter().any(|&x| x < 0) {
            for x in &mut self.i {
                if *x < 0 {
                    *x = 0;
                }
            }
            return self.ok();
        }
        let mut idx = self.i.len() as isize - 1;
        while idx >= 0 && self.i[idx as usize] >= self.intervals_len(idx as usize) - 1 {
            idx -= 1;
        }
        if idx >= 0 {
            self.i[idx as usize] += 1;
            self.set_zero(idx as usize + 1);
        } else {
            self.i[0] = self.intervals_len(0);
        }
        self.ok()
    }

    /// Lower bounds of the current box, one value per component
    pub fn start_key(&self) -> Vec<KeyValue> {
        self.i
            .iter()
            .enumerate()
            .map(|(j, &pos)| {
                assert!(pos >= 0 && pos < self.intervals_len(j), "no current box");
                self.v.ranges[j].intervals()[pos as usize].lower.value.clone()
            })
            .collect()
    }

    /// Upper bounds of the current box, one value per component
    pub fn end_key(&self) -> Vec<KeyValue> {
        self.i
            .iter()
            .enumerate()
            .map(|(j, &pos)| {
                assert!(pos >= 0 && pos < self.intervals_len(j), "no current box");
                self.v.ranges[j].intervals()[pos as usize].upper.value.clone()
            })
            .collect()
    }

    /// Matches the key a sorted cursor just read against the
    /// projection and returns how the cursor should proceed.
    ///
    /// Walking the components in order, each is located within its
    /// interval list. A component sitting below its next interval
    /// produces a seek to that interval's lower bound; one sitting
    /// past its last interval rolls the nearest preceding
    /// non-exhausted component forward; a component landing exactly on
    /// an excluded bound produces a strictly-past seek. Only when
    /// every component lies inside an interval does the cursor simply
    /// continue.
    pub fn advance(&mut self, curr: &[KeyValue]) -> ScanAdvance {
        let n = self.i.len();
        if n == 0 || self.v.ranges.iter().any(|r| r.intervals().is_empty()) {
            return ScanAdvance::Done;
        }
        debug_assert_eq!(curr.len(), n, "key arity must match the key pattern");
        // nearest component that still has somewhere to go if a later
        // one exhausts
        let mut latest_non_endpoint: isize = -1;
        for i in 0..n {
            if i > 0 {
                let prev = &self.v.ranges[i - 1].intervals()[self.i[i - 1] as usize];
                if !prev.is_equality() {
                    // a ranged predecessor says nothing about where
                    // this component stands
                    self.set_minus(i);
                }
            }
            let reverse = self.v.component_reversed(i);
            let jj = &curr[i];
            let mut eq = false;
            if self.i[i] == -1 {
                let (l, low_equality) = self.v.matching_low_element(jj, i, !reverse);
                if l % 2 == 0 {
                    // inside a valid interval
                    self.i[i] = l / 2;
                    let diff = self.intervals_len(i) - self.i[i];
                    if diff > 1 {
                        latest_non_endpoint = i as isize;
                    } else if diff == 1 {
                        let upper =
                            &self.v.ranges[i].intervals()[self.i[i] as usize].upper.value;
                        if upper != jj {
                            latest_non_endpoint = i as isize;
                        }
                    }
                    continue;
                }
                // in a gap; find out whether anything lies ahead
                if l == self.intervals_len(i) * 2 - 1 {
                    // past the last interval for this component
                    if latest_non_endpoint == -1 {
                        return ScanAdvance::Done;
                    }
                    let roll = latest_non_endpoint as usize + 1;
                    self.set_zero(roll);
                    self.set_superlative(roll);
                    self.after = true;
                    return ScanAdvance::SkipPrefix(roll);
                }
                self.i[i] = (l + 1) / 2;
                if low_equality {
                    // exactly on an excluded lower bound: move
                    // strictly past this prefix
                    self.set_superlative(i + 1);
                    self.after = true;
                    return ScanAdvance::SkipPrefix(i + 1);
                }
                self.set_cmp_from(i);
                self.after = false;
                return ScanAdvance::SkipPrefix(i);
            }
            // cursor known for this component; walk forward from it
            let mut first = true;
            while self.i[i] < self.intervals_len(i) {
                let interval = &self.v.ranges[i].intervals()[self.i[i] as usize];
                let mut x = interval.upper.value.cmp(jj);
                if reverse {
                    x = x.reverse();
                }
                if x == Ordering::Equal && interval.upper.inclusive {
                    eq = true;
                    break;
                }
                if x == Ordering::Greater {
                    if i == 0 && first {
                        // the leading component of a sorted stream
                        // never moves backward; no lower bound check
                        break;
                    }
                    if !interval.is_equality() {
                        x = interval.lower.value.cmp(jj);
                        if reverse {
                            x = x.reverse();
                        }
                    }
                    if x == Ordering::Equal && !interval.lower.inclusive {
                        self.set_zero(i + 1);
                        self.set_superlative(i + 1);
                        self.after = true;
                        return ScanAdvance::SkipPrefix(i + 1);
                    }
                    if x == Ordering::Greater {
                        // below the interval: seek up to its lower
                        // bound
                        self.set_zero(i + 1);
                        self.set_cmp_from(i);
                        self.after = false;
                        return ScanAdvance::SkipPrefix(i);
                    }
                    break;
                }
                // above this interval; try the next one
                self.i[i] += 1;
                self.set_zero(i + 1);
                first = false;
            }
            let diff = self.intervals_len(i) - self.i[i];
            if diff > 1 || (!eq && diff == 1) {
                latest_non_endpoint = i as isize;
            } else if diff == 0 {
                // exhausted this component
                if latest_non_endpoint == -1 {
                    return ScanAdvance::Done;
                }
                let roll = latest_non_endpoint as usize + 1;
                self.set_zero(roll);
                self.set_superlative(roll);
                self.after = true;
                return ScanAdvance::SkipPrefix(roll);
            }
        }
        ScanAdvance::Next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frs(query: serde_json::Value) -> FieldRangeSet {
        FieldRangeSet::new("test.docs", &query).unwrap()
    }

    fn key(values: &[i64]) -> Vec<KeyValue> {
        values.iter().map(|&v| KeyValue::Int(v)).collect()
    }

    #[test]
    fn test_equality_and_range_projection() {
        let set = frs(json!({ "a": 1, "b": { "$gt": 2, "$lte": 5 } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();

        assert_eq!(v.size(), 1);
        assert_eq!(v.start_key(), key(&[1, 2]));
        assert_eq!(v.end_key(), key(&[1, 5]));
        assert_eq!(
            v.obj(),
            json!({ "a": [[1, 1]], "b": [[2, 5]] })
        );
    }

    #[test]
    fn test_in_projection_size() {
        let set = frs(json!({ "a": { "$in": [1, 2, 3] }, "b": { "$in": [4, 5] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();
        assert_eq!(v.size(), 6);
    }

    #[test]
    fn test_reversed_component() {
        let set = frs(json!({ "a": { "$in": [1, 2] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), -1).unwrap();
        assert_eq!(v.start_key(), key(&[2]));
        assert_eq!(v.end_key(), key(&[1]));
    }

    #[test]
    fn test_mixed_sign_pattern() {
        let set = frs(json!({ "a": 1, "b": 2 }));
        let v =
            FieldRangeVector::new(&set, &KeyPattern::new([("a", 1), ("b", -1)]), 1).unwrap();
        assert_eq!(v.start_key(), key(&[1, 2]));
        assert_eq!(v.end_key(), key(&[1, 2]));
        assert_eq!(v.size(), 1);
    }

    #[test]
    fn test_empty_projection() {
        let set = frs(json!({ "a": { "$exists": false } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), 1).unwrap();
        assert_eq!(v.size(), 0);
        assert!(v.start_key().is_empty());
        let mut it = v.iter();
        assert_eq!(it.advance(&key(&[1])), ScanAdvance::Done);
    }

    #[test]
    fn test_matches_document() {
        let set = frs(json!({ "a": 1, "b": { "$gt": 2, "$lte": 5 } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();

        assert!(v.matches(&json!({ "a": 1, "b": 3 })));
        assert!(v.matches(&json!({ "a": 1, "b": 5 })));
        assert!(!v.matches(&json!({ "a": 1, "b": 2 })));
        assert!(!v.matches(&json!({ "a": 2, "b": 3 })));
        assert!(!v.matches(&json!({ "b": 3 })));
    }

    #[test]
    fn test_matches_with_reversed_component() {
        let set = frs(json!({ "a": { "$gte": 1, "$lte": 9 } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::new([("a", -1)]), 1).unwrap();
        assert!(v.matches(&json!({ "a": 5 })));
        assert!(!v.matches(&json!({ "a": 10 })));
    }

    #[test]
    fn test_partition_budget_enforced() {
        let big: Vec<i64> = (0..1_000).collect();
        let set = frs(json!({ "a": { "$in": big.clone() }, "b": { "$in": big } }));
        let err =
            FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap_err();
        assert_eq!(err.code().code(), 2304);
    }

    #[test]
    fn test_advance_inside_box() {
        let set = frs(json!({ "a": { "$in": [1, 2, 3] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), 1).unwrap();
        let mut it = v.iter();
        assert_eq!(it.advance(&key(&[1])), ScanAdvance::Next);
    }

    #[test]
    fn test_advance_seeks_forward_between_intervals() {
        let set = frs(json!({ "a": { "$in": [1, 3, 5] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), 1).unwrap();
        let mut it = v.iter();

        // below everything: seek to the first interval
        assert_eq!(it.advance(&key(&[0])), ScanAdvance::SkipPrefix(0));
        assert_eq!(it.cmp()[0], KeyValue::Int(1));
        assert!(it.inc()[0]);
        assert!(!it.after());

        // between 1 and 3: seek to 3
        assert_eq!(it.advance(&key(&[2])), ScanAdvance::SkipPrefix(0));
        assert_eq!(it.cmp()[0], KeyValue::Int(3));

        // past everything: done
        assert_eq!(it.advance(&key(&[6])), ScanAdvance::Done);
    }

    #[test]
    fn test_advance_excluded_lower_bound_skips_past() {
        let set = frs(json!({ "a": { "$gt": 2, "$lte": 5 } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), 1).unwrap();
        let mut it = v.iter();

        // exactly on the exclusive bound: skip strictly past it
        assert_eq!(it.advance(&key(&[2])), ScanAdvance::SkipPrefix(1));
        assert!(it.after());
    }

    #[test]
    fn test_advance_excluded_bound_at_depth() {
        let set = frs(json!({ "a": { "$in": [1, 2] }, "b": { "$gt": 7, "$lt": 9 } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();
        let mut it = v.iter();

        // a matches, b sits on its exclusive lower bound: skip past
        // the (a, b) prefix
        assert_eq!(it.advance(&key(&[1, 7])), ScanAdvance::SkipPrefix(2));
        assert!(it.after());

        // a matches, b above its box: roll a forward and skip past its
        // current value
        assert_eq!(it.advance(&key(&[1, 9])), ScanAdvance::SkipPrefix(1));
        assert!(it.after());

        // a matches, b below its box: seek to b's lower bound
        assert_eq!(it.advance(&key(&[2, 0])), ScanAdvance::SkipPrefix(1));
        assert_eq!(it.cmp()[1], KeyValue::Int(7));
        assert!(!it.inc()[1]);
        assert!(!it.after());

        // everything exhausted
        assert_eq!(it.advance(&key(&[2, 9])), ScanAdvance::Done);
    }

    #[test]
    fn test_advance_rolls_leading_component() {
        let set = frs(json!({ "a": { "$in": [1, 2] }, "b": 5 }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();
        let mut it = v.iter();

        // a=1 matched, b past its equality: roll a to its next value
        assert_eq!(it.advance(&key(&[1, 6])), ScanAdvance::SkipPrefix(1));
        assert!(it.after());

        // b below its equality: seek to it
        assert_eq!(it.advance(&key(&[2, 1])), ScanAdvance::SkipPrefix(1));
        assert_eq!(it.cmp()[1], KeyValue::Int(5));
        assert!(it.inc()[1]);

        assert_eq!(it.advance(&key(&[2, 5])), ScanAdvance::Next);
        assert_eq!(it.advance(&key(&[2, 6])), ScanAdvance::Done);
    }

    #[test]
    fn test_advance_cell_walks_grid() {
        let set = frs(json!({ "a": { "$in": [1, 2] }, "b": { "$in": [5, 6] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a", "b"]), 1).unwrap();
        let mut it = v.iter();

        let mut cells = Vec::new();
        while it.advance_cell() {
            cells.push(it.start_key());
        }
        assert_eq!(
            cells,
            vec![key(&[1, 5]), key(&[1, 6]), key(&[2, 5]), key(&[2, 6])]
        );
    }

    #[test]
    fn test_descending_scan_visits_in_reverse() {
        let set = frs(json!({ "a": { "$in": [1, 2, 3] } }));
        let v = FieldRangeVector::new(&set, &KeyPattern::ascending(["a"]), -1).unwrap();
        let mut it = v.iter();

        // the stream arrives descending: 3, 2, 1
        assert_eq!(it.advance(&key(&[3])), ScanAdvance::Next);
        let mut it = v.iter();
        assert_eq!(it.advance(&key(&[2])), ScanAdvance::Next);
        // a key below the remaining intervals (descending order) seeks
        // onward
        let mut it = v.iter();
        assert_eq!(it.advance(&key(&[4])), ScanAdvance::SkipPrefix(0));
        assert_eq!(it.cmp()[0], KeyValue::Int(3));
    }
}

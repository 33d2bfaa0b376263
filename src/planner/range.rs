//! Per-field constraint ranges.
//!
//! A `FieldRange` is an ordered list of disjoint, non-touching,
//! nonempty intervals describing every value a field may take. The
//! algebra here (intersection, union, difference, subset, reversal) is
//! what lets conjunctions tighten ranges, disjunctions widen them, and
//! disjunction de-duplication carve already-scanned values out.
//!
//! Invariants maintained by every operation:
//! - intervals are sorted by lower bound
//! - no two intervals overlap or touch at a mutually included endpoint
//! - every interval admits at least one value
//!
//! The empty range (no intervals) matches nothing.

use std::cmp::Ordering;
use std::ops::{BitAndAssign, BitOrAssign, SubAssign};
use std::sync::OnceLock;

use crate::value::KeyValue;

use super::interval::{FieldBound, FieldInterval};

/// Ordered, disjoint intervals of admissible values for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRange {
    intervals: Vec<FieldInterval>,
    special: Option<String>,
}

static TRIVIAL_RANGE: OnceLock<FieldRange> = OnceLock::new();

/// Process-wide universal range, shared read-only by every plan for
/// fields a query does not constrain.
pub(crate) fn trivial_range() -> &'static FieldRange {
    TRIVIAL_RANGE.get_or_init(FieldRange::universal)
}

impl FieldRange {
    /// The range admitting every value
    pub fn universal() -> Self {
        Self {
            intervals: vec![FieldInterval::new(
                FieldBound::inclusive(KeyValue::MinKey),
                FieldBound::inclusive(KeyValue::MaxKey),
            )],
            special: None,
        }
    }

    /// The range admitting no value
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
            special: None,
        }
    }

    /// The single-value range `[value, value]`
    pub fn equality_of(value: impl Into<KeyValue>) -> Self {
        Self {
            intervals: vec![FieldInterval::point(value)],
            special: None,
        }
    }

    /// A single-interval range; empty if the bounds admit nothing
    pub fn bounded(lower: FieldBound, upper: FieldBound) -> Self {
        let interval = FieldInterval::new(lower, upper);
        Self {
            intervals: if interval.is_valid() {
                vec![interval]
            } else {
                Vec::new()
            },
            special: None,
        }
    }

    /// Builds a range from arbitrary interval pieces, restoring the
    /// ordering invariants
    pub fn from_intervals(intervals: Vec<FieldInterval>) -> Self {
        Self {
            intervals: normalized(intervals),
            special: None,
        }
    }

    /// Returns the intervals in order
    pub fn intervals(&self) -> &[FieldInterval] {
        &self.intervals
    }

    /// Returns true iff the range matches no value
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Empties the range so it matches no value
    pub fn make_empty(&mut self) {
        self.intervals.clear();
    }

    /// Returns the tag delegating this field to a non-ordinary index,
    /// if any
    pub fn special(&self) -> Option<&str> {
        self.special.as_deref()
    }

    pub(crate) fn set_special(&mut self, tag: impl Into<String>) {
        self.special = Some(tag.into());
    }

    /// Smallest admissible bound value. The range must not be empty.
    pub fn min(&self) -> &KeyValue {
        assert!(!self.is_empty(), "min() on an empty range");
        &self.intervals[0].lower.value
    }

    /// Largest admissible bound value. The range must not be empty.
    pub fn max(&self) -> &KeyValue {
        assert!(!self.is_empty(), "max() on an empty range");
        &self.intervals[self.intervals.len() - 1].upper.value
    }

    /// Whether the smallest bound is itself admitted. The range must
    /// not be empty.
    pub fn min_inclusive(&self) -> bool {
        assert!(!self.is_empty(), "min_inclusive() on an empty range");
        self.intervals[0].lower.inclusive
    }

    /// Whether the largest bound is itself admitted. The range must
    /// not be empty.
    pub fn max_inclusive(&self) -> bool {
        assert!(!self.is_empty(), "max_inclusive() on an empty range");
        self.intervals[self.intervals.len() - 1].upper.inclusive
    }

    /// Returns true iff the range admits exactly one value
    pub fn equality(&self) -> bool {
        !self.is_empty()
            && self.min() == self.max()
            && self.min_inclusive()
            && self.max_inclusive()
    }

    /// Returns true iff every interval is an equality, i.e. the range
    /// enumerates a finite set of values
    pub fn in_query(&self) -> bool {
        !self.is_empty() && self.intervals.iter().all(FieldInterval::is_equality)
    }

    /// Returns true iff the range excludes at least one value
    pub fn nontrivial(&self) -> bool {
        !self.is_empty()
            && !(self.intervals.len() == 1
                && *self.min() == KeyValue::MinKey
                && *self.max() == KeyValue::MaxKey)
    }

    /// Returns true iff the value lies inside some interval
    pub fn contains(&self, value: &KeyValue) -> bool {
        self.intervals.iter().any(|i| i.contains(value))
    }

    /// Makes every endpoint non-inclusive
    pub fn set_exclusive_bounds(&mut self) {
        for interval in &mut self.intervals {
            interval.lower.inclusive = false;
            interval.upper.inclusive = false;
        }
        self.intervals.retain(FieldInterval::is_valid);
    }

    /// Produces the range traversed in the opposite direction: the
    /// interval sequence is reversed and each interval's bounds are
    /// swapped. The result is ordered for a descending scan and does
    /// not satisfy the ascending invariants.
    ///
    /// Ranges delegated to a special index cannot be reversed.
    pub fn reversed(&self) -> FieldRange {
        assert!(
            self.special.is_none(),
            "cannot reverse a range delegated to a special index"
        );
        FieldRange {
            intervals: self
                .intervals
                .iter()
                .rev()
                .map(|i| FieldInterval::new(i.upper.clone(), i.lower.clone()))
                .collect(),
            special: None,
        }
    }

    /// Returns true iff every interval of `self` lies inside some
    /// interval of `other`
    pub fn is_subset_of(&self, other: &FieldRange) -> bool {
        let mut j = 0;
        'next: for a in &self.intervals {
            while j < other.intervals.len() {
                let b = &other.intervals[j];
                if b.upper.cmp_as_upper(&a.upper) == Ordering::Less {
                    // b ends before a does; a cannot fit in it or in
                    // anything earlier
                    j += 1;
                    continue;
                }
                if b.lower.cmp_as_lower(&a.lower) == Ordering::Greater {
                    return false;
                }
                continue 'next;
            }
            return false;
        }
        true
    }

    fn take_special(&mut self, other: &FieldRange) {
        if self.special.is_none() {
            self.special = other.special.clone();
        }
    }
}

/// Restores the range invariants over arbitrary valid pieces: sort by
/// lower bound, then sweep and coalesce anything overlapping or
/// touching at an included endpoint.
fn normalized(mut intervals: Vec<FieldInterval>) -> Vec<FieldInterval> {
    intervals.retain(FieldInterval::is_valid);
    intervals.sort_by(|a, b| {
        a.lower
            .cmp_as_lower(&b.lower)
            .then_with(|| a.upper.cmp_as_upper(&b.upper))
    });
    let mut out: Vec<FieldInterval> = Vec::with_capacity(intervals.len());
    for next in intervals {
        if let Some(last) = out.last_mut() {
            let at_edge = next.lower.value.cmp(&last.upper.value);
            let joins = at_edge == Ordering::Less
                || (at_edge == Ordering::Equal
                    && (next.lower.inclusive || last.upper.inclusive));
            if joins {
                if last.upper.cmp_as_upper(&next.upper) == Ordering::Less {
                    last.upper = next.upper;
                }
                continue;
            }
        }
        out.push(next);
    }
    out
}

/// Subtracts `cut` from `piece`, appending up to two residual
/// intervals. Inclusivity flips at each cut point.
fn subtract_interval(piece: &FieldInterval, cut: &FieldInterval, out: &mut Vec<FieldInterval>) {
    let mut below_cut = cut.lower.clone();
    below_cut.flip_inclusive();
    let low = FieldInterval::new(
        piece.lower.clone(),
        if piece.upper.cmp_as_upper(&below_cut) == Ordering::Less {
            piece.upper.clone()
        } else {
            below_cut
        },
    );
    if low.is_valid() {
        out.push(low);
    }

    let mut above_cut = cut.upper.clone();
    above_cut.flip_inclusive();
    let high = FieldInterval::new(
        if piece.lower.cmp_as_lower(&above_cut) == Ordering::Greater {
            piece.lower.clone()
        } else {
            above_cut
        },
        piece.upper.clone(),
    );
    if high.is_valid() {
        out.push(high);
    }
}

impl BitAndAssign<&FieldRange> for FieldRange {
    /// Intersection: walk both sorted lists, keeping the overlap of
    /// every crossing pair.
    fn bitand_assign(&mut self, other: &FieldRange) {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let a = &self.intervals[i];
            let b = &other.intervals[j];
            let lower = if a.lower.cmp_as_lower(&b.lower) == Ordering::Greater {
                a.lower.clone()
            } else {
                b.lower.clone()
            };
            let upper = if a.upper.cmp_as_upper(&b.upper) == Ordering::Less {
                a.upper.clone()
            } else {
                b.upper.clone()
            };
            let overlap = FieldInterval::new(lower, upper);
            if overlap.is_valid() {
                out.push(overlap);
            }
            match a.upper.cmp_as_upper(&b.upper) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        self.intervals = out;
        self.take_special(other);
    }
}

impl BitOrAssign<&FieldRange> for FieldRange {
    /// Union: merge both lists and re-normalize.
    fn bitor_assign(&mut self, other: &FieldRange) {
        let mut merged = std::mem::take(&mut self.intervals);
        merged.extend(other.intervals.iter().cloned());
        self.intervals = normalized(merged);
        self.take_special(other);
    }
}

impl SubAssign<&FieldRange> for FieldRange {
    /// Difference: subtract each of `other`'s intervals from every
    /// remaining piece.
    fn sub_assign(&mut self, other: &FieldRange) {
        let mut result = Vec::new();
        for piece in std::mem::take(&mut self.intervals) {
            let mut pieces = vec![piece];
            for cut in &other.intervals {
                let mut next = Vec::new();
                for p in &pieces {
                    subtract_interval(p, cut, &mut next);
                }
                pieces = next;
                if pieces.is_empty() {
                    break;
                }
            }
            result.extend(pieces);
        }
        self.intervals = result;
        self.take_special(other);
    }
}

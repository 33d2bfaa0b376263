//! Bound and interval primitives.
//!
//! A bound is one endpoint of an interval: a value plus an inclusivity
//! flag. Two bounds at the same value still differ depending on whether
//! they act as lower or upper endpoints, so comparison comes in both
//! flavors rather than as a single `Ord`.

use std::cmp::Ordering;

use crate::value::KeyValue;

/// One endpoint of a value interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBound {
    /// Endpoint value
    pub value: KeyValue,
    /// Whether the endpoint itself is admitted
    pub inclusive: bool,
}

impl FieldBound {
    /// Creates a bound
    pub fn new(value: KeyValue, inclusive: bool) -> Self {
        Self { value, inclusive }
    }

    /// Creates an inclusive bound
    pub fn inclusive(value: impl Into<KeyValue>) -> Self {
        Self::new(value.into(), true)
    }

    /// Creates an exclusive bound
    pub fn exclusive(value: impl Into<KeyValue>) -> Self {
        Self::new(value.into(), false)
    }

    /// Toggles the inclusivity flag, as when a bound crosses from one
    /// side of a cut to the other during complement or subtraction
    pub fn flip_inclusive(&mut self) {
        self.inclusive = !self.inclusive;
    }

    /// Orders two bounds acting as lower endpoints. At equal values the
    /// inclusive bound admits more and sorts first.
    pub fn cmp_as_lower(&self, other: &FieldBound) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| match (self.inclusive, other.inclusive) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            })
    }

    /// Orders two bounds acting as upper endpoints. At equal values the
    /// inclusive bound admits more and sorts last.
    pub fn cmp_as_upper(&self, other: &FieldBound) -> Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| match (self.inclusive, other.inclusive) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            })
    }
}

/// A contiguous interval of values between a lower and an upper bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInterval {
    /// Lower endpoint
    pub lower: FieldBound,
    /// Upper endpoint
    pub upper: FieldBound,
}

impl FieldInterval {
    /// Creates an interval from explicit bounds
    pub fn new(lower: FieldBound, upper: FieldBound) -> Self {
        Self { lower, upper }
    }

    /// Creates the single-value interval `[value, value]`
    pub fn point(value: impl Into<KeyValue>) -> Self {
        let value = value.into();
        Self {
            lower: FieldBound::new(value.clone(), true),
            upper: FieldBound::new(value, true),
        }
    }

    /// Returns true iff at least one value lies inside the interval
    pub fn is_valid(&self) -> bool {
        match self.lower.value.cmp(&self.upper.value) {
            Ordering::Less => true,
            Ordering::Equal => self.lower.inclusive && self.upper.inclusive,
            Ordering::Greater => false,
        }
    }

    /// Returns true iff the interval admits exactly one value
    pub fn is_equality(&self) -> bool {
        self.lower.inclusive
            && self.upper.inclusive
            && self.lower.value == self.upper.value
    }

    /// Returns true iff the value lies inside the interval
    pub fn contains(&self, value: &KeyValue) -> bool {
        let above_lower = match value.cmp(&self.lower.value) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower.inclusive,
            Ordering::Less => false,
        };
        if !above_lower {
            return false;
        }
        match value.cmp(&self.upper.value) {
            Ordering::Less => true,
            Ordering::Equal => self.upper.inclusive,
            Ordering::Greater => false,
        }
    }
}

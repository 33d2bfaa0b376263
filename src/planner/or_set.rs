//! Disjunction iteration.
//!
//! A query with a top-level `$or` is scanned one clause at a time, each
//! clause against its own index bounds. Values already covered by an
//! earlier clause's bounds should not be scanned again, so after a
//! clause is popped its original ranges are subtracted from every
//! remaining clause where the nearly-contained rule permits. Clauses
//! whose remaining range can match nothing are dropped outright.

use std::collections::VecDeque;

use serde_json::Value;

use crate::index::KeyPattern;

use super::errors::{PlannerError, PlannerResult};
use super::range_set::FieldRangeSet;

/// Field range sets for the clauses of a top-level disjunction
#[derive(Debug, Clone)]
pub struct FieldRangeOrSet {
    base_set: FieldRangeSet,
    or_sets: VecDeque<FieldRangeSet>,
    original_or_sets: VecDeque<FieldRangeSet>,
    or_found: bool,
}

impl FieldRangeOrSet {
    /// Builds the disjunction state for a query document.
    ///
    /// The non-disjunctive conjuncts form the base set shared by every
    /// clause; flattened `$and` clauses and the complements of `$nor`
    /// clauses land there too. Each `$or` clause contributes two queue
    /// entries: the precise set that later popping will subtract from,
    /// and the original set whose looser bounds are cheaper to
    /// subtract with.
    pub fn new(ns: impl Into<String>, query: &Value) -> PlannerResult<Self> {
        let ns = ns.into();
        let base_set = FieldRangeSet::new(ns.clone(), query)?;
        let mut or_set = Self {
            base_set,
            or_sets: VecDeque::new(),
            original_or_sets: VecDeque::new(),
            or_found: false,
        };
        let Some(clauses) = query.get("$or") else {
            return Ok(or_set);
        };
        let clauses = clauses
            .as_array()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PlannerError::bad_or_clause("$or requires a nonempty array"))?;
        for clause in clauses {
            if !clause.is_object() {
                return Err(PlannerError::bad_or_clause(
                    "$or elements must be documents",
                ));
            }
            let frs = FieldRangeSet::new(ns.clone(), clause)?;
            or_set.or_sets.push_back(frs.clone());
            or_set.original_or_sets.push_back(frs);
        }
        or_set.or_found = true;
        Ok(or_set)
    }

    /// Returns true iff a disjunction was present and every clause has
    /// been processed
    pub fn or_finished(&self) -> bool {
        self.or_found && self.or_sets.is_empty()
    }

    /// Returns true iff clauses remain to scan
    pub fn more_or_clauses(&self) -> bool {
        !self.or_sets.is_empty()
    }

    /// Constraint set for the current clause: the base set intersected
    /// with the precise head
    pub fn top_frs(&self) -> FieldRangeSet {
        let mut result = self.base_set.clone();
        if let Some(front) = self.or_sets.front() {
            result &= front;
        }
        result
    }

    /// Constraint set for the current clause using the original,
    /// pre-subtraction head. The bounds are looser but composed of
    /// fewer intervals, so operations on them are cheaper; use them
    /// whenever precision is not required.
    pub fn top_frs_original(&self) -> FieldRangeSet {
        let mut result = self.base_set.clone();
        if let Some(front) = self.original_or_sets.front() {
            result &= front;
        }
        result
    }

    /// Discards the current clause and subtracts its original ranges
    /// from every remaining clause.
    ///
    /// With a key pattern given, subtraction is restricted to the
    /// indexed fields (values off the index were not scanned and must
    /// not be excluded). Without one, all fields participate. Clauses
    /// that can no longer match anything are dropped.
    pub fn pop_or_clause(&mut self, index_key_pattern: Option<&KeyPattern>) {
        assert!(self.more_or_clauses(), "no disjunction clause to pop");
        self.or_sets.pop_front();
        let Some(popped) = self.original_or_sets.pop_front() else {
            return;
        };
        let to_diff = match index_key_pattern {
            Some(pattern) if !pattern.is_empty() && popped.match_possible() => {
                popped.subset(pattern)
            }
            _ => popped,
        };
        let mut i = 0;
        while i < self.or_sets.len() {
            self.or_sets[i] -= &to_diff;
            if self.or_sets[i].match_possible() {
                i += 1;
            } else {
                self.or_sets.remove(i);
                self.original_or_sets.remove(i);
            }
        }
        tracing::debug!(remaining = self.or_sets.len(), "popped disjunction clause");
    }

    /// Simplified query documents for every remaining clause that can
    /// still match
    pub fn all_clauses_simplified(&self) -> Vec<Value> {
        self.or_sets
            .iter()
            .filter(|s| s.match_possible())
            .map(|s| s.simplified_query(None))
            .collect()
    }

    /// First special-index tag carried by the base set
    pub fn special(&self) -> Option<&str> {
        self.base_set.special()
    }
}

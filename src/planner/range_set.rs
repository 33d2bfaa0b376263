//! Per-clause constraint sets.
//!
//! A `FieldRangeSet` maps each constrained field of one conjunctive
//! clause to its range. Fields the clause does not mention are
//! implicitly universal. Construction walks a query document: plain
//! values are equalities, operator documents apply each sub-operator,
//! and `$not` flips negation for its contents. `$and` clauses flatten
//! into the same conjunct set; `$nor` clauses intersect the complement
//! of each single-predicate clause. A top-level `$or` is left for the
//! disjunction driver, which feeds it clause by clause against this
//! set.

use std::collections::BTreeMap;
use std::ops::{BitAndAssign, SubAssign};

use serde_json::Value;

use crate::index::KeyPattern;
use crate::value::KeyValue;

use super::errors::{PlannerError, PlannerResult};
use super::limits::MAX_IN_PARTITIONS;
use super::lower;
use super::lower::QueryOp;
use super::pattern::{PatternKind, QueryPattern};
use super::range::{trivial_range, FieldRange};

/// Ordered list of (start key, end key) pairs for a sorted range
/// scanner. The pairs are disjoint and occur in traversal order.
pub type BoundList = Vec<(Vec<KeyValue>, Vec<KeyValue>)>;

/// Field ranges determined from the constraints of one conjunctive
/// clause
#[derive(Debug, Clone)]
pub struct FieldRangeSet {
    ns: String,
    ranges: BTreeMap<String, FieldRange>,
}

impl FieldRangeSet {
    /// Builds the constraint set for a query document.
    ///
    /// `$and` and `$nor` contribute their conjunctive effect here; the
    /// top-level `$or` is the disjunction driver's concern and is
    /// skipped, as are `$`-directives carrying no constraints.
    pub fn new(ns: impl Into<String>, query: &Value) -> PlannerResult<Self> {
        let mut set = Self {
            ns: ns.into(),
            ranges: BTreeMap::new(),
        };
        let Some(fields) = query.as_object() else {
            return Err(PlannerError::bad_operand("query", "must be a document"));
        };
        set.process_document(fields)?;
        Ok(set)
    }

    fn process_document(
        &mut self,
        fields: &serde_json::Map<String, Value>,
    ) -> PlannerResult<()> {
        for (field, value) in fields {
            match field.as_str() {
                "$and" => {
                    let Some(clauses) = value.as_array().filter(|a| !a.is_empty()) else {
                        return Err(PlannerError::bad_operand(
                            "$and",
                            "requires a nonempty array of documents",
                        ));
                    };
                    for clause in clauses {
                        let Some(conjuncts) = clause.as_object() else {
                            return Err(PlannerError::bad_operand(
                                "$and",
                                "elements must be documents",
                            ));
                        };
                        self.process_document(conjuncts)?;
                    }
                }
                "$nor" => {
                    let Some(clauses) = value.as_array().filter(|a| !a.is_empty()) else {
                        return Err(PlannerError::bad_or_clause(
                            "$nor requires a nonempty array",
                        ));
                    };
                    for clause in clauses {
                        let Some(predicates) = clause.as_object() else {
                            return Err(PlannerError::bad_or_clause(
                                "$nor elements must be documents",
                            ));
                        };
                        self.apply_nor_clause(predicates)?;
                    }
                }
                f if f.starts_with('$') => {
                    // a top-level $or belongs to the disjunction
                    // driver; other $-directives carry no constraints
                }
                _ => self.process_query_field(field, value)?,
            }
        }
        Ok(())
    }

    /// Intersects the complement of one `$nor` clause into the set.
    ///
    /// Only a single-predicate clause has a box complement; negating a
    /// wider clause yields a union the bounds cannot express, so it
    /// contributes nothing (looser bounds, still correct).
    fn apply_nor_clause(
        &mut self,
        clause: &serde_json::Map<String, Value>,
    ) -> PlannerResult<()> {
        if clause.len() != 1 {
            return Ok(());
        }
        let Some((field, value)) = clause.iter().next() else {
            return Ok(());
        };
        if field.starts_with('$') {
            return Ok(());
        }
        if !lower::is_operator_document(value) {
            let range = lower::lower_value_predicate(value, true);
            self.apply(field, range);
            return Ok(());
        }
        let Some(operators) = value.as_object() else {
            return Ok(());
        };
        if operators.keys().filter(|k| *k != "$options").count() != 1 {
            // negating a conjunction of operators is a union too
            return Ok(());
        }
        if let Some(inner) = operators.get("$not") {
            // double negation: the inner operators apply positively
            if !lower::is_operator_document(inner) {
                return Err(PlannerError::bad_operand(
                    "$not",
                    "requires an operator document",
                ));
            }
            return self.process_query_field(field, inner);
        }
        self.process_not(field, value)
    }

    fn process_query_field(&mut self, field: &str, value: &Value) -> PlannerResult<()> {
        if !lower::is_operator_document(value) {
            let range = lower::lower_value_predicate(value, false);
            self.apply(field, range);
            return Ok(());
        }
        // operator document: apply each sub-operator to the field
        let Some(operators) = value.as_object() else {
            return Ok(());
        };
        let flags = operators
            .get("$options")
            .and_then(Value::as_str)
            .unwrap_or("");
        for (name, operand) in operators {
            match name.as_str() {
                "$options" => {}
                "$not" => self.process_not(field, operand)?,
                "$regex" => {
                    let Some(pattern) = operand.as_str() else {
                        return Err(PlannerError::bad_operand("$regex", "requires a pattern"));
                    };
                    let range = lower::regex_range(pattern, flags, false);
                    self.apply(field, range);
                }
                _ => {
                    let op = QueryOp::from_name(name)
                        .ok_or_else(|| PlannerError::unknown_operator(name.as_str()))?;
                    let range = lower::lower_operator(op, operand, false)?;
                    self.apply(field, range);
                }
            }
        }
        Ok(())
    }

    fn process_not(&mut self, field: &str, value: &Value) -> PlannerResult<()> {
        if !lower::is_operator_document(value) {
            return Err(PlannerError::bad_operand(
                "$not",
                "requires an operator document",
            ));
        }
        let Some(operators) = value.as_object() else {
            return Ok(());
        };
        let flags = operators
            .get("$options")
            .and_then(Value::as_str)
            .unwrap_or("");
        for (name, operand) in operators {
            match name.as_str() {
                "$options" => {}
                "$not" => {
                    return Err(PlannerError::bad_operand("$not", "cannot be nested"));
                }
                "$regex" => {
                    let Some(pattern) = operand.as_str() else {
                        return Err(PlannerError::bad_operand("$regex", "requires a pattern"));
                    };
                    let range = lower::regex_range(pattern, flags, true);
                    self.apply(field, range);
                }
                _ => {
                    let op = QueryOp::from_name(name)
                        .ok_or_else(|| PlannerError::unknown_operator(name.as_str()))?;
                    let range = lower::lower_operator(op, operand, true)?;
                    self.apply(field, range);
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, field: &str, range: FieldRange) {
        *self.range_mut(field) &= &range;
    }

    /// Namespace the set was built for
    pub fn ns(&self) -> &str {
        &self.ns
    }

    /// Returns the range for a field, or the shared universal range if
    /// the field is unconstrained
    pub fn range(&self, field: &str) -> &FieldRange {
        self.ranges.get(field).unwrap_or_else(|| trivial_range())
    }

    /// Returns a mutable range for a field, inserting the universal
    /// range if the field was unconstrained
    pub fn range_mut(&mut self, field: &str) -> &mut FieldRange {
        self.ranges
            .entry(field.to_owned())
            .or_insert_with(FieldRange::universal)
    }

    /// Returns true iff a constrained entry exists for the field
    pub fn has_range(&self, field: &str) -> bool {
        self.ranges.contains_key(field)
    }

    /// Returns the number of fields whose range excludes something
    pub fn n_nontrivial_ranges(&self) -> usize {
        self.ranges.values().filter(|r| r.nontrivial()).count()
    }

    /// Returns true iff no contained range is empty
    pub fn match_possible(&self) -> bool {
        self.ranges.values().all(|r| !r.is_empty())
    }

    /// Empties every range so the set matches nothing
    pub(crate) fn make_empty(&mut self) {
        for range in self.ranges.values_mut() {
            range.make_empty();
        }
    }

    /// Returns the first special-index tag carried by any range
    pub fn special(&self) -> Option<&str> {
        self.ranges.values().find_map(FieldRange::special)
    }

    /// Returns a new set restricted to the fields named by the pattern
    pub fn subset(&self, fields: &KeyPattern) -> FieldRangeSet {
        let mut ranges = BTreeMap::new();
        for name in fields.field_names() {
            if let Some(range) = self.ranges.get(name) {
                ranges.insert(name.to_owned(), range.clone());
            }
        }
        FieldRangeSet {
            ns: self.ns.clone(),
            ranges,
        }
    }

    /// Reduces each nontrivial field to its extreme bounds, as a small
    /// query document. With `fields` given, those fields come first in
    /// the given order; remaining fields follow in name order.
    pub fn simplified_query(&self, fields: Option<&KeyPattern>) -> Value {
        let mut ordered: Vec<&str> = Vec::new();
        if let Some(pattern) = fields {
            for name in pattern.field_names() {
                if self.ranges.contains_key(name) {
                    ordered.push(name);
                }
            }
        }
        for name in self.ranges.keys() {
            if !ordered.contains(&name.as_str()) {
                ordered.push(name);
            }
        }

        let mut doc = serde_json::Map::new();
        for name in ordered {
            let range = &self.ranges[name];
            if !range.nontrivial() {
                continue;
            }
            if range.equality() {
                doc.insert(name.to_owned(), range.min().to_json());
                continue;
            }
            let mut ops = serde_json::Map::new();
            if *range.min() != KeyValue::MinKey {
                let op = if range.min_inclusive() { "$gte" } else { "$gt" };
                ops.insert(op.to_owned(), range.min().to_json());
            }
            if *range.max() != KeyValue::MaxKey {
                let op = if range.max_inclusive() { "$lte" } else { "$lt" };
                ops.insert(op.to_owned(), range.max().to_json());
            }
            doc.insert(name.to_owned(), Value::Object(ops));
        }
        Value::Object(doc)
    }

    /// Computes the fingerprint grouping queries that constrain the
    /// same fields the same way under the same sort.
    pub fn pattern(&self, sort: &KeyPattern) -> QueryPattern {
        let mut kinds = BTreeMap::new();
        for (field, range) in &self.ranges {
            if range.is_empty() {
                // a match-impossible set is not worth fingerprinting
                continue;
            }
            if range.equality() {
                kinds.insert(field.clone(), PatternKind::Equality);
            } else if range.nontrivial() {
                let lower = *range.min() != KeyValue::MinKey;
                let upper = *range.max() != KeyValue::MaxKey;
                let kind = match (lower, upper) {
                    (true, true) => PatternKind::UpperAndLowerBound,
                    (true, false) => PatternKind::LowerBound,
                    (false, true) => PatternKind::UpperBound,
                    (false, false) => continue,
                };
                kinds.insert(field.clone(), kind);
            }
        }
        QueryPattern::new(kinds, sort)
    }

    /// Generates the ordered bound list for a key pattern and traversal
    /// direction.
    ///
    /// Leading equality and enumerated ($in-style) components expand
    /// into a cross product of exact prefixes; the first genuinely
    /// ranged component ends the expansion and later components
    /// contribute their extreme bounds only.
    pub fn index_bounds(
        &self,
        key_pattern: &KeyPattern,
        direction: i32,
    ) -> PlannerResult<BoundList> {
        if !self.match_possible() {
            return Ok(BoundList::new());
        }
        let direction = if direction >= 0 { 1 } else { -1 };
        let mut builders: BoundList = vec![(Vec::new(), Vec::new())];
        let mut inequality_seen = false;
        for component in key_pattern.fields() {
            let range = self.range(&component.name);
            let forward = component.sign * direction > 0;
            if inequality_seen {
                let (min, max) = if forward {
                    (range.min(), range.max())
                } else {
                    (range.max(), range.min())
                };
                for (start, end) in &mut builders {
                    start.push(min.clone());
                    end.push(max.clone());
                }
                continue;
            }
            if range.equality() {
                for (start, end) in &mut builders {
                    start.push(range.min().clone());
                    end.push(range.min().clone());
                }
                continue;
            }
            if !range.in_query() {
                inequality_seen = true;
            }
            let mut expanded: BoundList = Vec::new();
            for (start, end) in &builders {
                let mut push = |interval: &super::interval::FieldInterval| -> PlannerResult<()> {
                    if expanded.len() as u64 >= MAX_IN_PARTITIONS {
                        return Err(PlannerError::in_partition_limit());
                    }
                    let mut new_start = start.clone();
                    let mut new_end = end.clone();
                    if forward {
                        new_start.push(interval.lower.value.clone());
                        new_end.push(interval.upper.value.clone());
                    } else {
                        new_start.push(interval.upper.value.clone());
                        new_end.push(interval.lower.value.clone());
                    }
                    expanded.push((new_start, new_end));
                    Ok(())
                };
                if forward {
                    for interval in range.intervals() {
                        push(interval)?;
                    }
                } else {
                    for interval in range.intervals().iter().rev() {
                        push(interval)?;
                    }
                }
            }
            builders = expanded;
        }
        Ok(builders)
    }
}

impl BitAndAssign<&FieldRangeSet> for FieldRangeSet {
    /// Intersection: fields present in both intersect; fields only in
    /// `other` copy over.
    fn bitand_assign(&mut self, other: &FieldRangeSet) {
        for (field, range) in &other.ranges {
            match self.ranges.get_mut(field) {
                Some(mine) => *mine &= range,
                None => {
                    self.ranges.insert(field.clone(), range.clone());
                }
            }
        }
    }
}

impl SubAssign<&FieldRangeSet> for FieldRangeSet {
    /// Nearly-contained difference, used for disjunction
    /// de-duplication.
    ///
    /// Scanning a compound key range covers a multidimensional box. If
    /// `other`'s box covers this one in every dimension, nothing here
    /// is left to scan. If it covers all but one dimension, that
    /// dimension can be subtracted exactly. Covering less than that
    /// would produce a result that is not a box, so the set is left
    /// unchanged (looser bounds, still correct). A bound in `other` on
    /// a field this set does not constrain also forces the unchanged
    /// result.
    fn sub_assign(&mut self, other: &FieldRangeSet) {
        let mut uncovered: Option<String> = None;
        for (field, other_range) in &other.ranges {
            let Some(range) = self.ranges.get(field) else {
                return;
            };
            if !range.is_subset_of(other_range) {
                if uncovered.is_some() {
                    return;
                }
                uncovered = Some(field.clone());
            }
        }
        match uncovered {
            None => self.make_empty(),
            Some(field) => {
                if let (Some(range), Some(other_range)) =
                    (self.ranges.get_mut(&field), other.ranges.get(&field))
                {
                    *range -= other_range;
                }
            }
        }
    }
}

//! Lowering of single field predicates to ranges.
//!
//! Each (operator, operand) pair translates to a `FieldRange`.
//! Operators the index cannot prune on degrade to the universal range;
//! geo operators additionally tag the range so the caller can route the
//! field to its special index. Negation is the set complement for the
//! invertible operators and degrades to universal for the rest.

use serde_json::Value;

use crate::value::KeyValue;

use super::errors::{PlannerError, PlannerResult};
use super::interval::FieldBound;
use super::range::FieldRange;
use super::regex::{simple_regex, simple_regex_end};

/// Field predicate operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    Ne,
    In,
    Nin,
    Exists,
    Mod,
    Type,
    Regex,
    Size,
    All,
    ElemMatch,
    Near,
    Within,
}

impl QueryOp {
    /// Parses a `$`-prefixed operator name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "$eq" => QueryOp::Eq,
            "$lt" => QueryOp::Lt,
            "$lte" => QueryOp::Lte,
            "$gt" => QueryOp::Gt,
            "$gte" => QueryOp::Gte,
            "$ne" => QueryOp::Ne,
            "$in" => QueryOp::In,
            "$nin" => QueryOp::Nin,
            "$exists" => QueryOp::Exists,
            "$mod" => QueryOp::Mod,
            "$type" => QueryOp::Type,
            "$regex" => QueryOp::Regex,
            "$size" => QueryOp::Size,
            "$all" => QueryOp::All,
            "$elemMatch" => QueryOp::ElemMatch,
            "$near" => QueryOp::Near,
            "$within" => QueryOp::Within,
            _ => return None,
        })
    }

    /// Returns the operator name
    pub fn name(&self) -> &'static str {
        match self {
            QueryOp::Eq => "$eq",
            QueryOp::Lt => "$lt",
            QueryOp::Lte => "$lte",
            QueryOp::Gt => "$gt",
            QueryOp::Gte => "$gte",
            QueryOp::Ne => "$ne",
            QueryOp::In => "$in",
            QueryOp::Nin => "$nin",
            QueryOp::Exists => "$exists",
            QueryOp::Mod => "$mod",
            QueryOp::Type => "$type",
            QueryOp::Regex => "$regex",
            QueryOp::Size => "$size",
            QueryOp::All => "$all",
            QueryOp::ElemMatch => "$elemMatch",
            QueryOp::Near => "$near",
            QueryOp::Within => "$within",
        }
    }
}

/// Returns true iff the value is an operator document, i.e. an object
/// whose first key is an operator rather than extended-literal syntax.
pub(crate) fn is_operator_document(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    let Some(first) = map.keys().next() else {
        return false;
    };
    if !first.starts_with('$') {
        return false;
    }
    // extended literals parse as values, not operators
    !(map.len() == 1 && matches!(first.as_str(), "$date" | "$minKey" | "$maxKey"))
}

/// The complement of a range: everything the range excludes.
fn complement(range: FieldRange) -> FieldRange {
    let mut universal = FieldRange::universal();
    universal -= &range;
    universal
}

/// Lowers a plain equality operand. An array operand matches both as
/// the whole array and as any of its elements, so it lowers to the
/// union of those equalities.
pub(crate) fn equality_range(operand: &Value) -> FieldRange {
    let mut range = FieldRange::equality_of(KeyValue::from_json(operand));
    if let Some(items) = operand.as_array() {
        for item in items {
            range |= &FieldRange::equality_of(KeyValue::from_json(item));
        }
    }
    range
}

fn comparison_range(op: QueryOp, operand: &Value) -> FieldRange {
    let value = KeyValue::from_json(operand);
    let (lower, upper) = match op {
        QueryOp::Lt => (
            FieldBound::inclusive(KeyValue::MinKey),
            FieldBound::exclusive(value),
        ),
        QueryOp::Lte => (
            FieldBound::inclusive(KeyValue::MinKey),
            FieldBound::inclusive(value),
        ),
        QueryOp::Gt => (
            FieldBound::exclusive(value),
            FieldBound::inclusive(KeyValue::MaxKey),
        ),
        QueryOp::Gte => (
            FieldBound::inclusive(value),
            FieldBound::inclusive(KeyValue::MaxKey),
        ),
        _ => unreachable!("not a comparison operator"),
    };
    FieldRange::bounded(lower, upper)
}

fn in_range(op: QueryOp, operand: &Value) -> PlannerResult<FieldRange> {
    let Some(items) = operand.as_array() else {
        return Err(PlannerError::bad_operand(op.name(), "requires an array"));
    };
    let mut range = FieldRange::empty();
    for item in items {
        if is_operator_document(item) {
            return Err(PlannerError::bad_operand(
                op.name(),
                "elements must be plain values",
            ));
        }
        range |= &equality_range(item);
    }
    Ok(range)
}

fn truthy(operand: &Value) -> bool {
    match operand {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Lowers a regex predicate to its anchored-prefix range.
///
/// A pure-prefix pattern also admits the prefix itself as an exact
/// equality; normalization folds it into the prefix interval.
pub(crate) fn regex_range(pattern: &str, flags: &str, negated: bool) -> FieldRange {
    if negated {
        // a negated regex excludes a set of strings the index cannot
        // bound from below or above
        return FieldRange::universal();
    }
    let extracted = simple_regex(pattern, flags);
    if extracted.prefix.is_empty() {
        tracing::trace!(pattern, "regex has no anchored literal prefix");
        return FieldRange::universal();
    }
    let lower = FieldBound::inclusive(KeyValue::String(extracted.prefix.clone()));
    let end = simple_regex_end(extracted.prefix.as_bytes());
    let upper = match String::from_utf8(end) {
        Ok(s) if !s.is_empty() => FieldBound::exclusive(KeyValue::String(s)),
        // no finite successor: fall back to the type-max sentinel
        _ => FieldBound::inclusive(KeyValue::MaxKey),
    };
    let mut range = FieldRange::bounded(lower, upper);
    if extracted.pure_prefix {
        range |= &FieldRange::equality_of(KeyValue::String(extracted.prefix));
    }
    range
}

/// Lowers a plain (non-operator) predicate value to a range.
pub(crate) fn lower_value_predicate(operand: &Value, negated: bool) -> FieldRange {
    let range = equality_range(operand);
    if negated {
        complement(range)
    } else {
        range
    }
}

/// Lowers a single operator predicate to a range.
///
/// `negated` reflects an enclosing `$not`.
pub(crate) fn lower_operator(
    op: QueryOp,
    operand: &Value,
    negated: bool,
) -> PlannerResult<FieldRange> {
    let range = match op {
        QueryOp::Eq => {
            let range = equality_range(operand);
            if negated {
                complement(range)
            } else {
                range
            }
        }
        QueryOp::Ne => {
            let range = equality_range(operand);
            if negated {
                range
            } else {
                complement(range)
            }
        }
        QueryOp::Lt | QueryOp::Lte | QueryOp::Gt | QueryOp::Gte => {
            let range = comparison_range(op, operand);
            if negated {
                complement(range)
            } else {
                range
            }
        }
        QueryOp::In => {
            let range = in_range(op, operand)?;
            if negated {
                complement(range)
            } else {
                range
            }
        }
        QueryOp::Nin => {
            let range = in_range(op, operand)?;
            if negated {
                range
            } else {
                complement(range)
            }
        }
        QueryOp::Exists => {
            let exists = truthy(operand) != negated;
            if exists {
                FieldRange::universal()
            } else {
                FieldRange::empty()
            }
        }
        QueryOp::Mod => {
            let ok = operand
                .as_array()
                .is_some_and(|a| a.len() == 2 && a.iter().all(Value::is_number));
            if !ok {
                return Err(PlannerError::bad_operand(
                    op.name(),
                    "requires a [divisor, remainder] pair",
                ));
            }
            FieldRange::universal()
        }
        QueryOp::Type => {
            if !operand.is_number() {
                return Err(PlannerError::bad_operand(op.name(), "requires a type code"));
            }
            FieldRange::universal()
        }
        QueryOp::Size => {
            if !operand.is_number() {
                return Err(PlannerError::bad_operand(op.name(), "requires a length"));
            }
            FieldRange::universal()
        }
        QueryOp::All => {
            if !operand.is_array() {
                return Err(PlannerError::bad_operand(op.name(), "requires an array"));
            }
            FieldRange::universal()
        }
        QueryOp::ElemMatch => {
            if !operand.is_object() {
                return Err(PlannerError::bad_operand(op.name(), "requires a document"));
            }
            FieldRange::universal()
        }
        QueryOp::Near | QueryOp::Within => {
            let mut range = FieldRange::universal();
            range.set_special("2d");
            range
        }
        QueryOp::Regex => {
            let Some(pattern) = operand.as_str() else {
                return Err(PlannerError::bad_operand(op.name(), "requires a pattern"));
            };
            regex_range(pattern, "", negated)
        }
    };
    Ok(range)
}

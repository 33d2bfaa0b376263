//! Scan budget helpers: skip/limit arithmetic and the partition
//! budget.

use serde_json::Value;

/// Budget on the interval cross-product a single projection may expand
/// to. Queries over it are rejected rather than planned.
pub const MAX_IN_PARTITIONS: u64 = 1_000_000;

fn as_count(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

/// Adjusts a count by a command document's `skip` and `limit`.
///
/// `skip` subtracts from the count; `limit` caps it by absolute value
/// (a negative limit is the single-batch convention and caps the same
/// way); a zero limit means no limit. The result never goes below
/// zero.
pub fn apply_skip_limit(count: i64, command: &Value) -> i64 {
    let mut num = count;
    if let Some(skip) = command.get("skip").and_then(as_count) {
        num -= skip;
        if num < 0 {
            num = 0;
        }
    }
    if let Some(limit) = command.get("limit").and_then(as_count) {
        let limit = limit.abs();
        if limit != 0 && limit < num {
            num = limit;
        }
    }
    num
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_skip_no_limit() {
        assert_eq!(apply_skip_limit(10, &json!({})), 10);
    }

    #[test]
    fn test_skip_subtracts() {
        assert_eq!(apply_skip_limit(10, &json!({ "skip": 3 })), 7);
    }

    #[test]
    fn test_skip_clamps_at_zero() {
        assert_eq!(apply_skip_limit(10, &json!({ "skip": 15 })), 0);
    }

    #[test]
    fn test_limit_caps() {
        assert_eq!(apply_skip_limit(10, &json!({ "limit": 4 })), 4);
        assert_eq!(apply_skip_limit(3, &json!({ "limit": 4 })), 3);
    }

    #[test]
    fn test_negative_limit_caps_by_absolute_value() {
        assert_eq!(apply_skip_limit(10, &json!({ "limit": -4 })), 4);
    }

    #[test]
    fn test_zero_limit_means_unlimited() {
        assert_eq!(apply_skip_limit(10, &json!({ "limit": 0 })), 10);
    }

    #[test]
    fn test_skip_then_limit() {
        assert_eq!(apply_skip_limit(10, &json!({ "skip": 2, "limit": 5 })), 5);
        assert_eq!(apply_skip_limit(10, &json!({ "skip": 8, "limit": 5 })), 2);
    }

    #[test]
    fn test_float_counts_accepted() {
        assert_eq!(apply_skip_limit(10, &json!({ "skip": 2.0, "limit": 3.0 })), 3);
    }
}

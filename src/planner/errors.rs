//! Planner error types
//!
//! Every error here is user-surfaceable: it reports a malformed query
//! and carries a stable numeric code alongside a short name. Planning
//! never panics on user input; assertions are reserved for internal
//! invariants that no query document can reach.

use thiserror::Error;

/// Stable error codes for planner rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Wrong operand arity or type for an operator
    BadOperand,
    /// Unrecognized operator in an operator document
    UnknownOperator,
    /// Malformed disjunction clause list
    BadOrClause,
    /// Interval cross-product over the partition budget
    InPartitionLimit,
}

impl PlannerErrorCode {
    /// Returns the stable numeric code
    pub fn code(&self) -> u32 {
        match self {
            PlannerErrorCode::BadOperand => 2301,
            PlannerErrorCode::UnknownOperator => 2302,
            PlannerErrorCode::BadOrClause => 2303,
            PlannerErrorCode::InPartitionLimit => 2304,
        }
    }

    /// Returns the short name for the code
    pub fn name(&self) -> &'static str {
        match self {
            PlannerErrorCode::BadOperand => "BAD_OPERAND",
            PlannerErrorCode::UnknownOperator => "UNKNOWN_OPERATOR",
            PlannerErrorCode::BadOrClause => "BAD_OR_CLAUSE",
            PlannerErrorCode::InPartitionLimit => "IN_PARTITION_LIMIT",
        }
    }
}

/// Planner rejection of a malformed or over-budget query
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlannerError {
    /// Operand did not have the arity or type the operator requires
    #[error("operator {op} got a malformed operand: {reason}")]
    BadOperand {
        /// Operator name, e.g. "$in"
        op: &'static str,
        /// What was wrong with the operand
        reason: String,
    },

    /// Operator document contained an unrecognized operator
    #[error("unknown query operator '{0}'")]
    UnknownOperator(String),

    /// Disjunction was not a nonempty array of documents
    #[error("malformed disjunction: {0}")]
    BadOrClause(String),

    /// Cross-product of intervals exceeded the partition budget
    #[error("combinatorial limit of $in partitioning of result set exceeded")]
    InPartitionLimit,
}

impl PlannerError {
    /// Create a bad operand error
    pub fn bad_operand(op: &'static str, reason: impl Into<String>) -> Self {
        PlannerError::BadOperand {
            op,
            reason: reason.into(),
        }
    }

    /// Create an unknown operator error
    pub fn unknown_operator(name: impl Into<String>) -> Self {
        PlannerError::UnknownOperator(name.into())
    }

    /// Create a malformed disjunction error
    pub fn bad_or_clause(reason: impl Into<String>) -> Self {
        PlannerError::BadOrClause(reason.into())
    }

    /// Create a partition budget error
    pub fn in_partition_limit() -> Self {
        PlannerError::InPartitionLimit
    }

    /// Returns the stable code for this error
    pub fn code(&self) -> PlannerErrorCode {
        match self {
            PlannerError::BadOperand { .. } => PlannerErrorCode::BadOperand,
            PlannerError::UnknownOperator(_) => PlannerErrorCode::UnknownOperator,
            PlannerError::BadOrClause(_) => PlannerErrorCode::BadOrClause,
            PlannerError::InPartitionLimit => PlannerErrorCode::InPartitionLimit,
        }
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

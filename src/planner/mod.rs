//! Query constraint and index bound planning for keyspan
//!
//! Translates a query document into per-field value intervals and
//! projects them onto index key patterns.
//!
//! # Pipeline
//!
//! 1. Each field predicate lowers to a `FieldRange` (ordered, disjoint
//!    intervals)
//! 2. Conjuncts intersect ranges per field into a `FieldRangeSet`
//! 3. `$or` clauses iterate through a `FieldRangeOrSet`, subtracting
//!    already-scanned bounds from later clauses
//! 4. A `FieldRangeVector` aligns the ranges to an index key pattern
//!    and direction, yielding start/end keys and the scan iterator's
//!    skip instructions
//!
//! # Design Principles
//!
//! - Pure and synchronous: no I/O, no shared mutable state
//! - Conservative: anything the index cannot prune degrades to the
//!   universal range, never to a wrong one
//! - Bounded: interval cross products are capped, never enumerated
//!   unboundedly

mod errors;
mod explain;
mod interval;
mod limits;
mod lower;
mod or_set;
mod pattern;
mod range;
mod range_set;
mod regex;
mod vector;

pub use errors::{PlannerError, PlannerErrorCode, PlannerResult};
pub use explain::ExplainBounds;
pub use interval::{FieldBound, FieldInterval};
pub use limits::{apply_skip_limit, MAX_IN_PARTITIONS};
pub use lower::QueryOp;
pub use or_set::FieldRangeOrSet;
pub use pattern::{PatternKind, QueryPattern};
pub use range::FieldRange;
pub use range_set::{BoundList, FieldRangeSet};
pub use regex::{simple_regex, simple_regex_end, RegexPrefix};
pub use vector::{FieldRangeVector, FieldRangeVectorIterator, ScanAdvance};

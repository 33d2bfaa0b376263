//! Index descriptions for keyspan
//!
//! The planner does not own indexes; it only needs their shape. A key
//! pattern names the indexed fields in order together with the sort
//! sign of each component, which is enough to project per-field
//! constraints onto the key space an index scan will traverse.

mod spec;

pub use spec::{KeyPattern, KeyPatternField};

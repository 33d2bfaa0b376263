//! Ordered value model for keyspan
//!
//! Index keys and query operands are heterogeneous: a single field may
//! hold numbers in one document and strings in another. Planning needs a
//! total, type-aware order over all of them, plus sentinels that compare
//! below and above every concrete value.

mod key;

pub use key::KeyValue;

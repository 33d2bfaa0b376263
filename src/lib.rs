//! keyspan - query constraint analysis and index bound planning for
//! document databases
//!
//! Given a query document, keyspan computes the per-field value
//! intervals that can satisfy it, combines them across conjunctions and
//! disjunctions, and projects them onto an index key pattern to produce
//! the exact key intervals a sorted scan must visit, together with the
//! skip instructions that let a cursor jump over non-matching key space.

pub mod index;
pub mod planner;
pub mod value;

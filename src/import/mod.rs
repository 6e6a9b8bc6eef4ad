//! Method body import.
//!
//! [`import`] turns a [`crate::raw::MethodSource`] into a
//! [`crate::graph::MethodBody`]: blocks split at leaders, exception regions
//! validated and anchored as guards, and the implicit evaluation stack
//! replaced by explicit operands and merge variables.

mod builder;
mod leaders;
mod merge;
mod region_tree;
mod stack;
mod translate;

pub use builder::import;

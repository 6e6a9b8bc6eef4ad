//! # cilgraph Prelude
//!
//! Convenient re-exports of the most commonly used types. Import this module
//! to get quick access to everything needed to build a [`crate::raw::MethodSource`]
//! and inspect the imported graph.

/// The main error type for all cilgraph operations
pub use crate::Error;

/// The result type used throughout cilgraph
pub use crate::Result;

/// Method body import entry point
pub use crate::import::import;

/// Input-side types: decoded instructions and exception regions
pub use crate::raw::{ExceptionRegion, MethodSource, RawInstruction, RawOp, RegionKind};

/// The imported representation
pub use crate::graph::{
    BasicBlock, BlockId, GuardKind, Instruction, MethodBody, Op, Use, ValueData, ValueId,
    ValueKind,
};

/// Operator and kind enums shared by both sides
pub use crate::graph::{
    BinaryOp, CompareOp, Condition, Constant, FieldRef, InstrFlags, MethodRef, StackKind, TypeRef,
    UnaryOp,
};

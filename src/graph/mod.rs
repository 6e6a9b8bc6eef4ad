//! The imported method representation.
//!
//! A [`MethodBody`] is a graph of [`BasicBlock`]s over a flat value arena.
//! Instructions, constants, arguments and variables are all values addressed
//! by [`ValueId`]; blocks are addressed by [`BlockId`]. Every value tracks its
//! uses, so rewrites like [`MethodBody::replace_uses`] run in time
//! proportional to the number of affected operand slots.

mod block;
mod body;
mod instruction;
mod types;
mod value;

pub use block::{BasicBlock, BlockId, GuardKind};
pub use body::MethodBody;
pub use instruction::{
    BinaryOp, CompareOp, Condition, InstrFlags, Instruction, Op, UnaryOp,
};
pub use types::{assignable, binary_result, compare_ok, FieldRef, MethodRef, StackKind, TypeRef};
pub use value::{Argument, Constant, Use, ValueData, ValueId, ValueKind, Variable};

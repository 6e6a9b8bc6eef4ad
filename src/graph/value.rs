//! Values and use tracking.
//!
//! Everything an instruction operand can reference is a value: the result of
//! another instruction, a constant, a method argument, or a variable (a named
//! local or a merge temporary). Values live in the [`crate::graph::MethodBody`]
//! arena and are addressed by [`ValueId`].
//!
//! # Use Tracking
//!
//! Every value owns the list of operand slots currently referencing it, as
//! [`Use`] records. The invariant is bidirectional: `instruction.operand[k] == v`
//! exactly when `(instruction, k)` appears in `v`'s use list. All arena
//! mutations ([`crate::graph::MethodBody::replace_uses`] and friends) maintain
//! this transactionally; a violation is an implementation bug, not an input
//! error, and is caught by [`crate::graph::MethodBody::verify_uses`].

use std::fmt;

use crate::graph::{Instruction, StackKind};

/// Identifier of a value in a method body's arena.
///
/// Ids are only meaningful within the body that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

impl ValueId {
    /// Creates a value id from an arena index.
    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self(index as u32)
    }

    /// Returns the arena index of this value.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A single operand slot referencing a value.
///
/// `instruction` is the consuming instruction's value id, `operand` the
/// zero-based slot index within its operand list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    /// The instruction holding the reference.
    pub instruction: ValueId,
    /// The operand slot index within that instruction.
    pub operand: usize,
}

/// Constant values that can appear as instruction operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 32-bit floating point.
    F32(f32),
    /// 64-bit floating point.
    F64(f64),
    /// Null reference.
    Null,
    /// String literal (index into the external user-string heap).
    String(u32),
}

impl Constant {
    /// Returns the coarse stack kind of this constant.
    #[must_use]
    pub const fn kind(&self) -> StackKind {
        match self {
            Self::I32(_) => StackKind::Int32,
            Self::I64(_) => StackKind::Int64,
            Self::F32(_) | Self::F64(_) => StackKind::Float,
            Self::Null | Self::String(_) => StackKind::Object,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}L"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Null => write!(f, "null"),
            Self::String(idx) => write!(f, "str@{idx}"),
        }
    }
}

/// A method argument value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    /// Zero-based argument index (`this` is index 0 for instance methods).
    pub index: u16,
    /// Coarse stack kind of the argument.
    pub kind: StackKind,
}

/// A variable value: a named local or a merge temporary.
///
/// Named locals come first in a body's variable list, in signature order;
/// merge temporaries allocated by stack propagation are appended after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    /// Zero-based variable index within the body.
    pub index: u32,
    /// Coarse stack kind of the variable.
    pub kind: StackKind,
}

/// The payload of an arena value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// An instruction; its result (if any) is the referencable value.
    Instruction(Instruction),
    /// An immediate constant.
    Constant(Constant),
    /// A method argument.
    Argument(Argument),
    /// A local variable or merge temporary.
    Variable(Variable),
}

/// An arena entry: a value plus the operand slots referencing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub(crate) kind: ValueKind,
    pub(crate) uses: Vec<Use>,
}

impl ValueData {
    pub(crate) fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            uses: Vec::new(),
        }
    }

    /// Returns the value payload.
    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Returns the operand slots currently referencing this value.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    /// Returns the coarse stack kind of this value, `None` for a void
    /// instruction result.
    #[must_use]
    pub fn result_kind(&self) -> Option<StackKind> {
        match &self.kind {
            ValueKind::Instruction(i) => i.result_kind(),
            ValueKind::Constant(c) => Some(c.kind()),
            ValueKind::Argument(a) => Some(a.kind),
            ValueKind::Variable(v) => Some(v.kind),
        }
    }

    /// Returns the instruction payload, if this value is an instruction.
    #[must_use]
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_instruction_mut(&mut self) -> Option<&mut Instruction> {
        match &mut self.kind {
            ValueKind::Instruction(i) => Some(i),
            _ => None,
        }
    }

    /// Returns the variable payload, if this value is a variable.
    #[must_use]
    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            ValueKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if this value is an instruction.
    #[must_use]
    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, ValueKind::Instruction(_))
    }
}

//! Graph instructions.
//!
//! [`Op`] is the instruction set of the imported representation. It is smaller
//! than the raw opcode set: stack-shuffling opcodes (`dup`, `pop`, the constant
//! loads) disappear during import, short/long encodings collapse into one
//! variant, and prefixes fold into [`InstrFlags`] on the prefixed instruction.
//! Operands are not encoded here; they live in the owning
//! [`Instruction::operands`] list as value ids.

#![allow(missing_docs)]

use bitflags::bitflags;
use strum::Display;

use crate::graph::{BlockId, FieldRef, GuardKind, MethodRef, StackKind, TypeRef, ValueId};

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Unary operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Comparison operators producing an `int32` truth value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
}

/// Branch conditions.
///
/// `True`/`False` test a single value against zero/null; the remaining
/// conditions compare two values.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Condition {
    True,
    False,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Condition {
    /// Number of stack values the condition consumes.
    #[must_use]
    pub const fn operand_count(self) -> usize {
        match self {
            Self::True | Self::False => 1,
            _ => 2,
        }
    }
}

bitflags! {
    /// Per-instruction modifier flags accumulated from prefix opcodes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InstrFlags: u8 {
        /// `volatile.` prefix was present.
        const VOLATILE = 0x01;
        /// `unaligned.` prefix was present.
        const UNALIGNED = 0x02;
        /// `readonly.` prefix was present.
        const READONLY = 0x04;
        /// `no.` prefix suppressed the type check.
        const NO_TYPECHECK = 0x08;
        /// `no.` prefix suppressed the range check.
        const NO_RANGECHECK = 0x10;
        /// `no.` prefix suppressed the null check.
        const NO_NULLCHECK = 0x20;
    }
}

/// Operation of a graph instruction.
///
/// Inline payloads carry everything that is not a value operand: slot
/// references, entity references, branch targets, modifier bits. Value
/// operands are stored on the owning [`Instruction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Load from the argument or variable given as operand 0.
    Load,
    /// Store operand 1 into the argument or variable given as operand 0.
    Store,
    /// Take the address of the argument or variable given as operand 0.
    LoadAddress,
    /// Binary arithmetic/bitwise operation on operands 0 and 1.
    Binary {
        op: BinaryOp,
        checked: bool,
        unsigned: bool,
    },
    /// Unary operation on operand 0.
    Unary { op: UnaryOp },
    /// Comparison of operands 0 and 1, producing an `int32` 0/1.
    Compare { op: CompareOp, unsigned: bool },
    /// Numeric conversion of operand 0 to `target`.
    Convert {
        target: StackKind,
        checked: bool,
        unsigned: bool,
    },
    /// Load instance field from the object in operand 0.
    LoadField { field: FieldRef },
    /// Store operand 1 into the field of the object in operand 0.
    StoreField { field: FieldRef },
    /// Load a static field.
    LoadStaticField { field: FieldRef },
    /// Store operand 0 into a static field.
    StoreStaticField { field: FieldRef },
    /// Load element of the array in operand 0 at the index in operand 1.
    LoadElement { kind: StackKind },
    /// Store operand 2 into the array in operand 0 at the index in operand 1.
    StoreElement { kind: StackKind },
    /// Length of the array in operand 0, as `native int`.
    LoadLength,
    /// Allocate an array of `elem` with the length in operand 0.
    NewArray { elem: TypeRef },
    /// Load through the address in operand 0.
    LoadIndirect { kind: StackKind },
    /// Store operand 1 through the address in operand 0.
    StoreIndirect { kind: StackKind },
    /// Cast the object in operand 0, throwing on failure.
    CastClass { ty: TypeRef },
    /// Type test on the object in operand 0, null on failure.
    IsInst { ty: TypeRef },
    /// Static or direct call; operands are the arguments, receiver first.
    Call { method: MethodRef, tail: bool },
    /// Virtual call; operands are the arguments, receiver first.
    CallVirt {
        method: MethodRef,
        tail: bool,
        constrained: Option<TypeRef>,
    },
    /// Allocate and construct; operands are the constructor arguments.
    NewObject { method: MethodRef },
    /// Unconditional branch.
    Branch { target: BlockId },
    /// Conditional branch; falls through to `fallthrough` when not taken.
    CondBranch {
        condition: Condition,
        unsigned: bool,
        target: BlockId,
        fallthrough: BlockId,
    },
    /// Jump table on the `uint32` in operand 0.
    Switch {
        targets: Vec<BlockId>,
        default: BlockId,
    },
    /// Return, with the return value in operand 0 when non-void.
    Return,
    /// Throw the exception object in operand 0.
    Throw,
    /// Rethrow the in-flight exception (valid inside a catch handler only).
    Rethrow,
    /// Exit one or more protected regions toward `target`.
    Leave { target: BlockId },
    /// End of a finally/fault handler.
    EndFinally,
    /// End of a filter; operand 0 is the `int32` decision value.
    EndFilter,
    /// Exception edge marker anchored at a protected region's entry block.
    ///
    /// Guards are not part of the block's instruction list; they hang off the
    /// block's guard list. For catch and filter guards the result is the
    /// incoming exception object.
    Guard {
        kind: GuardKind,
        handler: BlockId,
        filter: Option<BlockId>,
        catch_type: Option<TypeRef>,
    },
}

impl Op {
    /// Returns `true` for operations that must be the last instruction of a
    /// block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Branch { .. }
                | Self::CondBranch { .. }
                | Self::Switch { .. }
                | Self::Return
                | Self::Throw
                | Self::Rethrow
                | Self::Leave { .. }
                | Self::EndFinally
                | Self::EndFilter
        )
    }

    /// Returns `true` for guard markers.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::Guard { .. })
    }

    /// Normal-flow successor blocks of a terminator, in evaluation order.
    ///
    /// Exception successors are reachable through guards, not through this
    /// list. Non-terminators return an empty list.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Branch { target } | Self::Leave { target } => vec![*target],
            Self::CondBranch {
                target, fallthrough, ..
            } => vec![*target, *fallthrough],
            Self::Switch { targets, default } => {
                let mut out = targets.clone();
                out.push(*default);
                out
            }
            _ => Vec::new(),
        }
    }

    /// Rewrites every occurrence of block `from` to `to` in the operation's
    /// targets.
    pub fn retarget(&mut self, from: BlockId, to: BlockId) {
        match self {
            Self::Branch { target } | Self::Leave { target } => {
                if *target == from {
                    *target = to;
                }
            }
            Self::CondBranch {
                target, fallthrough, ..
            } => {
                if *target == from {
                    *target = to;
                }
                if *fallthrough == from {
                    *fallthrough = to;
                }
            }
            Self::Switch { targets, default } => {
                for t in targets.iter_mut() {
                    if *t == from {
                        *t = to;
                    }
                }
                if *default == from {
                    *default = to;
                }
            }
            Self::Guard {
                handler, filter, ..
            } => {
                if *handler == from {
                    *handler = to;
                }
                if let Some(f) = filter {
                    if *f == from {
                        *f = to;
                    }
                }
            }
            _ => {}
        }
    }

    /// Short operation name for rendering.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Store => "store",
            Self::LoadAddress => "loadaddr",
            Self::Binary { op, .. } => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Div => "div",
                BinaryOp::Rem => "rem",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Xor => "xor",
                BinaryOp::Shl => "shl",
                BinaryOp::Shr => "shr",
            },
            Self::Unary { op } => match op {
                UnaryOp::Neg => "neg",
                UnaryOp::Not => "not",
            },
            Self::Compare { op, .. } => match op {
                CompareOp::Eq => "ceq",
                CompareOp::Gt => "cgt",
                CompareOp::Lt => "clt",
            },
            Self::Convert { .. } => "conv",
            Self::LoadField { .. } => "ldfld",
            Self::StoreField { .. } => "stfld",
            Self::LoadStaticField { .. } => "ldsfld",
            Self::StoreStaticField { .. } => "stsfld",
            Self::LoadElement { .. } => "ldelem",
            Self::StoreElement { .. } => "stelem",
            Self::LoadLength => "ldlen",
            Self::NewArray { .. } => "newarr",
            Self::LoadIndirect { .. } => "ldind",
            Self::StoreIndirect { .. } => "stind",
            Self::CastClass { .. } => "castclass",
            Self::IsInst { .. } => "isinst",
            Self::Call { .. } => "call",
            Self::CallVirt { .. } => "callvirt",
            Self::NewObject { .. } => "newobj",
            Self::Branch { .. } => "br",
            Self::CondBranch { .. } => "brcond",
            Self::Switch { .. } => "switch",
            Self::Return => "ret",
            Self::Throw => "throw",
            Self::Rethrow => "rethrow",
            Self::Leave { .. } => "leave",
            Self::EndFinally => "endfinally",
            Self::EndFilter => "endfilter",
            Self::Guard { .. } => "guard",
        }
    }
}

/// A graph instruction: an operation plus its value operands and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub(crate) op: Op,
    pub(crate) operands: Vec<ValueId>,
    pub(crate) block: Option<BlockId>,
    pub(crate) offset: u32,
    pub(crate) result: Option<StackKind>,
    pub(crate) flags: InstrFlags,
}

impl Instruction {
    pub(crate) fn new(
        op: Op,
        operands: Vec<ValueId>,
        offset: u32,
        result: Option<StackKind>,
    ) -> Self {
        Self {
            op,
            operands,
            block: None,
            offset,
            result,
            flags: InstrFlags::empty(),
        }
    }

    /// Returns the operation.
    #[must_use]
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the value operands, in stack order (deepest first).
    #[must_use]
    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    /// Returns the block this instruction currently belongs to, `None` when
    /// detached.
    #[must_use]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// Returns the bytecode offset this instruction was imported from.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the coarse kind of the produced value, `None` for void.
    #[must_use]
    pub fn result_kind(&self) -> Option<StackKind> {
        self.result
    }

    /// Returns the modifier flags accumulated from prefixes.
    #[must_use]
    pub fn flags(&self) -> InstrFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminator_classification() {
        assert!(Op::Return.is_terminator());
        assert!(Op::Throw.is_terminator());
        assert!(Op::EndFinally.is_terminator());
        assert!(Op::Branch {
            target: BlockId::new(0)
        }
        .is_terminator());
        assert!(!Op::Load.is_terminator());
        assert!(!Op::LoadLength.is_terminator());
        assert!(!Op::Guard {
            kind: GuardKind::Finally,
            handler: BlockId::new(1),
            filter: None,
            catch_type: None,
        }
        .is_terminator());
    }

    #[test]
    fn test_successors() {
        let b0 = BlockId::new(0);
        let b1 = BlockId::new(1);
        let b2 = BlockId::new(2);
        assert_eq!(Op::Branch { target: b1 }.successors(), vec![b1]);
        assert_eq!(
            Op::CondBranch {
                condition: Condition::True,
                unsigned: false,
                target: b2,
                fallthrough: b1,
            }
            .successors(),
            vec![b2, b1]
        );
        assert_eq!(
            Op::Switch {
                targets: vec![b1, b2],
                default: b0,
            }
            .successors(),
            vec![b1, b2, b0]
        );
        assert!(Op::Return.successors().is_empty());
        // exception edges are not normal successors
        assert!(Op::Throw.successors().is_empty());
        assert!(Op::EndFinally.successors().is_empty());
    }

    #[test]
    fn test_retarget() {
        let b1 = BlockId::new(1);
        let b2 = BlockId::new(2);
        let b9 = BlockId::new(9);

        let mut op = Op::CondBranch {
            condition: Condition::Eq,
            unsigned: false,
            target: b1,
            fallthrough: b2,
        };
        op.retarget(b1, b9);
        assert_eq!(op.successors(), vec![b9, b2]);

        let mut sw = Op::Switch {
            targets: vec![b1, b2, b1],
            default: b1,
        };
        sw.retarget(b1, b9);
        assert_eq!(sw.successors(), vec![b9, b2, b9, b9]);
    }

    #[test]
    fn test_condition_operand_count() {
        assert_eq!(Condition::True.operand_count(), 1);
        assert_eq!(Condition::False.operand_count(), 1);
        assert_eq!(Condition::Ge.operand_count(), 2);
    }

    #[test]
    fn test_flags_accumulate() {
        let mut f = InstrFlags::empty();
        f |= InstrFlags::VOLATILE;
        f |= InstrFlags::UNALIGNED;
        assert!(f.contains(InstrFlags::VOLATILE | InstrFlags::UNALIGNED));
        assert!(!f.contains(InstrFlags::READONLY));
    }
}

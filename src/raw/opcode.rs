//! Decoded CIL opcodes.
//!
//! [`RawOp`] is the pre-decoded instruction alphabet the importer consumes.
//! Decoding proper (byte parsing, token resolution) happens upstream; by the
//! time an op reaches this crate every short/long encoding pair has collapsed
//! into one variant with a widened payload (`ldc.i4.s`, `ldc.i4` and the
//! `ldc.i4.<n>` macros are all [`RawOp::LdcI4`]) and every metadata token has
//! been resolved to an entity reference.
//!
//! Branch targets are absolute byte offsets into the method body.

#![allow(missing_docs)]

use crate::graph::{
    BinaryOp, CompareOp, Condition, FieldRef, MethodRef, StackKind, TypeRef, UnaryOp,
};

/// A decoded CIL instruction opcode with resolved operands.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOp {
    // ---- No-ops ----
    Nop,

    // ---- Constants ----
    LdcI4(i32),
    LdcI8(i64),
    LdcR4(f32),
    LdcR8(f64),
    LdNull,
    /// `ldstr`, with the resolved user-string heap index.
    LdStr(u32),

    // ---- Arguments and locals ----
    Ldarg(u16),
    Ldarga(u16),
    Starg(u16),
    Ldloc(u16),
    Ldloca(u16),
    Stloc(u16),

    // ---- Stack shuffling ----
    Dup,
    Pop,

    // ---- Arithmetic, bitwise, comparison, conversion ----
    Binary {
        op: BinaryOp,
        checked: bool,
        unsigned: bool,
    },
    Unary(UnaryOp),
    Compare {
        op: CompareOp,
        unsigned: bool,
    },
    Conv {
        target: StackKind,
        checked: bool,
        unsigned: bool,
    },

    // ---- Object model ----
    Ldfld(FieldRef),
    Stfld(FieldRef),
    Ldsfld(FieldRef),
    Stsfld(FieldRef),
    /// `ldelem.*`; `None` for `ldelem.ref` style implicit element access,
    /// which takes its kind from the array operand's element type.
    Ldelem(Option<StackKind>),
    Stelem(Option<StackKind>),
    Ldlen,
    Newarr(TypeRef),
    /// `ldind.*`; `None` for `ldobj`-style access resolved from the address.
    Ldind(Option<StackKind>),
    Stind(Option<StackKind>),
    Castclass(TypeRef),
    Isinst(TypeRef),

    // ---- Calls ----
    Call(MethodRef),
    Callvirt(MethodRef),
    Newobj(MethodRef),

    // ---- Control flow ----
    Br(u32),
    Brcond {
        condition: Condition,
        unsigned: bool,
        target: u32,
    },
    Switch(Vec<u32>),
    Ret,
    Throw,
    Rethrow,
    Leave(u32),
    EndFinally,
    EndFilter,

    // ---- Prefixes ----
    Unaligned(u8),
    Volatile,
    Tail,
    Constrained(TypeRef),
    Readonly,
    /// `no.` with its check-suppression bitmask (0x01 typecheck,
    /// 0x02 rangecheck, 0x04 nullcheck).
    NoCheck(u8),
}

impl RawOp {
    /// Returns `true` for prefix opcodes, which modify the instruction that
    /// follows them.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            Self::Unaligned(_)
                | Self::Volatile
                | Self::Tail
                | Self::Constrained(_)
                | Self::Readonly
                | Self::NoCheck(_)
        )
    }

    /// Returns `true` for opcodes that end a basic block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Br(_)
                | Self::Brcond { .. }
                | Self::Switch(_)
                | Self::Ret
                | Self::Throw
                | Self::Rethrow
                | Self::Leave(_)
                | Self::EndFinally
                | Self::EndFilter
        )
    }

    /// Explicit branch targets of this opcode, excluding fallthrough.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match self {
            Self::Br(target) | Self::Leave(target) | Self::Brcond { target, .. } => vec![*target],
            Self::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` when control can continue at the next instruction.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Self::Br(_)
                | Self::Ret
                | Self::Throw
                | Self::Rethrow
                | Self::Leave(_)
                | Self::EndFinally
                | Self::EndFilter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_classification() {
        assert!(RawOp::Volatile.is_prefix());
        assert!(RawOp::Unaligned(4).is_prefix());
        assert!(RawOp::Tail.is_prefix());
        assert!(!RawOp::Nop.is_prefix());
        assert!(!RawOp::Dup.is_prefix());
    }

    #[test]
    fn test_terminators_and_fallthrough() {
        assert!(RawOp::Ret.is_terminator());
        assert!(!RawOp::Ret.falls_through());
        assert!(RawOp::Br(0).is_terminator());
        assert!(!RawOp::Br(0).falls_through());
        let bcond = RawOp::Brcond {
            condition: Condition::True,
            unsigned: false,
            target: 8,
        };
        assert!(bcond.is_terminator());
        assert!(bcond.falls_through());
        assert!(RawOp::Switch(vec![]).falls_through());
        assert!(!RawOp::LdcI4(1).is_terminator());
        assert!(RawOp::LdcI4(1).falls_through());
    }

    #[test]
    fn test_branch_targets() {
        assert_eq!(RawOp::Br(12).branch_targets(), vec![12]);
        assert_eq!(RawOp::Switch(vec![4, 8, 4]).branch_targets(), vec![4, 8, 4]);
        assert!(RawOp::Ret.branch_targets().is_empty());
    }
}

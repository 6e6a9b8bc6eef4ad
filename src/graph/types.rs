//! Coarse stack types and entity references.
//!
//! The importer tracks every value with one of the verifier-grade stack kinds from
//! ECMA-335 III.1.5 rather than full type-system types. This is deliberately coarse:
//! the real type system is an external collaborator, and the importer only needs
//! enough typing to validate operator pairings and merge-edge compatibility.
//!
//! Entity references ([`TypeRef`], [`FieldRef`], [`MethodRef`]) stand in for already
//! resolved metadata tokens. They carry the coarse signature information the importer
//! consumes (parameter counts, field kinds, return kinds) and nothing else.

use std::fmt;

use strum::Display;

/// Coarse evaluation-stack type of a value.
///
/// These are the categories the CLI verifier tracks on the evaluation stack.
/// All integer types narrower than 4 bytes widen to [`StackKind::Int32`] when
/// loaded; `float32`/`float64` share [`StackKind::Float`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "kebab-case")]
pub enum StackKind {
    /// 32-bit integer (also bool, char and the small integer types).
    Int32,
    /// 64-bit integer.
    Int64,
    /// Native-sized integer (`native int`, unmanaged pointers).
    NativeInt,
    /// Floating point (`F`, the internal float representation).
    Float,
    /// Object reference.
    Object,
    /// Managed pointer (`&`).
    ByRef,
    /// Value type that is not one of the primitive categories.
    Struct,
}

impl StackKind {
    /// Returns `true` for the three integer categories.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Int64 | Self::NativeInt)
    }

    /// Returns `true` for integer and floating-point categories.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Self::Float)
    }

    /// Returns `true` if a value of this kind can serve as a memory address.
    #[must_use]
    pub const fn is_address(self) -> bool {
        matches!(self, Self::ByRef | Self::NativeInt)
    }
}

/// Returns `true` if a value of kind `from` may flow into a slot of kind `to`
/// without an explicit conversion.
///
/// Only the `int32`/`native int` interchange permitted by the ECMA-335 stack
/// rules is accepted; everything else requires exact kind equality.
#[must_use]
pub fn assignable(from: StackKind, to: StackKind) -> bool {
    from == to
        || matches!(
            (from, to),
            (StackKind::Int32, StackKind::NativeInt) | (StackKind::NativeInt, StackKind::Int32)
        )
}

/// Computes the result kind of a binary operator applied to two stack kinds.
///
/// Implements the binary numeric and pointer-arithmetic tables of ECMA-335
/// III.1.5. Returns `None` for every pairing the tables reject; the caller
/// turns that into an [`crate::Error::InvalidProgram`] at the offending offset.
///
/// The interesting rows:
/// - `int32 (+) int32 = int32`, `int32 (+) native int = native int`
/// - `byref + int = byref`, `byref - int = byref` (byref on the left only for sub)
/// - `byref - byref = native int`
/// - bitwise operators accept integers only; shifts take any integer on the
///   left and an `int32`/`native int` shift amount on the right
#[must_use]
pub fn binary_result(
    op: crate::graph::BinaryOp,
    lhs: StackKind,
    rhs: StackKind,
) -> Option<StackKind> {
    use crate::graph::BinaryOp::{Add, And, Div, Mul, Or, Rem, Shl, Shr, Sub, Xor};
    use StackKind::{ByRef, Float, Int32, Int64, NativeInt};

    match op {
        Add | Sub | Mul | Div | Rem => match (lhs, rhs) {
            (Int32, Int32) => Some(Int32),
            (Int64, Int64) => Some(Int64),
            (NativeInt, NativeInt) | (Int32, NativeInt) | (NativeInt, Int32) => Some(NativeInt),
            (Float, Float) => Some(Float),
            (ByRef, Int32 | NativeInt) if matches!(op, Add | Sub) => Some(ByRef),
            (Int32 | NativeInt, ByRef) if matches!(op, Add) => Some(ByRef),
            (ByRef, ByRef) if matches!(op, Sub) => Some(NativeInt),
            _ => None,
        },
        And | Or | Xor => match (lhs, rhs) {
            (Int32, Int32) => Some(Int32),
            (Int64, Int64) => Some(Int64),
            (NativeInt, NativeInt) | (Int32, NativeInt) | (NativeInt, Int32) => Some(NativeInt),
            _ => None,
        },
        Shl | Shr => match (lhs, rhs) {
            (Int32 | Int64 | NativeInt, Int32 | NativeInt) => Some(lhs),
            _ => None,
        },
    }
}

/// Returns `true` if two stack kinds may be compared with the given operator.
///
/// Object references compare only for equality (or via the unsigned
/// greater-than idiom used for null tests); managed pointers compare with any
/// relational operator; `struct` values never compare directly.
#[must_use]
pub fn compare_ok(
    op: crate::graph::CompareOp,
    unsigned: bool,
    lhs: StackKind,
    rhs: StackKind,
) -> bool {
    use crate::graph::CompareOp::{Eq, Gt};
    use StackKind::{ByRef, Float, Int32, Int64, NativeInt, Object};

    match (lhs, rhs) {
        (Int32 | NativeInt, Int32 | NativeInt) => true,
        (Int64, Int64) | (Float, Float) | (ByRef, ByRef) => true,
        (Object, Object) => matches!(op, Eq) || (matches!(op, Gt) && unsigned),
        _ => false,
    }
}

/// Reference to a resolved type.
///
/// The token identifies the type in the external metadata; `kind` is its
/// coarse stack category when loaded as a value (reference types are
/// [`StackKind::Object`], value types [`StackKind::Struct`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Resolved metadata token.
    pub token: u32,
    /// Stack category of an instance of the type.
    pub kind: StackKind,
}

impl TypeRef {
    /// Creates a reference to an object (reference) type.
    #[must_use]
    pub const fn object(token: u32) -> Self {
        Self {
            token,
            kind: StackKind::Object,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:0x{:08X}", self.token)
    }
}

/// Reference to a resolved field, carrying the field's stack kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Resolved metadata token.
    pub token: u32,
    /// Stack category of the field's value.
    pub kind: StackKind,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field:0x{:08X}", self.token)
    }
}

/// Reference to a resolved method, carrying the coarse call signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Resolved metadata token.
    pub token: u32,
    /// Number of declared parameters, excluding any `this`.
    pub params: u16,
    /// Whether the method takes an instance receiver.
    pub has_this: bool,
    /// Stack category of the return value, `None` for `void`.
    pub return_kind: Option<StackKind>,
}

impl MethodRef {
    /// Total number of stack slots consumed by a call (parameters plus `this`).
    #[must_use]
    pub fn arg_count(&self) -> usize {
        usize::from(self.params) + usize::from(self.has_this)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method:0x{:08X}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BinaryOp, CompareOp};

    #[test]
    fn test_binary_int_table() {
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::Int32, StackKind::Int32),
            Some(StackKind::Int32)
        );
        assert_eq!(
            binary_result(BinaryOp::Mul, StackKind::Int32, StackKind::NativeInt),
            Some(StackKind::NativeInt)
        );
        assert_eq!(
            binary_result(BinaryOp::Sub, StackKind::Int64, StackKind::Int64),
            Some(StackKind::Int64)
        );
        // int32 and int64 never mix
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::Int32, StackKind::Int64),
            None
        );
    }

    #[test]
    fn test_binary_byref_arithmetic() {
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::ByRef, StackKind::Int32),
            Some(StackKind::ByRef)
        );
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::NativeInt, StackKind::ByRef),
            Some(StackKind::ByRef)
        );
        assert_eq!(
            binary_result(BinaryOp::Sub, StackKind::ByRef, StackKind::ByRef),
            Some(StackKind::NativeInt)
        );
        // byref on the right of sub is illegal
        assert_eq!(
            binary_result(BinaryOp::Sub, StackKind::Int32, StackKind::ByRef),
            None
        );
        // byref never participates in mul
        assert_eq!(
            binary_result(BinaryOp::Mul, StackKind::ByRef, StackKind::Int32),
            None
        );
    }

    #[test]
    fn test_binary_rejects_object_operands() {
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::ByRef, StackKind::Object),
            None
        );
        assert_eq!(
            binary_result(BinaryOp::And, StackKind::Object, StackKind::Object),
            None
        );
    }

    #[test]
    fn test_binary_bitwise_rejects_float() {
        assert_eq!(
            binary_result(BinaryOp::Xor, StackKind::Float, StackKind::Float),
            None
        );
        assert_eq!(
            binary_result(BinaryOp::Add, StackKind::Float, StackKind::Float),
            Some(StackKind::Float)
        );
    }

    #[test]
    fn test_shift_amount_kinds() {
        assert_eq!(
            binary_result(BinaryOp::Shl, StackKind::Int64, StackKind::Int32),
            Some(StackKind::Int64)
        );
        assert_eq!(
            binary_result(BinaryOp::Shr, StackKind::Int32, StackKind::Int64),
            None
        );
    }

    #[test]
    fn test_compare_pairs() {
        assert!(compare_ok(
            CompareOp::Lt,
            false,
            StackKind::Int32,
            StackKind::NativeInt
        ));
        assert!(compare_ok(
            CompareOp::Eq,
            false,
            StackKind::Object,
            StackKind::Object
        ));
        // null-test idiom: cgt.un on object references
        assert!(compare_ok(
            CompareOp::Gt,
            true,
            StackKind::Object,
            StackKind::Object
        ));
        assert!(!compare_ok(
            CompareOp::Gt,
            false,
            StackKind::Object,
            StackKind::Object
        ));
        assert!(!compare_ok(
            CompareOp::Eq,
            false,
            StackKind::Object,
            StackKind::Int32
        ));
        assert!(!compare_ok(
            CompareOp::Eq,
            false,
            StackKind::Struct,
            StackKind::Struct
        ));
    }

    #[test]
    fn test_assignable() {
        assert!(assignable(StackKind::Int32, StackKind::NativeInt));
        assert!(assignable(StackKind::Object, StackKind::Object));
        assert!(!assignable(StackKind::Int32, StackKind::Int64));
    }
}

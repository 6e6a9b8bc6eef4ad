//! Evaluation stack simulation state.

use crate::graph::{InstrFlags, StackKind, TypeRef, ValueId};
use crate::raw::RawOp;
use crate::Result;

/// Simulated operand stack for one block.
///
/// Each slot pairs the value currently occupying it with its coarse kind.
/// Capacity is the method's declared `MaxStack`; pushing past it or popping
/// an empty stack is a verification failure at the offending offset.
#[derive(Debug)]
pub(crate) struct ValueStack {
    slots: Vec<(ValueId, StackKind)>,
    capacity: usize,
}

impl ValueStack {
    pub(crate) fn new(capacity: u16) -> Self {
        Self {
            slots: Vec::new(),
            capacity: usize::from(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn push(&mut self, value: ValueId, kind: StackKind, offset: u32) -> Result<()> {
        if self.slots.len() == self.capacity {
            return Err(invalid_program!(
                offset,
                "operand stack overflow: method declares max stack depth {}",
                self.capacity
            ));
        }
        self.slots.push((value, kind));
        Ok(())
    }

    pub(crate) fn pop(&mut self, offset: u32) -> Result<(ValueId, StackKind)> {
        self.slots
            .pop()
            .ok_or_else(|| invalid_program!(offset, "operand stack underflow"))
    }

    pub(crate) fn peek(&self, offset: u32) -> Result<(ValueId, StackKind)> {
        self.slots
            .last()
            .copied()
            .ok_or_else(|| invalid_program!(offset, "operand stack underflow"))
    }

    /// Pops `count` values, returning them deepest first (call argument
    /// order).
    pub(crate) fn pop_args(&mut self, count: usize, offset: u32) -> Result<Vec<(ValueId, StackKind)>> {
        if self.slots.len() < count {
            return Err(invalid_program!(
                offset,
                "operand stack underflow: need {count} values, have {}",
                self.slots.len()
            ));
        }
        Ok(self.slots.split_off(self.slots.len() - count))
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Consumes the stack, yielding the residual contents deepest first.
    pub(crate) fn into_residual(self) -> Vec<(ValueId, StackKind)> {
        self.slots
    }
}

/// Prefix opcodes accumulated ahead of the instruction they modify.
#[derive(Debug, Default)]
pub(crate) struct PrefixState {
    pub(crate) flags: InstrFlags,
    pub(crate) tail: bool,
    pub(crate) constrained: Option<TypeRef>,
}

impl PrefixState {
    /// Folds one prefix opcode into the pending state. The caller guarantees
    /// `op.is_prefix()`.
    pub(crate) fn apply(&mut self, op: &RawOp) {
        match op {
            RawOp::Volatile => self.flags |= InstrFlags::VOLATILE,
            RawOp::Unaligned(_) => self.flags |= InstrFlags::UNALIGNED,
            RawOp::Readonly => self.flags |= InstrFlags::READONLY,
            RawOp::Tail => self.tail = true,
            RawOp::Constrained(ty) => self.constrained = Some(*ty),
            RawOp::NoCheck(mask) => {
                if mask & 0x01 != 0 {
                    self.flags |= InstrFlags::NO_TYPECHECK;
                }
                if mask & 0x02 != 0 {
                    self.flags |= InstrFlags::NO_RANGECHECK;
                }
                if mask & 0x04 != 0 {
                    self.flags |= InstrFlags::NO_NULLCHECK;
                }
            }
            _ => {}
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ValueId;

    fn v(n: usize) -> ValueId {
        ValueId::new(n)
    }

    #[test]
    fn test_push_pop_order() {
        let mut stack = ValueStack::new(4);
        stack.push(v(0), StackKind::Int32, 0).unwrap();
        stack.push(v(1), StackKind::Int64, 0).unwrap();
        assert_eq!(stack.pop(1).unwrap(), (v(1), StackKind::Int64));
        assert_eq!(stack.pop(1).unwrap(), (v(0), StackKind::Int32));
        assert!(stack.pop(2).is_err());
    }

    #[test]
    fn test_overflow_at_capacity() {
        let mut stack = ValueStack::new(1);
        stack.push(v(0), StackKind::Int32, 0).unwrap();
        let err = stack.push(v(1), StackKind::Int32, 3).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::InvalidProgram { offset: 3, .. }
        ));
    }

    #[test]
    fn test_pop_args_deepest_first() {
        let mut stack = ValueStack::new(4);
        stack.push(v(0), StackKind::Int32, 0).unwrap();
        stack.push(v(1), StackKind::Int32, 0).unwrap();
        stack.push(v(2), StackKind::Int32, 0).unwrap();
        let args = stack.pop_args(2, 0).unwrap();
        assert_eq!(args[0].0, v(1));
        assert_eq!(args[1].0, v(2));
        assert_eq!(stack.len(), 1);
        assert!(stack.pop_args(2, 0).is_err());
    }

    #[test]
    fn test_prefix_accumulation() {
        let mut prefix = PrefixState::default();
        prefix.apply(&RawOp::Volatile);
        prefix.apply(&RawOp::Unaligned(2));
        prefix.apply(&RawOp::NoCheck(0x05));
        assert!(prefix.flags.contains(InstrFlags::VOLATILE));
        assert!(prefix.flags.contains(InstrFlags::UNALIGNED));
        assert!(prefix.flags.contains(InstrFlags::NO_TYPECHECK));
        assert!(prefix.flags.contains(InstrFlags::NO_NULLCHECK));
        assert!(!prefix.flags.contains(InstrFlags::NO_RANGECHECK));
        prefix.clear();
        assert!(prefix.flags.is_empty());
        assert!(!prefix.tail);
    }
}

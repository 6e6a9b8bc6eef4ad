//! Method body input bundle.

use crate::graph::StackKind;
use crate::raw::{ExceptionRegion, RawInstruction, RawOp};

/// Everything the importer needs to know about one method body.
///
/// This is the handoff point from the decoder: the instruction stream in
/// offset order, the exception region table in its innermost-first file order,
/// the declared stack capacity, and the coarse signature (argument kinds,
/// local kinds, return kind).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSource {
    /// Decoded instructions in ascending offset order.
    pub instructions: Vec<RawInstruction>,
    /// Exception region table, innermost first.
    pub regions: Vec<ExceptionRegion>,
    /// Declared operand stack capacity (`MaxStack`).
    pub max_stack: u16,
    /// Argument stack kinds, `this` first for instance methods.
    pub arguments: Vec<StackKind>,
    /// Named local stack kinds, in signature order.
    pub locals: Vec<StackKind>,
    /// Return kind, `None` for `void`.
    pub return_kind: Option<StackKind>,
}

impl MethodSource {
    /// Builds a source from a plain op list, numbering offsets consecutively.
    ///
    /// Convenient for tests and synthetic inputs: instruction `i` gets offset
    /// `i`, so branch targets are instruction indices. The stack capacity
    /// defaults to 8.
    #[must_use]
    pub fn from_ops(ops: Vec<RawOp>) -> Self {
        let instructions = ops
            .into_iter()
            .enumerate()
            .map(|(offset, op)| {
                #[allow(clippy::cast_possible_truncation)]
                RawInstruction::new(offset as u32, op)
            })
            .collect();
        Self {
            instructions,
            regions: Vec::new(),
            max_stack: 8,
            arguments: Vec::new(),
            locals: Vec::new(),
            return_kind: None,
        }
    }

    /// Sets the argument kinds.
    #[must_use]
    pub fn with_args(mut self, arguments: &[StackKind]) -> Self {
        self.arguments = arguments.to_vec();
        self
    }

    /// Sets the named local kinds.
    #[must_use]
    pub fn with_locals(mut self, locals: &[StackKind]) -> Self {
        self.locals = locals.to_vec();
        self
    }

    /// Sets the exception region table.
    #[must_use]
    pub fn with_regions(mut self, regions: Vec<ExceptionRegion>) -> Self {
        self.regions = regions;
        self
    }

    /// Sets the declared stack capacity.
    #[must_use]
    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Sets the return kind.
    #[must_use]
    pub fn returning(mut self, kind: StackKind) -> Self {
        self.return_kind = Some(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ops_numbers_offsets() {
        let source = MethodSource::from_ops(vec![RawOp::LdcI4(1), RawOp::Pop, RawOp::Ret]);
        let offsets: Vec<u32> = source.instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(source.max_stack, 8);
        assert!(source.return_kind.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let source = MethodSource::from_ops(vec![RawOp::Ret])
            .with_args(&[StackKind::Object])
            .with_locals(&[StackKind::Int32, StackKind::Int32])
            .with_max_stack(2)
            .returning(StackKind::Int32);
        assert_eq!(source.arguments.len(), 1);
        assert_eq!(source.locals.len(), 2);
        assert_eq!(source.max_stack, 2);
        assert_eq!(source.return_kind, Some(StackKind::Int32));
    }
}

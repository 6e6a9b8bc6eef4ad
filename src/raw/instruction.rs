//! Decoded instructions with their byte offsets.

use crate::raw::RawOp;

/// A decoded instruction positioned in the method's byte stream.
///
/// `offset` is the absolute byte offset of the instruction's first byte. The
/// importer treats offsets as opaque positions: they name branch targets and
/// region boundaries, nothing more, so synthetic streams (as produced by
/// [`crate::raw::MethodSource::from_ops`]) may number instructions
/// consecutively instead of by encoded size.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInstruction {
    /// Absolute byte offset of the instruction.
    pub offset: u32,
    /// The decoded opcode with resolved operands.
    pub op: RawOp,
}

impl RawInstruction {
    /// Creates an instruction at the given offset.
    #[must_use]
    pub fn new(offset: u32, op: RawOp) -> Self {
        Self { offset, op }
    }
}

//! Basic blocks.

use std::fmt;

use strum::Display;

use crate::graph::ValueId;

/// Identifier of a basic block within a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block id from an index.
    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        Self(index as u32)
    }

    /// Returns the index of this block.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Kind of exception handler a guard routes to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum GuardKind {
    /// Typed catch handler.
    Catch,
    /// Filtered handler; the filter block decides at runtime.
    Filter,
    /// Finally handler, runs on all exits.
    Finally,
    /// Fault handler, runs on exceptional exit only.
    Fault,
}

/// A basic block: a straight-line instruction run ending in a terminator.
///
/// Instruction and guard lists hold value ids into the owning body's arena.
/// Guards are the exception edges anchored at this block; a block carrying
/// guards is the entry block of one or more protected regions.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub(crate) id: BlockId,
    pub(crate) offset: u32,
    pub(crate) instructions: Vec<ValueId>,
    pub(crate) guards: Vec<ValueId>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) successors: Vec<BlockId>,
}

impl BasicBlock {
    pub(crate) fn new(id: BlockId, offset: u32) -> Self {
        Self {
            id,
            offset,
            instructions: Vec::new(),
            guards: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    /// Returns this block's id.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the bytecode offset this block starts at.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the instructions of this block, in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[ValueId] {
        &self.instructions
    }

    /// Returns the guards anchored at this block.
    #[must_use]
    pub fn guards(&self) -> &[ValueId] {
        &self.guards
    }

    /// Returns the normal-flow predecessor blocks.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Returns the normal-flow successor blocks.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_display() {
        assert_eq!(format!("{}", BlockId::new(0)), "B0");
        assert_eq!(format!("{}", BlockId::new(12)), "B12");
    }

    #[test]
    fn test_guard_kind_display() {
        assert_eq!(format!("{}", GuardKind::Catch), "catch");
        assert_eq!(format!("{}", GuardKind::Finally), "finally");
    }

    #[test]
    fn test_new_block_is_empty() {
        let b = BasicBlock::new(BlockId::new(3), 0x10);
        assert_eq!(b.id().index(), 3);
        assert_eq!(b.offset(), 0x10);
        assert!(b.instructions().is_empty());
        assert!(b.guards().is_empty());
        assert!(b.predecessors().is_empty());
        assert!(b.successors().is_empty());
    }
}

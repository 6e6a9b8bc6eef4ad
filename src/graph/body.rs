//! Method body arena.
//!
//! [`MethodBody`] owns every block and value of an imported method. Blocks and
//! values reference each other exclusively through [`BlockId`] and [`ValueId`]
//! indices, so the graph is freely mutable without reference cycles.
//!
//! All mutations that touch operand lists go through the body so the use index
//! stays synchronized in both directions: an instruction's operand list and
//! the referenced values' use lists always describe the same edges.

use std::fmt;
use std::mem;

use crate::graph::{
    Argument, BasicBlock, BlockId, Constant, InstrFlags, Instruction, Op, StackKind, Use, ValueData,
    ValueId, ValueKind, Variable,
};

/// A method body: the block graph plus the value arena.
#[derive(Debug, Clone)]
pub struct MethodBody {
    values: Vec<ValueData>,
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    arguments: Vec<ValueId>,
    variables: Vec<ValueId>,
    max_stack: u16,
}

impl MethodBody {
    /// Creates an empty body with the given argument and local signatures.
    ///
    /// Arguments and named locals become arena values immediately; blocks are
    /// added by the importer.
    #[must_use]
    pub fn new(arguments: &[StackKind], locals: &[StackKind], max_stack: u16) -> Self {
        let mut body = Self {
            values: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId::new(0),
            arguments: Vec::new(),
            variables: Vec::new(),
            max_stack,
        };
        for (index, &kind) in arguments.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let id = body.add_value(ValueKind::Argument(Argument {
                index: index as u16,
                kind,
            }));
            body.arguments.push(id);
        }
        for &kind in locals {
            let id = body.new_variable(kind);
            body.variables.push(id);
        }
        body
    }

    fn add_value(&mut self, kind: ValueKind) -> ValueId {
        let id = ValueId::new(self.values.len());
        self.values.push(ValueData::new(kind));
        id
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    pub(crate) fn set_entry(&mut self, entry: BlockId) {
        self.entry = entry;
    }

    /// Returns all blocks, in creation order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// Returns the value with the given id.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.index()]
    }

    /// Returns the argument values, in declaration order.
    #[must_use]
    pub fn arguments(&self) -> &[ValueId] {
        &self.arguments
    }

    /// Returns the variable values: named locals first, then merge
    /// temporaries in allocation order.
    #[must_use]
    pub fn variables(&self) -> &[ValueId] {
        &self.variables
    }

    /// Returns the declared operand stack capacity.
    #[must_use]
    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    /// Creates an empty block starting at the given bytecode offset.
    pub(crate) fn create_block(&mut self, offset: u32) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, offset));
        id
    }

    /// Adds a normal-flow edge, skipping duplicates.
    pub(crate) fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let succ = &mut self.blocks[from.index()].successors;
        if !succ.contains(&to) {
            succ.push(to);
        }
        let pred = &mut self.blocks[to.index()].predecessors;
        if !pred.contains(&from) {
            pred.push(from);
        }
    }

    /// Moves every predecessor edge of `old` onto `new`, retargeting the
    /// predecessors' terminators.
    ///
    /// `new` starts with no predecessors of its own; `old` keeps its
    /// successors. The caller is responsible for linking `new` to `old`.
    pub(crate) fn redirect_predecessors(&mut self, old: BlockId, new: BlockId) {
        let preds = mem::take(&mut self.blocks[old.index()].predecessors);
        for &pred in &preds {
            for succ in &mut self.blocks[pred.index()].successors {
                if *succ == old {
                    *succ = new;
                }
            }
            if let Some(term) = self.terminator(pred) {
                if let Some(instr) = self.values[term.index()].as_instruction_mut() {
                    instr.op.retarget(old, new);
                }
            }
        }
        self.blocks[new.index()].predecessors = preds;
    }

    /// Creates a constant value.
    pub(crate) fn constant(&mut self, constant: Constant) -> ValueId {
        self.add_value(ValueKind::Constant(constant))
    }

    /// Allocates a fresh variable of the given kind.
    pub(crate) fn new_variable(&mut self, kind: StackKind) -> ValueId {
        #[allow(clippy::cast_possible_truncation)]
        let variable = Variable {
            index: self.variables.len() as u32,
            kind,
        };
        let id = self.add_value(ValueKind::Variable(variable));
        self.variables.push(id);
        id
    }

    /// Creates a detached instruction value and registers its operand uses.
    pub(crate) fn create_instruction(
        &mut self,
        op: Op,
        operands: Vec<ValueId>,
        offset: u32,
        result: Option<StackKind>,
    ) -> ValueId {
        let id = ValueId::new(self.values.len());
        for (slot, &operand) in operands.iter().enumerate() {
            self.values[operand.index()].uses.push(Use {
                instruction: id,
                operand: slot,
            });
        }
        self.values
            .push(ValueData::new(ValueKind::Instruction(Instruction::new(
                op, operands, offset, result,
            ))));
        id
    }

    /// Appends a detached instruction to the end of a block.
    pub(crate) fn append_instruction(&mut self, block: BlockId, value: ValueId) {
        if let Some(instr) = self.values[value.index()].as_instruction_mut() {
            instr.block = Some(block);
        }
        self.blocks[block.index()].instructions.push(value);
    }

    /// Inserts a detached instruction at a position within a block.
    pub(crate) fn insert_instruction(&mut self, block: BlockId, index: usize, value: ValueId) {
        if let Some(instr) = self.values[value.index()].as_instruction_mut() {
            instr.block = Some(block);
        }
        self.blocks[block.index()].instructions.insert(index, value);
    }

    /// Inserts a detached instruction immediately before the block's
    /// terminator, or at the end if the block has none yet.
    pub(crate) fn insert_before_terminator(&mut self, block: BlockId, value: ValueId) {
        let index = match self.terminator(block) {
            Some(_) => self.blocks[block.index()].instructions.len() - 1,
            None => self.blocks[block.index()].instructions.len(),
        };
        self.insert_instruction(block, index, value);
    }

    /// Anchors a guard instruction at a block.
    pub(crate) fn attach_guard(&mut self, block: BlockId, value: ValueId) {
        if let Some(instr) = self.values[value.index()].as_instruction_mut() {
            instr.block = Some(block);
        }
        self.blocks[block.index()].guards.push(value);
    }

    /// Sets the prefix-derived flags on an instruction.
    pub(crate) fn set_flags(&mut self, value: ValueId, flags: InstrFlags) {
        if let Some(instr) = self.values[value.index()].as_instruction_mut() {
            instr.flags = flags;
        }
    }

    /// Returns the block's terminator instruction, if its last instruction is
    /// one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<ValueId> {
        let last = *self.blocks[block.index()].instructions.last()?;
        let instr = self.values[last.index()].as_instruction()?;
        instr.op.is_terminator().then_some(last)
    }

    /// Rewrites every use of `old` to reference `new`.
    ///
    /// Runs in time proportional to the number of uses of `old`. After the
    /// call `old` has no uses.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let uses = mem::take(&mut self.values[old.index()].uses);
        for use_ in &uses {
            if let Some(instr) = self.values[use_.instruction.index()].as_instruction_mut() {
                instr.operands[use_.operand] = new;
            }
        }
        self.values[new.index()].uses.extend(uses);
    }

    /// Detaches an instruction from its block and releases its operand uses.
    ///
    /// The arena slot stays allocated; the instruction keeps its operands for
    /// inspection but no longer participates in the use index. Values still
    /// using the instruction's result are left untouched, so callers replace
    /// uses first.
    pub fn remove_instruction(&mut self, value: ValueId) {
        let (operands, block) = match self.values[value.index()].as_instruction() {
            Some(instr) => (instr.operands.clone(), instr.block),
            None => return,
        };
        for operand in operands {
            self.values[operand.index()]
                .uses
                .retain(|u| u.instruction != value);
        }
        if let Some(block) = block {
            let b = &mut self.blocks[block.index()];
            b.instructions.retain(|&v| v != value);
            b.guards.retain(|&v| v != value);
        }
        if let Some(instr) = self.values[value.index()].as_instruction_mut() {
            instr.block = None;
        }
    }

    /// Removes one operand slot from an instruction, shifting later slots
    /// down and fixing their use records.
    ///
    /// Runs in time proportional to the instruction's remaining operands and
    /// their use lists, independent of the body's size.
    pub fn remove_operand(&mut self, value: ValueId, index: usize) {
        let (removed, shifted) = match self.values[value.index()].as_instruction_mut() {
            Some(instr) => {
                let removed = instr.operands.remove(index);
                (removed, instr.operands[index..].to_vec())
            }
            None => return,
        };
        let uses = &mut self.values[removed.index()].uses;
        if let Some(position) = uses
            .iter()
            .position(|u| u.instruction == value && u.operand == index)
        {
            uses.remove(position);
        }
        // renumber the shifted slots; each held its old index before removal
        for (slot, operand) in shifted.into_iter().enumerate() {
            let old_index = index + 1 + slot;
            for u in &mut self.values[operand.index()].uses {
                if u.instruction == value && u.operand == old_index {
                    u.operand -= 1;
                    break;
                }
            }
        }
    }

    /// Checks the use index in both directions.
    ///
    /// Returns `true` when every operand slot has exactly one matching use
    /// record and every use record points at a matching operand slot.
    #[must_use]
    pub fn verify_uses(&self) -> bool {
        for (index, data) in self.values.iter().enumerate() {
            let id = ValueId::new(index);
            if let Some(instr) = data.as_instruction() {
                for (slot, &operand) in instr.operands.iter().enumerate() {
                    let count = self.values[operand.index()]
                        .uses
                        .iter()
                        .filter(|u| u.instruction == id && u.operand == slot)
                        .count();
                    if count != 1 {
                        return false;
                    }
                }
            }
            for use_ in &data.uses {
                match self.values[use_.instruction.index()].as_instruction() {
                    Some(instr) => {
                        if instr.operands.get(use_.operand) != Some(&id) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    fn render_value(&self, id: ValueId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.values[id.index()].kind() {
            ValueKind::Constant(c) => write!(f, "{c}"),
            ValueKind::Argument(a) => write!(f, "arg{}", a.index),
            ValueKind::Variable(v) => write!(f, "var{}", v.index),
            ValueKind::Instruction(_) => write!(f, "{id}"),
        }
    }

    fn render_instruction(&self, id: ValueId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(instr) = self.values[id.index()].as_instruction() else {
            return Ok(());
        };
        write!(f, "    ")?;
        if instr.result.is_some() {
            write!(f, "{id} = ")?;
        }
        write!(f, "{}", instr.op.mnemonic())?;
        match &instr.op {
            Op::Branch { target } | Op::Leave { target } => write!(f, " {target}")?,
            Op::CondBranch {
                condition,
                target,
                fallthrough,
                ..
            } => write!(f, ".{condition} {target}, {fallthrough}")?,
            Op::Switch { targets, default } => {
                write!(f, " [")?;
                for (i, t) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "] default {default}")?;
            }
            Op::Guard {
                kind,
                handler,
                filter,
                ..
            } => {
                write!(f, " {kind} -> {handler}")?;
                if let Some(filter) = filter {
                    write!(f, " (filter {filter})")?;
                }
            }
            _ => {}
        }
        for (i, &operand) in instr.operands.iter().enumerate() {
            write!(f, "{}", if i == 0 { " " } else { ", " })?;
            self.render_value(operand, f)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{}", block.id)?;
            if block.id == self.entry {
                write!(f, " (entry)")?;
            }
            writeln!(f, ": ; offset {:#06X}", block.offset)?;
            for &guard in &block.guards {
                self.render_instruction(guard, f)?;
            }
            for &instr in &block.instructions {
                self.render_instruction(instr, f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BinaryOp;

    fn empty_body() -> MethodBody {
        MethodBody::new(&[StackKind::Int32], &[StackKind::Object], 8)
    }

    #[test]
    fn test_new_body_seeds_arguments_and_locals() {
        let body = empty_body();
        assert_eq!(body.arguments().len(), 1);
        assert_eq!(body.variables().len(), 1);
        assert_eq!(
            body.value(body.arguments()[0]).result_kind(),
            Some(StackKind::Int32)
        );
        assert_eq!(
            body.value(body.variables()[0]).result_kind(),
            Some(StackKind::Object)
        );
        assert_eq!(body.max_stack(), 8);
    }

    #[test]
    fn test_create_instruction_registers_uses() {
        let mut body = empty_body();
        let b = body.create_block(0);
        let lhs = body.constant(Constant::I32(1));
        let rhs = body.constant(Constant::I32(2));
        let add = body.create_instruction(
            Op::Binary {
                op: BinaryOp::Add,
                checked: false,
                unsigned: false,
            },
            vec![lhs, rhs],
            0,
            Some(StackKind::Int32),
        );
        body.append_instruction(b, add);

        assert_eq!(
            body.value(lhs).uses(),
            &[Use {
                instruction: add,
                operand: 0
            }]
        );
        assert_eq!(
            body.value(rhs).uses(),
            &[Use {
                instruction: add,
                operand: 1
            }]
        );
        assert!(body.verify_uses());
    }

    #[test]
    fn test_replace_uses_moves_every_reference() {
        let mut body = empty_body();
        let b = body.create_block(0);
        let old = body.constant(Constant::I32(1));
        let new = body.constant(Constant::I32(2));
        let i1 = body.create_instruction(
            Op::Binary {
                op: BinaryOp::Add,
                checked: false,
                unsigned: false,
            },
            vec![old, old],
            0,
            Some(StackKind::Int32),
        );
        body.append_instruction(b, i1);

        body.replace_uses(old, new);
        assert!(body.value(old).uses().is_empty());
        assert_eq!(body.value(new).uses().len(), 2);
        let instr = body.value(i1).as_instruction().unwrap();
        assert_eq!(instr.operands(), &[new, new]);
        assert!(body.verify_uses());
    }

    #[test]
    fn test_remove_instruction_detaches_and_releases() {
        let mut body = empty_body();
        let b = body.create_block(0);
        let c = body.constant(Constant::I32(7));
        let i = body.create_instruction(Op::Throw, vec![c], 0, None);
        body.append_instruction(b, i);

        body.remove_instruction(i);
        assert!(body.value(c).uses().is_empty());
        assert!(body.block(b).instructions().is_empty());
        assert_eq!(body.value(i).as_instruction().unwrap().block(), None);
        assert!(body.verify_uses());
    }

    #[test]
    fn test_remove_operand_shifts_use_slots() {
        let mut body = empty_body();
        let b = body.create_block(0);
        let a = body.constant(Constant::I32(1));
        let c = body.constant(Constant::I32(2));
        let d = body.constant(Constant::I32(3));
        let call = body.create_instruction(
            Op::Switch {
                targets: vec![],
                default: BlockId::new(0),
            },
            vec![a, c, d],
            0,
            None,
        );
        body.append_instruction(b, call);

        body.remove_operand(call, 1);
        let instr = body.value(call).as_instruction().unwrap();
        assert_eq!(instr.operands(), &[a, d]);
        assert!(body.value(c).uses().is_empty());
        assert_eq!(
            body.value(d).uses(),
            &[Use {
                instruction: call,
                operand: 1
            }]
        );
        assert!(body.verify_uses());
    }

    #[test]
    fn test_remove_operand_touches_only_its_own_slots() {
        let mut body = empty_body();
        let b0 = body.create_block(0);
        let b1 = body.create_block(4);
        let a = body.constant(Constant::I32(1));
        let merge = body.create_instruction(
            Op::Switch {
                targets: vec![],
                default: BlockId::new(0),
            },
            vec![a, a, a],
            0,
            None,
        );
        body.append_instruction(b0, merge);
        let other = body.create_instruction(Op::Return, vec![a], 4, None);
        body.append_instruction(b1, other);

        body.remove_operand(merge, 0);
        let instr = body.value(merge).as_instruction().unwrap();
        assert_eq!(instr.operands(), &[a, a]);
        let slots: Vec<usize> = body
            .value(a)
            .uses()
            .iter()
            .filter(|u| u.instruction == merge)
            .map(|u| u.operand)
            .collect();
        assert_eq!(slots, vec![0, 1]);
        assert!(body
            .value(a)
            .uses()
            .iter()
            .any(|u| u.instruction == other && u.operand == 0));
        assert!(body.verify_uses());
    }

    #[test]
    fn test_redirect_predecessors() {
        let mut body = empty_body();
        let b0 = body.create_block(0);
        let b1 = body.create_block(4);
        let b2 = body.create_block(8);
        let br = body.create_instruction(Op::Branch { target: b1 }, vec![], 0, None);
        body.append_instruction(b0, br);
        body.add_edge(b0, b1);

        body.redirect_predecessors(b1, b2);
        assert_eq!(body.block(b1).predecessors(), &[] as &[BlockId]);
        assert_eq!(body.block(b2).predecessors(), &[b0]);
        assert_eq!(body.block(b0).successors(), &[b2]);
        let instr = body.value(br).as_instruction().unwrap();
        assert_eq!(instr.op().successors(), vec![b2]);
    }

    #[test]
    fn test_insert_before_terminator() {
        let mut body = empty_body();
        let b = body.create_block(0);
        let ret = body.create_instruction(Op::Return, vec![], 0, None);
        body.append_instruction(b, ret);

        let v = body.arguments()[0];
        let var = body.new_variable(StackKind::Int32);
        let store = body.create_instruction(Op::Store, vec![var, v], 0, None);
        body.insert_before_terminator(b, store);

        assert_eq!(body.block(b).instructions(), &[store, ret]);
        assert_eq!(body.terminator(b), Some(ret));
    }
}

//! Residual-stack propagation across block edges.
//!
//! When a block ends with values left on the evaluation stack, those values
//! flow to every normal successor. The first edge to reach a successor fixes
//! its entry stack shape: one fresh merge variable per slot, loaded at the
//! start of the successor. Every edge (the first one included) then stores its
//! residual values into those variables just before its terminator.
//!
//! Later edges must match the established shape exactly, slot count and coarse
//! kind both. There is no widening; a mismatch aborts the import with
//! [`crate::Error::InconsistentEvalStack`].

use crate::graph::{BlockId, MethodBody, Op, StackKind, ValueId};
use crate::Result;

/// One slot of a block's established entry stack.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntrySlot {
    /// The value occupying the slot at block entry: a merge-variable load, or
    /// a guard result for handler entries.
    pub(crate) value: ValueId,
    /// Coarse kind of the slot.
    pub(crate) kind: StackKind,
    /// The merge variable backing the slot; `None` for guard-seeded slots,
    /// which no normal edge may merge into.
    pub(crate) var: Option<ValueId>,
}

/// Import-time state of one block.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockState {
    /// Entry stack shape, once some edge (or a seed) has established it.
    pub(crate) entry: Option<Vec<EntrySlot>>,
}

/// Propagates the residual stack of `from` along the edge to `target`.
///
/// `offset` is the bytecode offset of `from`'s terminator, used for error
/// reporting.
pub(crate) fn propagate_residual(
    body: &mut MethodBody,
    states: &mut [BlockState],
    from: BlockId,
    target: BlockId,
    residual: &[(ValueId, StackKind)],
    offset: u32,
) -> Result<()> {
    let vars = match &states[target.index()].entry {
        Some(slots) => {
            if slots.len() != residual.len() {
                return Err(inconsistent_stack!(
                    offset,
                    "edge {from} -> {target} carries {} stack values, other paths carry {}",
                    residual.len(),
                    slots.len()
                ));
            }
            let mut vars = Vec::with_capacity(slots.len());
            for (index, (slot, &(_, kind))) in slots.iter().zip(residual).enumerate() {
                if slot.kind != kind {
                    return Err(inconsistent_stack!(
                        offset,
                        "edge {from} -> {target} slot {index} is {kind}, other paths carry {}",
                        slot.kind
                    ));
                }
                let Some(var) = slot.var else {
                    return Err(inconsistent_stack!(
                        offset,
                        "edge {from} -> {target} merges into a handler entry stack"
                    ));
                };
                vars.push(var);
            }
            vars
        }
        None => {
            // first edge in: allocate merge variables and load them at the
            // target's start
            let mut slots = Vec::with_capacity(residual.len());
            let mut vars = Vec::with_capacity(residual.len());
            let target_offset = body.block(target).offset();
            for (index, &(_, kind)) in residual.iter().enumerate() {
                let var = body.new_variable(kind);
                let load =
                    body.create_instruction(Op::Load, vec![var], target_offset, Some(kind));
                body.insert_instruction(target, index, load);
                slots.push(EntrySlot {
                    value: load,
                    kind,
                    var: Some(var),
                });
                vars.push(var);
            }
            states[target.index()].entry = Some(slots);
            vars
        }
    };

    for (&var, &(value, _)) in vars.iter().zip(residual) {
        let store = body.create_instruction(Op::Store, vec![var, value], offset, None);
        body.insert_before_terminator(from, store);
    }
    Ok(())
}

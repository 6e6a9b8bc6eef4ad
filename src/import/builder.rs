//! Import driver.
//!
//! Importing runs in fixed phases over one [`MethodSource`]:
//!
//! 1. leader discovery and boundary validation,
//! 2. block creation, one block per leader in ascending offset order,
//! 3. static edge wiring from the raw terminators,
//! 4. region nesting validation and guard placement, splitting try-entry
//!    blocks so no block anchors two regions,
//! 5. block-by-block translation in forward order, propagating residual
//!    stacks along edges as blocks finish.
//!
//! Translation visits blocks by `(offset, newest-first)` so a synthetic
//! dominating block runs before the block it dominates.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::graph::{BlockId, GuardKind, MethodBody, Op, StackKind, ValueId};
use crate::import::leaders::find_leaders;
use crate::import::merge::{propagate_residual, BlockState, EntrySlot};
use crate::import::region_tree::RegionTree;
use crate::import::translate::BlockTranslator;
use crate::raw::{MethodSource, RegionKind};
use crate::Result;

/// Imports a pre-decoded method body into a block graph.
///
/// # Errors
///
/// Returns an error when the exception table is not properly nested, when the
/// bytecode violates stack or structural rules, or when merge predecessors
/// disagree on the residual stack shape. On error the partially built body is
/// discarded.
pub fn import(source: &MethodSource) -> Result<MethodBody> {
    Importer::new(source)?.run()
}

struct Importer<'a> {
    source: &'a MethodSource,
    body: MethodBody,
    /// Outermost block starting at each leader offset.
    entry_at: BTreeMap<u32, BlockId>,
    /// Instruction index range of each original (non-synthetic) block.
    ranges: HashMap<BlockId, (usize, usize)>,
    /// Synthetic dominating block -> the block it branches to.
    synthetic: HashMap<BlockId, BlockId>,
    arguments: Vec<ValueId>,
    locals: Vec<ValueId>,
}

impl<'a> Importer<'a> {
    fn new(source: &'a MethodSource) -> Result<Self> {
        let leaders = find_leaders(source)?;
        let mut body = MethodBody::new(&source.arguments, &source.locals, source.max_stack);

        let mut entry_at = BTreeMap::new();
        for &offset in &leaders {
            let block = body.create_block(offset);
            entry_at.insert(offset, block);
        }
        body.set_entry(entry_at[&leaders[0]]);

        // instruction index ranges per block
        let mut ranges = HashMap::new();
        let mut start = 0;
        for (leader_index, &offset) in leaders.iter().enumerate() {
            let end = match leaders.get(leader_index + 1) {
                Some(&next) => source
                    .instructions
                    .partition_point(|i| i.offset < next),
                None => source.instructions.len(),
            };
            ranges.insert(entry_at[&offset], (start, end));
            start = end;
        }

        let arguments = body.arguments().to_vec();
        let locals = body.variables()[..source.locals.len()].to_vec();

        Ok(Self {
            source,
            body,
            entry_at,
            ranges,
            synthetic: HashMap::new(),
            arguments,
            locals,
        })
    }

    fn block_at(&self, offset: u32, at: u32) -> Result<BlockId> {
        self.entry_at
            .get(&offset)
            .copied()
            .ok_or_else(|| invalid_program!(at, "offset {offset:#06X} is not a block start"))
    }

    fn run(mut self) -> Result<MethodBody> {
        self.wire_static_edges()?;
        let tree = RegionTree::build(&self.source.regions)?;
        let region_entries = self.split_try_entries(&tree)?;
        let mut states = vec![BlockState::default(); self.body.blocks().len()];
        states[self.body.entry_block().index()].entry = Some(Vec::new());
        self.place_guards(&region_entries, &mut states)?;
        self.translate_blocks(&mut states)?;
        debug_assert!(self.body.verify_uses());
        Ok(self.body)
    }

    /// Wires normal-flow edges from each block's raw terminator, ahead of
    /// translation.
    fn wire_static_edges(&mut self) -> Result<()> {
        let mut blocks: Vec<BlockId> = self.ranges.keys().copied().collect();
        blocks.sort_unstable();
        for block in blocks {
            let (start, end) = self.ranges[&block];
            let last = &self.source.instructions[end - 1];
            debug_assert!(start < end);

            if last.op.is_terminator() {
                for target in last.op.branch_targets() {
                    let to = self.block_at(target, last.offset)?;
                    self.body.add_edge(block, to);
                }
            }
            if last.op.falls_through() {
                let next = match self.source.instructions.get(end) {
                    Some(instruction) => instruction.offset,
                    None => {
                        return Err(invalid_program!(
                            last.offset,
                            "control falls through past the end of the method"
                        ))
                    }
                };
                let to = self.block_at(next, last.offset)?;
                self.body.add_edge(block, to);
            }
        }
        Ok(())
    }

    /// Assigns each region a guard-anchor block, splitting a block that would
    /// otherwise anchor two regions.
    ///
    /// Regions are processed innermost first, so the synthetic block inserted
    /// for an outer region dominates the inner region's anchor.
    fn split_try_entries(&mut self, tree: &RegionTree) -> Result<Vec<BlockId>> {
        let mut order: Vec<usize> = (0..self.source.regions.len()).collect();
        order.sort_by_key(|&index| Reverse(tree.try_depth(index)));

        let mut claimed: HashMap<BlockId, usize> = HashMap::new();
        let mut entries = vec![BlockId::new(0); self.source.regions.len()];
        for index in order {
            let region = &self.source.regions[index];
            let block = self.block_at(region.try_start, region.try_start)?;
            let anchor = if claimed.contains_key(&block) {
                let fresh = self.body.create_block(region.try_start);
                self.body.redirect_predecessors(block, fresh);
                self.body.add_edge(fresh, block);
                self.synthetic.insert(fresh, block);
                if self.body.entry_block() == block {
                    self.body.set_entry(fresh);
                }
                self.entry_at.insert(region.try_start, fresh);
                fresh
            } else {
                block
            };
            claimed.insert(anchor, index);
            entries[index] = anchor;
        }
        Ok(entries)
    }

    /// Creates guard instructions on the anchor blocks and seeds the handler
    /// entry stacks.
    fn place_guards(&mut self, entries: &[BlockId], states: &mut [BlockState]) -> Result<()> {
        for (index, region) in self.source.regions.iter().enumerate() {
            let handler = self.block_at(region.handler_start, region.handler_start)?;
            let filter = match region.filter_start {
                Some(offset) => Some(self.block_at(offset, offset)?),
                None => None,
            };
            let kind = match region.kind {
                RegionKind::Catch => GuardKind::Catch,
                RegionKind::Filter => GuardKind::Filter,
                RegionKind::Finally => GuardKind::Finally,
                RegionKind::Fault => GuardKind::Fault,
            };
            let carries_exception = matches!(kind, GuardKind::Catch | GuardKind::Filter);
            let guard = self.body.create_instruction(
                Op::Guard {
                    kind,
                    handler,
                    filter,
                    catch_type: region.catch_type,
                },
                vec![],
                region.try_start,
                carries_exception.then_some(StackKind::Object),
            );
            self.body.attach_guard(entries[index], guard);

            // handler (and filter) entry stacks are fixed by the region kind
            let mut seeds = vec![(handler, carries_exception)];
            if let Some(filter) = filter {
                seeds.push((filter, true));
            }
            for (block, with_exception) in seeds {
                let slots = if with_exception {
                    vec![EntrySlot {
                        value: guard,
                        kind: StackKind::Object,
                        var: None,
                    }]
                } else {
                    Vec::new()
                };
                let state = &mut states[block.index()];
                if state.entry.is_some() {
                    return Err(invalid_program!(
                        self.body.block(block).offset(),
                        "handler entry block {block} already has an entry stack"
                    ));
                }
                state.entry = Some(slots);
            }
        }
        Ok(())
    }

    /// Translates every block in forward order, propagating residual stacks.
    fn translate_blocks(&mut self, states: &mut [BlockState]) -> Result<()> {
        let mut order: Vec<BlockId> = self.body.blocks().iter().map(|b| b.id()).collect();
        order.sort_by_key(|&block| {
            (self.body.block(block).offset(), Reverse(block.index()))
        });

        for block in order {
            let entry = match states[block.index()].entry.clone() {
                Some(slots) => slots,
                None => {
                    // reachable only through a back edge, or not at all;
                    // either way it starts with an empty stack
                    states[block.index()].entry = Some(Vec::new());
                    Vec::new()
                }
            };

            let end_offset;
            let residual = if let Some(&target) = self.synthetic.get(&block) {
                end_offset = self.body.block(block).offset();
                let branch =
                    self.body
                        .create_instruction(Op::Branch { target }, vec![], end_offset, None);
                self.body.append_instruction(block, branch);
                entry.iter().map(|slot| (slot.value, slot.kind)).collect()
            } else {
                let (start, end) = self.ranges[&block];
                end_offset = self.source.instructions[end - 1].offset;
                let fallthrough = self
                    .source
                    .instructions
                    .get(end)
                    .map(|instruction| instruction.offset);
                let translator = BlockTranslator::new(
                    &mut self.body,
                    block,
                    &entry,
                    &self.arguments,
                    &self.locals,
                    self.source.return_kind,
                    &self.entry_at,
                )?;
                translator.run(&self.source.instructions[start..end], fallthrough)?
            };

            let mut successors = self.body.block(block).successors().to_vec();
            successors.dedup();
            for successor in successors {
                propagate_residual(
                    &mut self.body,
                    states,
                    block,
                    successor,
                    &residual,
                    end_offset,
                )?;
            }
        }
        Ok(())
    }
}

//! Leader discovery.
//!
//! A leader is an offset where a basic block must start: the method entry,
//! every branch target, the instruction after every terminator, and every
//! region boundary. Region ends are not block starts in the ECMA-335 sense,
//! but treating interior try/handler ends as leaders keeps every block fully
//! inside or fully outside a region, never straddling its boundary.
//!
//! Each leader is validated to be an actual instruction boundary. Instruction
//! widths are not part of the input, so the method's code size is unknowable
//! here; a region end past the last instruction's offset is taken to extend
//! to the end of the method.

use std::collections::BTreeSet;

use crate::raw::MethodSource;
use crate::Result;

/// Computes the sorted leader offsets of a method, validating branch targets
/// and region boundaries.
pub(crate) fn find_leaders(source: &MethodSource) -> Result<Vec<u32>> {
    let Some(last) = source.instructions.last() else {
        return Err(crate::Error::EndOfMethodExpected);
    };
    if !last.op.is_terminator() {
        return Err(crate::Error::EndOfMethodExpected);
    }

    let boundaries: BTreeSet<u32> = source.instructions.iter().map(|i| i.offset).collect();

    let mut leaders = BTreeSet::new();
    leaders.insert(source.instructions[0].offset);

    for (index, instruction) in source.instructions.iter().enumerate() {
        if !instruction.op.is_terminator() {
            continue;
        }
        for target in instruction.op.branch_targets() {
            if !boundaries.contains(&target) {
                return Err(invalid_program!(
                    instruction.offset,
                    "branch target {target:#06X} is not an instruction boundary"
                ));
            }
            leaders.insert(target);
        }
        if let Some(next) = source.instructions.get(index + 1) {
            leaders.insert(next.offset);
        }
    }

    for region in &source.regions {
        for start in region.block_starts() {
            if !boundaries.contains(&start) {
                return Err(invalid_program!(
                    start,
                    "region boundary {start:#06X} is not an instruction boundary"
                ));
            }
            leaders.insert(start);
        }
        for stop in [region.try_end, region.handler_end] {
            if stop > last.offset {
                // extends to the end of the method
                continue;
            }
            if !boundaries.contains(&stop) {
                return Err(invalid_program!(
                    stop,
                    "region end {stop:#06X} is not an instruction boundary"
                ));
            }
            leaders.insert(stop);
        }
    }

    Ok(leaders.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Condition, TypeRef};
    use crate::raw::{ExceptionRegion, RawInstruction, RawOp};

    #[test]
    fn test_empty_method_rejected() {
        let source = MethodSource::from_ops(vec![]);
        assert!(matches!(
            find_leaders(&source).unwrap_err(),
            crate::Error::EndOfMethodExpected
        ));
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let source = MethodSource::from_ops(vec![RawOp::LdcI4(1), RawOp::Pop]);
        assert!(matches!(
            find_leaders(&source).unwrap_err(),
            crate::Error::EndOfMethodExpected
        ));
    }

    #[test]
    fn test_straight_line_has_one_leader() {
        let source = MethodSource::from_ops(vec![RawOp::LdcI4(1), RawOp::Pop, RawOp::Ret]);
        assert_eq!(find_leaders(&source).unwrap(), vec![0]);
    }

    #[test]
    fn test_branch_splits_blocks() {
        let source = MethodSource::from_ops(vec![
            RawOp::LdcI4(1),
            RawOp::Brcond {
                condition: Condition::True,
                unsigned: false,
                target: 4,
            },
            RawOp::Nop,
            RawOp::Nop,
            RawOp::Ret,
        ]);
        // entry, fallthrough after the branch, and the branch target
        assert_eq!(find_leaders(&source).unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_invalid_branch_target_rejected() {
        let source = MethodSource::from_ops(vec![RawOp::Br(9), RawOp::Ret]);
        assert!(matches!(
            find_leaders(&source).unwrap_err(),
            crate::Error::InvalidProgram { offset: 0, .. }
        ));
    }

    #[test]
    fn test_region_boundaries_become_leaders() {
        let source = MethodSource::from_ops(vec![
            RawOp::Nop,
            RawOp::Leave(4),
            RawOp::Pop,
            RawOp::Leave(4),
            RawOp::Ret,
        ])
        .with_regions(vec![ExceptionRegion::catch(
            0,
            2,
            2,
            4,
            TypeRef::object(0x0100_0001),
        )]);
        assert_eq!(find_leaders(&source).unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_region_end_at_method_end_accepted() {
        let source = MethodSource::from_ops(vec![
            RawOp::Leave(2),
            RawOp::EndFinally,
            RawOp::Ret,
        ])
        .with_regions(vec![ExceptionRegion::finally(0, 1, 1, 2)]);
        assert_eq!(find_leaders(&source).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_region_end_past_wide_final_instruction() {
        // true byte offsets: rethrow at 2 is two bytes wide, so the handler
        // end names the code size 4
        let source = MethodSource {
            instructions: vec![
                RawInstruction::new(0, RawOp::LdNull),
                RawInstruction::new(1, RawOp::Throw),
                RawInstruction::new(2, RawOp::Rethrow),
            ],
            regions: vec![ExceptionRegion::catch(
                0,
                2,
                2,
                4,
                TypeRef::object(0x0100_0001),
            )],
            ..MethodSource::default()
        };
        assert_eq!(find_leaders(&source).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_region_boundary_off_grid_rejected() {
        let source = MethodSource::from_ops(vec![RawOp::Nop, RawOp::Ret]).with_regions(vec![
            ExceptionRegion::finally(0, 1, 7, 9),
        ]);
        assert!(matches!(
            find_leaders(&source).unwrap_err(),
            crate::Error::InvalidProgram { offset: 7, .. }
        ));
    }
}

//! Pre-decoded method input.
//!
//! The importer does not parse bytes. Its input is a [`MethodSource`]: a list
//! of decoded [`RawInstruction`]s, the exception region table, and the coarse
//! method signature, all produced by an upstream decoder that has already
//! resolved metadata tokens into entity references.

mod instruction;
mod method;
mod opcode;
mod regions;

pub use instruction::RawInstruction;
pub use method::MethodSource;
pub use opcode::RawOp;
pub use regions::{ExceptionRegion, RegionKind};

use thiserror::Error;

macro_rules! invalid_program {
    // Offset plus format string with optional arguments
    ($offset:expr, $($arg:tt)*) => {
        crate::Error::InvalidProgram {
            message: format!($($arg)*),
            offset: $offset,
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! malformed_regions {
    ($($arg:tt)*) => {
        crate::Error::MalformedRegionNesting {
            message: format!($($arg)*),
        }
    };
}

macro_rules! inconsistent_stack {
    ($offset:expr, $($arg:tt)*) => {
        crate::Error::InconsistentEvalStack {
            message: format!($($arg)*),
            offset: $offset,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Importing a method body either yields a fully consistent [`crate::graph::MethodBody`] or
/// fails with one of these variants; there is no partial-success contract. A caller that
/// receives an error must discard the method - the importer never retries or recovers.
///
/// # Error Categories
///
/// ## Malformed Input
/// - [`Error::MalformedRegionNesting`] - Exception regions overlap without nesting
/// - [`Error::EndOfMethodExpected`] - Instruction stream does not end in a terminator
///
/// ## Verification Failures
/// - [`Error::InvalidProgram`] - The bytecode violates stack-type or structural rules
/// - [`Error::InconsistentEvalStack`] - Merge predecessors disagree on the stack shape
#[derive(Error, Debug)]
pub enum Error {
    /// Two exception regions overlap without one containing the other.
    ///
    /// ECMA-335 requires protected regions to be properly nested: any two
    /// intervals contributed by the exception table are either disjoint or one
    /// fully contains the other. Partial overlap aborts region tree
    /// construction.
    #[error("MalformedRegionNesting - {message}")]
    MalformedRegionNesting {
        /// Description of the offending interval pair
        message: String,
    },

    /// The bytecode violates a structural or stack-type rule.
    ///
    /// Raised for operator type mismatches, stack underflow/overflow, branch
    /// targets that are not instruction boundaries, unresolvable implicit
    /// access types, and similar verification failures. The error includes the
    /// source location where the violation was detected for debugging purposes.
    #[error("InvalidProgram - {file}:{line}: {message} (at IL offset {offset:#06X})")]
    InvalidProgram {
        /// Description of the violated rule
        message: String,
        /// Byte offset of the offending instruction
        offset: u32,
        /// The source file in which this error was raised
        file: &'static str,
        /// The source line in which this error was raised
        line: u32,
    },

    /// Predecessors reaching a merge point disagree on the residual stack shape.
    ///
    /// Every path into a block must leave the same number of operand-stack
    /// values with the same coarse stack kinds. No widening coercion is
    /// attempted; a mismatch is fatal.
    #[error("InconsistentEvalStack - {message} (at IL offset {offset:#06X})")]
    InconsistentEvalStack {
        /// Description of the shape mismatch
        message: String,
        /// Byte offset of the terminator whose propagation failed
        offset: u32,
    },

    /// The method body does not end with a terminator instruction.
    ///
    /// Control would fall off the end of the method, which ECMA-335 forbids.
    #[error("EndOfMethodExpected - method body does not end with a terminator instruction")]
    EndOfMethodExpected,
}

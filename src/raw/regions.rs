//! Exception region table entries.
//!
//! The exception table of a CIL method body lists protected regions and their
//! handlers as half-open byte-offset intervals, innermost first. ECMA-335
//! II.25.4.6 fixes the layout; this crate receives the entries already decoded
//! and with catch types resolved.

use crate::graph::TypeRef;

/// Kind of an exception handler region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Typed catch clause.
    Catch,
    /// Filtered clause; a filter code range decides at runtime.
    Filter,
    /// Finally clause, runs on every exit from the protected range.
    Finally,
    /// Fault clause, runs only on exceptional exit.
    Fault,
}

/// One entry of a method's exception region table.
///
/// All intervals are half-open `[start, end)` byte ranges. `filter_start` is
/// present exactly for [`RegionKind::Filter`] entries; the filter code runs
/// from `filter_start` up to `handler_start`. `catch_type` is present exactly
/// for [`RegionKind::Catch`] entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExceptionRegion {
    /// Handler kind.
    pub kind: RegionKind,
    /// Start of the protected range.
    pub try_start: u32,
    /// End of the protected range (exclusive).
    pub try_end: u32,
    /// Start of the handler range.
    pub handler_start: u32,
    /// End of the handler range (exclusive).
    pub handler_end: u32,
    /// Start of the filter range, for filter regions.
    pub filter_start: Option<u32>,
    /// Resolved exception type, for catch regions.
    pub catch_type: Option<TypeRef>,
}

impl ExceptionRegion {
    /// Creates a catch region.
    #[must_use]
    pub fn catch(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32, catch_type: TypeRef) -> Self {
        Self {
            kind: RegionKind::Catch,
            try_start,
            try_end,
            handler_start,
            handler_end,
            filter_start: None,
            catch_type: Some(catch_type),
        }
    }

    /// Creates a filter region; the filter code spans
    /// `[filter_start, handler_start)`.
    #[must_use]
    pub fn filter(try_start: u32, try_end: u32, filter_start: u32, handler_start: u32, handler_end: u32) -> Self {
        Self {
            kind: RegionKind::Filter,
            try_start,
            try_end,
            handler_start,
            handler_end,
            filter_start: Some(filter_start),
            catch_type: None,
        }
    }

    /// Creates a finally region.
    #[must_use]
    pub fn finally(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> Self {
        Self {
            kind: RegionKind::Finally,
            try_start,
            try_end,
            handler_start,
            handler_end,
            filter_start: None,
            catch_type: None,
        }
    }

    /// Creates a fault region.
    #[must_use]
    pub fn fault(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> Self {
        Self {
            kind: RegionKind::Fault,
            try_start,
            try_end,
            handler_start,
            handler_end,
            filter_start: None,
            catch_type: None,
        }
    }

    /// Offsets that must start a basic block for this region: the try start,
    /// the handler start, and the filter start when present.
    #[must_use]
    pub fn block_starts(&self) -> Vec<u32> {
        let mut starts = vec![self.try_start, self.handler_start];
        if let Some(filter) = self.filter_start {
            starts.push(filter);
        }
        starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_fix_kind_payloads() {
        let c = ExceptionRegion::catch(0, 4, 4, 8, TypeRef::object(0x0100_0001));
        assert_eq!(c.kind, RegionKind::Catch);
        assert!(c.catch_type.is_some());
        assert!(c.filter_start.is_none());

        let f = ExceptionRegion::filter(0, 4, 4, 8, 12);
        assert_eq!(f.kind, RegionKind::Filter);
        assert_eq!(f.filter_start, Some(4));
        assert!(f.catch_type.is_none());

        let fin = ExceptionRegion::finally(0, 4, 4, 8);
        assert_eq!(fin.kind, RegionKind::Finally);
        assert!(fin.catch_type.is_none());
    }

    #[test]
    fn test_block_starts() {
        let f = ExceptionRegion::filter(0, 4, 4, 8, 12);
        assert_eq!(f.block_starts(), vec![0, 8, 4]);
        let fin = ExceptionRegion::finally(0, 4, 4, 8);
        assert_eq!(fin.block_starts(), vec![0, 4]);
    }
}

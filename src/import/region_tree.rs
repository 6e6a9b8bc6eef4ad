//! Exception region nesting tree.
//!
//! Every region contributes up to three half-open intervals (try, handler,
//! filter). ECMA-335 requires any two intervals to be disjoint or properly
//! nested; this tree materializes that containment order and rejects partial
//! overlap. The importer uses the try-interval nesting depth to place guards
//! innermost first.

use crate::raw::{ExceptionRegion, RegionKind};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalKind {
    Root,
    Protected,
    Handler,
    Filter,
}

#[derive(Debug)]
struct Node {
    start: u32,
    end: u32,
    kind: IntervalKind,
    /// Index into the source region table; unused for the root.
    region: usize,
    children: Vec<usize>,
}

/// Containment tree over all exception-table intervals of one method.
#[derive(Debug)]
pub(crate) struct RegionTree {
    nodes: Vec<Node>,
}

impl RegionTree {
    /// Builds the tree, validating proper nesting of every interval pair.
    pub(crate) fn build(regions: &[ExceptionRegion]) -> Result<Self> {
        let mut tree = Self {
            nodes: vec![Node {
                start: 0,
                end: u32::MAX,
                kind: IntervalKind::Root,
                region: usize::MAX,
                children: Vec::new(),
            }],
        };
        for (index, region) in regions.iter().enumerate() {
            tree.insert(region.try_start, region.try_end, IntervalKind::Protected, index)?;
            tree.insert(
                region.handler_start,
                region.handler_end,
                IntervalKind::Handler,
                index,
            )?;
            if region.kind == RegionKind::Filter {
                let Some(filter_start) = region.filter_start else {
                    return Err(malformed_regions!(
                        "filter region over [{:#06X}, {:#06X}) has no filter start",
                        region.try_start,
                        region.try_end
                    ));
                };
                tree.insert(
                    filter_start,
                    region.handler_start,
                    IntervalKind::Filter,
                    index,
                )?;
            }
        }
        Ok(tree)
    }

    fn insert(&mut self, start: u32, end: u32, kind: IntervalKind, region: usize) -> Result<()> {
        if start >= end {
            return Err(malformed_regions!(
                "empty or inverted region interval [{start:#06X}, {end:#06X})"
            ));
        }
        let mut parent = 0;
        'descend: loop {
            // descend into a child that strictly contains the new interval
            for &child in &self.nodes[parent].children {
                let c = &self.nodes[child];
                if c.start <= start && end <= c.end && (c.start < start || end < c.end) {
                    parent = child;
                    continue 'descend;
                }
            }
            break;
        }

        // partition the parent's children: adopted by the new interval,
        // kept alongside it, or partially overlapping (malformed)
        let mut adopted = Vec::new();
        let mut kept = Vec::new();
        for &child in &self.nodes[parent].children {
            let c = &self.nodes[child];
            if start <= c.start && c.end <= end {
                adopted.push(child);
            } else if c.end <= start || end <= c.start {
                kept.push(child);
            } else {
                return Err(malformed_regions!(
                    "intervals [{start:#06X}, {end:#06X}) and [{:#06X}, {:#06X}) overlap without nesting",
                    c.start,
                    c.end
                ));
            }
        }

        let node = self.nodes.len();
        self.nodes.push(Node {
            start,
            end,
            kind,
            region,
            children: adopted,
        });
        kept.push(node);
        self.nodes[parent].children = kept;
        Ok(())
    }

    /// Nesting depth of a region's try interval; outermost intervals have
    /// depth 1.
    pub(crate) fn try_depth(&self, region: usize) -> usize {
        let Some(target) = self
            .nodes
            .iter()
            .position(|n| n.kind == IntervalKind::Protected && n.region == region)
        else {
            return 0;
        };
        self.depth_of(0, target, 0).unwrap_or(0)
    }

    fn depth_of(&self, node: usize, target: usize, depth: usize) -> Option<usize> {
        if node == target {
            return Some(depth);
        }
        for &child in &self.nodes[node].children {
            if let Some(found) = self.depth_of(child, target, depth + 1) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TypeRef;

    fn catch(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> ExceptionRegion {
        ExceptionRegion::catch(
            try_start,
            try_end,
            handler_start,
            handler_end,
            TypeRef::object(0x0100_0001),
        )
    }

    #[test]
    fn test_nested_tries_get_increasing_depth() {
        // inner try [2,4) inside outer try [0,8), handlers outside
        let regions = vec![catch(2, 4, 10, 12), catch(0, 8, 12, 14)];
        let tree = RegionTree::build(&regions).unwrap();
        assert_eq!(tree.try_depth(1), 1);
        assert_eq!(tree.try_depth(0), 2);
    }

    #[test]
    fn test_equal_try_ranges_nest() {
        // two catch clauses protecting the same range
        let regions = vec![catch(0, 4, 8, 10), catch(0, 4, 10, 12)];
        let tree = RegionTree::build(&regions).unwrap();
        // one adopts the other; depths differ
        let depths = [tree.try_depth(0), tree.try_depth(1)];
        assert!(depths.contains(&1) && depths.contains(&2));
    }

    #[test]
    fn test_partial_overlap_rejected() {
        let regions = vec![catch(0, 4, 8, 10), catch(2, 6, 10, 12)];
        let err = RegionTree::build(&regions).unwrap_err();
        assert!(matches!(err, crate::Error::MalformedRegionNesting { .. }));
    }

    #[test]
    fn test_handler_overlapping_try_rejected() {
        // handler [3,6) straddles the try end of [0,4)
        let regions = vec![catch(0, 4, 3, 6)];
        assert!(RegionTree::build(&regions).is_err());
    }

    #[test]
    fn test_empty_interval_rejected() {
        let regions = vec![catch(4, 4, 8, 10)];
        assert!(RegionTree::build(&regions).is_err());
    }

    #[test]
    fn test_filter_interval_participates() {
        let regions = vec![ExceptionRegion::filter(0, 2, 4, 6, 8)];
        let tree = RegionTree::build(&regions).unwrap();
        assert_eq!(tree.try_depth(0), 1);
    }

    #[test]
    fn test_filter_without_filter_start_rejected() {
        let mut region = ExceptionRegion::filter(0, 2, 4, 6, 8);
        region.filter_start = None;
        assert!(matches!(
            RegionTree::build(&[region]).unwrap_err(),
            crate::Error::MalformedRegionNesting { .. }
        ));
    }
}

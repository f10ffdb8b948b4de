// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Page-heap adapter (component D): a thin trait boundary onto an external
//! page allocator (out of scope), shaped the same way `Hardware` is — so
//! recovery (E) can ask "does some page cover this fault address?" and
//! box-switch (G) can ask "which pages are this box's active set?"
//! without either depending on the allocator's internals.

use crate::region::{Acl, Region, RegionConfig};

/// Growth direction of a page-heap arena: some heaps grow up from a low
/// watermark, others grow down from a high one, and a page's "active"
/// status depends on which side of the watermark it falls on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One page-sized region owned by the page heap, plus the ACL that applies
/// while it is active. `page_id` is the allocator's own handle for the
/// page, opaque to this crate — it is threaded straight back into
/// `register_fault` rather than re-derived from `box_id`/`addr`, per spec
/// §4.D/§6's collaborator contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageRegion {
    pub start: usize,
    pub end: usize,
    pub acl: Acl,
    pub page_id: u32,
}

impl PageRegion {
    pub const fn to_region(self) -> Region {
        Region::new(self.start, self.end, self.acl, RegionConfig::PAGE)
    }
}

/// External collaborator interface for the page-heap allocator.
pub trait PageHeap {
    /// The page covering `addr` in `box_id`'s arena, if `box_id` owns a page
    /// heap and one of its pages is active over `addr`.
    fn get_active_region_for_address(&self, box_id: usize, addr: usize) -> Option<PageRegion>;

    /// Record that `page_id` faulted, for the heap's own internal
    /// bookkeeping (e.g. lazily growing the arena). Recovery calls this with
    /// the `page_id` carried on the `PageRegion` that
    /// `get_active_region_for_address` just returned.
    fn register_fault(&mut self, page_id: u32);

    /// Visit every currently-active page of `box_id`, in `direction`
    /// (the heap's own growth order), most-recently-active first.
    fn iterate_active_pages(&self, box_id: usize, direction: Direction, visit: &mut dyn FnMut(PageRegion));
}


#[cfg(test)]
mod tests {
    use super::testing::FakePageHeap;
    use super::*;

    fn page(start: usize, end: usize) -> PageRegion {
        page_with_id(start, end, 0)
    }

    fn page_with_id(start: usize, end: usize, page_id: u32) -> PageRegion {
        PageRegion {
            start,
            end,
            acl: Acl::user_rw(),
            page_id,
        }
    }

    #[test]
    fn get_active_region_for_address_finds_containing_page() {
        let mut heap = FakePageHeap::new();
        heap.add_page(1, page(0x2000_1000, 0x2000_1100));
        let found = heap.get_active_region_for_address(1, 0x2000_1050).unwrap();
        assert_eq!(found.start, 0x2000_1000);
    }

    #[test]
    fn get_active_region_for_address_respects_box_scoping() {
        let mut heap = FakePageHeap::new();
        heap.add_page(1, page(0x2000_1000, 0x2000_1100));
        assert!(heap.get_active_region_for_address(2, 0x2000_1050).is_none());
    }

    #[test]
    fn iterate_active_pages_visits_every_page_in_box() {
        let mut heap = FakePageHeap::new();
        heap.add_page(1, page(0x1000, 0x1100));
        heap.add_page(1, page(0x2000, 0x2100));
        heap.add_page(2, page(0x3000, 0x3100));
        let mut seen = 0;
        heap.iterate_active_pages(1, Direction::Up, &mut |_| seen += 1);
        assert_eq!(seen, 2);
    }

    #[test]
    fn iterate_active_pages_reverses_order_for_direction_down() {
        let mut heap = FakePageHeap::new();
        heap.add_page(1, page_with_id(0x1000, 0x1100, 1));
        heap.add_page(1, page_with_id(0x2000, 0x2100, 2));

        let mut up = Vec::new();
        heap.iterate_active_pages(1, Direction::Up, &mut |p| up.push(p.page_id));
        assert_eq!(up, vec![1, 2]);

        let mut down = Vec::new();
        heap.iterate_active_pages(1, Direction::Down, &mut |p| down.push(p.page_id));
        assert_eq!(down, vec![2, 1]);
    }

    #[test]
    fn register_fault_logs_the_page_id_not_the_fault_address() {
        let mut heap = FakePageHeap::new();
        heap.register_fault(42);
        assert_eq!(heap.fault_log, vec![42]);
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Box switch (component G): reprogram the slot cache for a cross-box call
//! or return — invalidate, then the destination's stack/context at the
//! highest priority, then the active page set, then the rest of the
//! destination's regions (or, switching back to the public box, its own
//! regions instead).

use crate::driver::Hardware;
use crate::pageheap::{Direction, PageHeap};
use crate::recovery::{PRIORITY_OTHER_ACTIVE_BOX_REGION, PRIORITY_PAGE, PRIORITY_PUBLIC_BOX_REGION};
use crate::region::{PUBLIC_BOX, RegionTable};
use crate::slots::SlotCache;

/// Reprogram hardware for a switch from `src` to `dst`:
///
/// 1. Invalidate every non-locked slot.
/// 2. If `dst != 0`, push `dst`'s first region (its stack/context block by
///    convention) at the highest priority and lock it.
/// 3. Push `dst`'s active page set at page priority, in `Direction::Up`
///    order.
/// 4. If `dst != 0`, push `dst`'s remaining regions, at priority 2 (spec
///    §4.C "other active-box regions" — distinct from the priority-3
///    faulting static region `recovery::recover` itself pushes), until the
///    cache reports a wrap.
/// 5. If `dst == 0`, push every public-box region instead of step 4/2.
pub fn switch<const N: usize, const K: usize, const S: usize, H: Hardware, P: PageHeap>(
    regions: &RegionTable<N>,
    page_heap: &P,
    slots: &mut SlotCache<K, S>,
    hw: &H,
    _src: usize,
    dst: usize,
) {
    slots.invalidate_all(hw);
    slots.begin_batch();

    if dst != PUBLIC_BOX {
        let dst_regions = regions.get_for_box(dst);
        if let Some(stack) = dst_regions.first() {
            slots.push(hw, *stack, u8::MAX);
            slots.lock_matching(stack);
        }
    }

    // Most-recently-active page first, in the heap's own growth order.
    page_heap.iterate_active_pages(dst, Direction::Up, &mut |page| {
        slots.push(hw, page.to_region(), PRIORITY_PAGE);
    });

    if dst != PUBLIC_BOX {
        let dst_regions = regions.get_for_box(dst);
        let skip_first = usize::from(!dst_regions.is_empty());
        for region in dst_regions.iter().skip(skip_first) {
            if !slots.push(hw, *region, PRIORITY_OTHER_ACTIVE_BOX_REGION) {
                break;
            }
        }
    } else {
        for region in regions.get_for_box(PUBLIC_BOX) {
            if !slots.push(hw, *region, PRIORITY_PUBLIC_BOX_REGION) {
                break;
            }
        }
    }
}

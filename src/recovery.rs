// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Fault recovery (component E): given a faulting address, decide whether
//! some box's ACL or the page heap permits it and, if so, push the
//! covering region into the slot cache. Bit-band translation and the SCB
//! address both reuse the SCB base `arch/cortex-m/src/scb.rs` and
//! `arch/cortex-v7m/src/lib.rs` already read from (`0xE000ED00`).

use crate::driver::Hardware;
use crate::error::RecoveryError;
use crate::pageheap::PageHeap;
use crate::region::{Acl, PUBLIC_BOX, Region, RegionConfig, RegionTable};
use crate::slots::SlotCache;

/// Non-secure alias window for SRAM bit-banding (ARMv7/v8-M bit-band map).
const SRAM_BITBAND_ALIAS_BASE: usize = 0x2200_0000;
const SRAM_BITBAND_ALIAS_END: usize = 0x2400_0000;
const SRAM_BITBAND_REGION_BASE: usize = 0x2000_0000;

/// Peripheral bit-band alias window.
const PERIPH_BITBAND_ALIAS_BASE: usize = 0x4200_0000;
const PERIPH_BITBAND_ALIAS_END: usize = 0x4400_0000;
const PERIPH_BITBAND_REGION_BASE: usize = 0x4000_0000;

/// SCB's System Control Register. A non-secure access here must appear
/// transparent regardless of which box faulted.
pub const SCB_SCR_ADDR: usize = 0xE000_ED10;

/// Priorities pushed into the slot cache, increasing = survives longer.
/// Spec §4.C names five distinct values: 255 for the stack, 100 for pages,
/// 3 for the faulting static region `recover` itself pushes, 2 for a dst
/// box's *other* regions pushed wholesale during a switch (`boxswitch`),
/// and 1 for public-box regions.
pub const PRIORITY_SCR: u8 = 255;
pub const PRIORITY_PAGE: u8 = 100;
pub const PRIORITY_ACTIVE_BOX_REGION: u8 = 3;
pub const PRIORITY_OTHER_ACTIVE_BOX_REGION: u8 = 2;
pub const PRIORITY_PUBLIC_BOX_REGION: u8 = 1;

/// Translate a bit-band alias address to its underlying physical address:
/// `region_base + ((alias - alias_base) >> 5)`, since each bit-band word
/// covers one bit of one physical byte. Returns `None` for addresses
/// outside both alias windows.
pub fn bitband_to_addr(alias: usize) -> Option<usize> {
    if alias >= SRAM_BITBAND_ALIAS_BASE && alias < SRAM_BITBAND_ALIAS_END {
        let byte_offset = (alias - SRAM_BITBAND_ALIAS_BASE) >> 5;
        Some(SRAM_BITBAND_REGION_BASE + byte_offset)
    } else if alias >= PERIPH_BITBAND_ALIAS_BASE && alias < PERIPH_BITBAND_ALIAS_END {
        let byte_offset = (alias - PERIPH_BITBAND_ALIAS_BASE) >> 5;
        Some(PERIPH_BITBAND_REGION_BASE + byte_offset)
    } else {
        None
    }
}

/// Pure query, named after the external entry point it backs
/// (`vmpu_fault_find_acl`). Returns the raw ACL word, or `0` ("denied") on
/// any failure — callers outside this crate only see the zero/nonzero
/// convention. Translates bit-band aliases and consults the page heap
/// before region lookup, mirroring `recover`'s step order (spec §4.E
/// steps 2-4) so that P3 holds: `find_acl(a, size)` and
/// `find_acl(bitband_to_addr(a), size)` agree for any `a` in an alias
/// window.
pub fn find_acl<const N: usize, P: PageHeap>(
    regions: &RegionTable<N>,
    page_heap: &P,
    box_id: usize,
    addr: usize,
    size: usize,
) -> u32 {
    let addr = bitband_to_addr(addr).unwrap_or(addr);

    if addr == SCB_SCR_ADDR {
        // FIXME: use SECURE_ACCESS for SCR instead of a blanket UREAD|UWRITE override.
        return Acl::user_rw().raw();
    }
    if let Some(page) = page_heap.get_active_region_for_address(box_id, addr) {
        if page.to_region().contains_range(addr, size) {
            return page.acl.raw();
        }
        return 0;
    }
    if let Some(region) = regions.find_for_address(box_id, addr) {
        if region.contains_range(addr, size) {
            return region.acl.raw();
        }
        return 0;
    }
    if box_id != PUBLIC_BOX {
        if let Some(region) = regions.find_for_address(PUBLIC_BOX, addr) {
            if region.contains_range(addr, size) {
                return region.acl.raw();
            }
            return 0;
        }
    }
    0
}

/// Side-effecting recovery: locate the covering region/page for `addr` and
/// push it into the slot cache so the access retires transparently on
/// return. Distinct from `find_acl`, which never touches hardware state.
///
/// Follows spec §4.E's step order exactly: SCR special case, then the page
/// heap, then the active box's regions, then the public box's — a page and
/// a region can never legitimately overlap (the allocator and the static
/// ACL tables partition disjoint address ranges), but where the order
/// matters is that a page hit must `register_fault` and must not fall
/// through to a region lookup that could reject it as `PartiallyContained`
/// instead of growing the page.
pub fn recover<const N: usize, const K: usize, const S: usize, H: Hardware, P: PageHeap>(
    regions: &RegionTable<N>,
    page_heap: &mut P,
    slots: &mut SlotCache<K, S>,
    hw: &H,
    box_id: usize,
    fault_addr: usize,
    access_size: usize,
) -> Result<(), RecoveryError> {
    let addr = bitband_to_addr(fault_addr).unwrap_or(fault_addr);

    if addr == SCB_SCR_ADDR {
        // FIXME: use SECURE_ACCESS for SCR instead of a blanket UREAD|UWRITE override.
        let scr_region = Region::new(
            SCB_SCR_ADDR,
            SCB_SCR_ADDR + 4,
            Acl::user_rw(),
            RegionConfig::NONE,
        );
        slots.push(hw, scr_region, PRIORITY_SCR);
        return Ok(());
    }

    if let Some(page) = page_heap.get_active_region_for_address(box_id, addr) {
        let region = page.to_region();
        if !region.contains_range(addr, access_size) {
            return Err(RecoveryError::PartiallyContained);
        }
        page_heap.register_fault(page.page_id);
        slots.push(hw, region, PRIORITY_PAGE);
        return Ok(());
    }

    if let Some(region) = regions.find_for_address(box_id, addr) {
        if !region.contains_range(addr, access_size) {
            return Err(RecoveryError::PartiallyContained);
        }
        slots.push(hw, *region, PRIORITY_ACTIVE_BOX_REGION);
        return Ok(());
    }

    if box_id != PUBLIC_BOX {
        if let Some(region) = regions.find_for_address(PUBLIC_BOX, addr) {
            if !region.contains_range(addr, access_size) {
                return Err(RecoveryError::PartiallyContained);
            }
            slots.push(hw, *region, PRIORITY_PUBLIC_BOX_REGION);
            return Ok(());
        }
    }

    Err(RecoveryError::NotFound)
}

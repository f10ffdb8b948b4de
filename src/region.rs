// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Region table (component B) and the ACL/region data model.

use tock_registers::interfaces::Readable;
use tock_registers::{register_bitfields, LocalRegisterCopy};

/// Box 0, the "public" box whose regions are reachable from every box.
pub const PUBLIC_BOX: usize = 0;

register_bitfields![u32,
    pub AclFields [
        /// Non-secure user code may read this region.
        UREAD OFFSET(0) NUMBITS(1) [],
        /// Non-secure user code may write this region.
        UWRITE OFFSET(1) NUMBITS(1) [],
        /// Non-secure user code may execute from this region.
        UEXEC OFFSET(2) NUMBITS(1) [],
        /// Secure code may execute from this region.
        SEXEC OFFSET(3) NUMBITS(1) [],
        /// Region is a non-secure-callable gateway.
        NSC OFFSET(4) NUMBITS(1) []
    ]
];

/// Packed access-control word, opaque to every component except the
/// driver (A) and this lookup table (B).
///
/// Backed by a plain `u32` rather than `tock_registers::LocalRegisterCopy`
/// directly so that `Region`/`Acl` values can be built in `const` contexts
/// (box descriptors are `'static` tables); field access still goes through
/// `tock_registers`' named-bitfield reads, matching how RBAR/RLAR fields
/// are treated in `arch/cortex-m33/src/mpu_v8m.rs`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Acl(u32);

impl Acl {
    pub const fn from_raw(bits: u32) -> Self {
        Acl(bits)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn none() -> Self {
        Acl(0)
    }

    /// User read + write, used for data/stack regions and the SCR
    /// special-case synthesis.
    pub const fn user_rw() -> Self {
        Acl(0b0000_0011)
    }

    /// User read + execute, used for non-secure-executable code regions.
    pub const fn user_rx() -> Self {
        Acl(0b0000_0101)
    }

    /// Secure-execute-only, used for the flash regions the public box owns.
    pub const fn secure_execute() -> Self {
        Acl(0b0000_1000)
    }

    /// Secure-execute and non-secure-callable, used for the entry-point
    /// window.
    pub const fn non_secure_callable() -> Self {
        Acl(0b0001_1000)
    }

    fn local(self) -> LocalRegisterCopy<u32, AclFields::Register> {
        LocalRegisterCopy::new(self.0)
    }

    pub fn user_read(self) -> bool {
        self.local().is_set(AclFields::UREAD)
    }

    pub fn user_write(self) -> bool {
        self.local().is_set(AclFields::UWRITE)
    }

    pub fn user_execute(self) -> bool {
        self.local().is_set(AclFields::UEXEC)
    }

    pub fn secure_execute_flag(self) -> bool {
        self.local().is_set(AclFields::SEXEC)
    }

    pub fn non_secure_callable_flag(self) -> bool {
        self.local().is_set(AclFields::NSC)
    }
}

/// Opaque hint carried alongside a region to the driver layer. The only value this crate constructs is `PAGE`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct RegionConfig(pub u8);

impl RegionConfig {
    pub const NONE: RegionConfig = RegionConfig(0);
    pub const PAGE: RegionConfig = RegionConfig(1);
}

/// A half-open address interval plus an ACL and a hardware-config hint.
/// Identity is `(box_id, index-within-box)`, tracked by
/// whichever `RegionTable` slot holds it, not by the `Region` value itself.
#[derive(Copy, Clone, Debug)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub acl: Acl,
    pub config: RegionConfig,
}

impl Region {
    pub const fn new(start: usize, end: usize, acl: Acl, config: RegionConfig) -> Self {
        Self {
            start,
            end,
            acl,
            config,
        }
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    /// `true` iff the access `[addr, addr+size)` is fully contained in
    /// this region's extent.
    pub fn contains_range(&self, addr: usize, size: usize) -> bool {
        match addr.checked_add(size) {
            Some(end) => addr >= self.start && end <= self.end,
            None => false,
        }
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// Owns the per-box static ACL arrays built at init; answers "which region
/// covers address X in box B?" (component B). `N` bounds the number of
/// boxes this supervisor instance can hold.
pub struct RegionTable<const N: usize> {
    boxes: [Option<&'static [Region]>; N],
}

impl<const N: usize> RegionTable<N> {
    pub const fn new() -> Self {
        Self { boxes: [None; N] }
    }

    /// Install `box_id`'s static region array. Caller must not call this
    /// again for the same box after handing the table to a running
    /// supervisor.
    pub fn set_box(&mut self, box_id: usize, regions: &'static [Region]) {
        self.boxes[box_id] = Some(regions);
    }

    /// The ordered region slice for `box_id`. By convention the first
    /// element of a non-public box is its stack/context block, used by the box-switch component.
    pub fn get_for_box(&self, box_id: usize) -> &'static [Region] {
        self.boxes[box_id].unwrap_or(&[])
    }

    /// Linear scan returning the first covering entry. Undefined for
    /// overlapping regions, which this data model prohibits.
    pub fn find_for_address(&self, box_id: usize, addr: usize) -> Option<&'static Region> {
        self.get_for_box(box_id).iter().find(|r| r.contains(addr))
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Secure-state ARMv8-M memory-protection supervisor ("vMPU").
//!
//! Partitions an ARMv8-M core's address space into isolated "boxes" and,
//! on a Secure fault, decides whether some box's ACL (or the page heap)
//! permits the access and, if so, programs the MPU/SAU to make the fault
//! transparent. See `DESIGN.md` for the component breakdown this module
//! ties together.
//!
//! `no_std` except under `cfg(test)`, where `std` is used for the mock
//! hardware's interior mutability — grounded in
//! `oxidecomputer-hubris/sys/kerncore/src/lib.rs`'s
//! `#![cfg_attr(not(test), no_std)]` pattern.
#![cfg_attr(not(test), no_std)]

pub mod boxswitch;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod init;
pub mod pageheap;
pub mod recovery;
pub mod region;
pub mod slots;

use driver::Hardware;
use error::{FaultKind, HaltReason, RecoveryError};
use pageheap::PageHeap;
use region::{PUBLIC_BOX, RegionTable};
use slots::SlotCache;

/// Encapsulates every piece of global mutable state this supervisor owns,
/// rather than scattering `static mut`s through the crate. `H` is the hardware backend, `P` the page-heap
/// collaborator; `NBOXES`/`K`/`S_STATIC` are the fixed table sizes chosen
/// at `new()`.
pub struct Supervisor<H: Hardware, P: PageHeap, const NBOXES: usize, const K: usize, const S_STATIC: usize> {
    hw: H,
    page_heap: P,
    regions: RegionTable<NBOXES>,
    slots: SlotCache<K, S_STATIC>,
    active_box: usize,
    /// Stacked PC of the last recovered SecureFault, kept only so a
    /// subsequent halt can report it; never consulted by recovery itself.
    last_fault_pc: core::cell::Cell<u32>,
}

impl<H: Hardware, P: PageHeap, const NBOXES: usize, const K: usize, const S_STATIC: usize>
    Supervisor<H, P, NBOXES, K, S_STATIC>
{
    pub const fn new(hw: H, page_heap: P, regions: RegionTable<NBOXES>) -> Self {
        Self {
            hw,
            page_heap,
            regions,
            slots: SlotCache::new(),
            active_box: PUBLIC_BOX,
            last_fault_pc: core::cell::Cell::new(0),
        }
    }

    pub fn active_box(&self) -> usize {
        self.active_box
    }

    /// Program the fixed hardware slots and enable the SecureFault
    /// exception (component H). Must run exactly once before any box code
    /// executes.
    pub fn arch_init(&mut self, statics: init::StaticSlots, slot_indices: [usize; 4]) {
        init::arch_init(
            &self.hw,
            &mut self.slots,
            statics,
            slot_indices[0],
            slot_indices[1],
            slot_indices[2],
            slot_indices[3],
        );
    }

    /// Cross-box call/return (component G). Updates `active_box` only
    /// after hardware is fully reprogrammed, so a fault mid-switch cannot
    /// observe an inconsistent `active_box`.
    pub fn switch(&mut self, dst: usize) {
        boxswitch::switch(&self.regions, &self.page_heap, &mut self.slots, &self.hw, self.active_box, dst);
        self.active_box = dst;
    }

    /// External API: pure query, never
    /// touches hardware state.
    pub fn fault_find_acl(&self, box_id: usize, addr: usize, size: usize) -> u32 {
        recovery::find_acl(&self.regions, &self.page_heap, box_id, addr, size)
    }

    /// `vmpu_sys_mux_handler`: the system-exception entry point (component
    /// F). Reads the active vector off hardware, recovers a SecureFault
    /// in-line, and either returns `exc_return` unchanged (the faulting
    /// instruction is retried) or halts — this function never returns on
    /// any other outcome, per §6's "resume or halt" contract.
    pub fn sys_mux(&mut self, exc_return: u32, msp_s: usize) -> u32 {
        let ipsr = self.hw.cpu_ipsr();
        match self.handle_exception(ipsr, exc_return, msp_s) {
            Ok(()) => exc_return,
            Err(reason) => self.halt(reason),
        }
    }

    fn halt(&self, reason: HaltReason) -> ! {
        error::halt(reason, self.hw.sfsr(), self.hw.sfar(), self.last_fault_pc.get())
    }

    /// Dispatch one exception (component F), recovering a Secure fault
    /// in-line when the vector is SecureFault. Returns `Ok(())` once the
    /// faulting access has been made transparent, or the `HaltReason`
    /// the caller (`sys_mux`, or a test) should halt on. Kept separate
    /// from `sys_mux` so unit tests can observe the outcome without
    /// triggering the `panic!`-based halt.
    pub fn handle_exception(&mut self, ipsr: u32, exc_return: u32, msp_s: usize) -> Result<(), HaltReason> {
        match dispatch::classify(ipsr)? {
            dispatch::DispatchOutcome::Recover => self.handle_secure_fault(exc_return, msp_s),
        }
    }

    fn handle_secure_fault(&mut self, exc_return: u32, msp_s: usize) -> Result<(), HaltReason> {
        let sfsr = self.hw.sfsr();
        if sfsr & driver::SFSR_AUVIOL == 0 {
            return Err(HaltReason::FatalFault(FaultKind::NotAccessViolation));
        }
        if sfsr & driver::SFSR_SFARVALID == 0 {
            return Err(HaltReason::FatalFault(FaultKind::NoFaultAddress));
        }

        // Capture the stacked PC for diagnostics only; recovery itself
        // never consults it (spec §4.F step 3 / §9).
        let (_, sp) = self.hw.sp_for(exc_return, msp_s);
        let faulting_pc = self.hw.read_frame_word(sp, 6, driver::Privilege::Unprivileged);
        self.last_fault_pc.set(faulting_pc);

        let fault_addr = self.hw.sfar() as usize;
        self.hw.clear_sfsr();

        self.slots.begin_batch();
        match recovery::recover(
            &self.regions,
            &mut self.page_heap,
            &mut self.slots,
            &self.hw,
            self.active_box,
            fault_addr,
            4,
        ) {
            Ok(()) => Ok(()),
            Err(RecoveryError::NotFound) | Err(RecoveryError::PartiallyContained) => {
                Err(HaltReason::PermissionDenied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::MockHardware;
    use crate::pageheap::testing::FakePageHeap;
    use crate::region::{Acl, Region, RegionConfig};

    static BOX1: [Region; 1] =
        [Region::new(0x1000_0000, 0x1000_0100, Acl::user_rw(), RegionConfig::NONE)];

    fn supervisor() -> Supervisor<MockHardware, FakePageHeap, 4, 8, 0> {
        let mut regions = RegionTable::new();
        regions.set_box(1, &BOX1);
        Supervisor::new(MockHardware::new(8), FakePageHeap::new(), regions)
    }

    #[test]
    fn new_supervisor_starts_in_the_public_box() {
        let sup = supervisor();
        assert_eq!(sup.active_box(), PUBLIC_BOX);
    }

    #[test]
    fn switch_updates_active_box() {
        let mut sup = supervisor();
        sup.switch(1);
        assert_eq!(sup.active_box(), 1);
    }

    #[test]
    fn fault_find_acl_is_a_pure_query() {
        let sup = supervisor();
        let before = sup.active_box();
        let _ = sup.fault_find_acl(1, 0x1000_0010, 4);
        assert_eq!(sup.active_box(), before);
    }

    #[test]
    fn handle_exception_recovers_a_covered_secure_fault() {
        let mut sup = supervisor();
        sup.switch(1);
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x1000_0010);
        sup.hw.set_ipsr(7); // SecureFault vector
        assert_eq!(sup.handle_exception(7, 0, 0), Ok(()));
    }

    #[test]
    fn handle_exception_halts_on_permission_denied() {
        let mut sup = supervisor();
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x9999_0000);
        assert_eq!(sup.handle_exception(7, 0, 0), Err(HaltReason::PermissionDenied));
    }

    #[test]
    fn handle_exception_halts_on_non_access_violation_secure_fault() {
        let mut sup = supervisor();
        sup.hw.set_fault(0, 0);
        assert_eq!(
            sup.handle_exception(7, 0, 0),
            Err(HaltReason::FatalFault(FaultKind::NotAccessViolation))
        );
    }

    #[test]
    fn handle_exception_halts_fatal_faults_instead_of_recovering() {
        // HardFault (vector 3) must never reach the recovery path.
        let mut sup = supervisor();
        assert_eq!(
            sup.handle_exception(3, 0, 0),
            Err(HaltReason::FatalFault(FaultKind::HardFault))
        );
    }

    #[test]
    fn handle_exception_halts_on_reserved_vectors() {
        let mut sup = supervisor();
        assert_eq!(
            sup.handle_exception(11, 0, 0), // SVCall
            Err(HaltReason::UnexpectedVector(error::UnexpectedKind::SvCall))
        );
    }

    #[test]
    fn handle_exception_is_idempotent_for_the_same_repeated_fault() {
        // same fault dispatched twice must recover the same way both times.
        let mut sup = supervisor();
        sup.switch(1);
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x1000_0010);
        assert_eq!(sup.handle_exception(7, 0, 0), Ok(()));
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x1000_0010);
        assert_eq!(sup.handle_exception(7, 0, 0), Ok(()));
    }

    #[test]
    fn sys_mux_returns_exc_return_unchanged_on_recovery() {
        let mut sup = supervisor();
        sup.switch(1);
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x1000_0010);
        sup.hw.set_ipsr(7);
        assert_eq!(sup.sys_mux(0xFFFF_FFFD, 0x2000_1000), 0xFFFF_FFFD);
    }

    #[test]
    #[should_panic(expected = "vMPU halt")]
    fn sys_mux_halts_on_unrecoverable_fault() {
        let mut sup = supervisor();
        sup.hw.set_fault(driver::SFSR_AUVIOL | driver::SFSR_SFARVALID, 0x9999_0000);
        sup.hw.set_ipsr(7);
        let _ = sup.sys_mux(0xFFFF_FFFD, 0x2000_1000);
    }
}

// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Exception dispatcher (component F). Grounded in
//! `arch/cortex-v7m/src/lib.rs`'s `ipsr_isr_number_to_str`: classify the
//! active vector from IPSR, then branch. SecureFault routes to recovery
//! (E); NMI/HardFault/MemManage/BusFault/UsageFault/DebugMonitor are fatal;
//! SVCall/PendSV/SysTick and any external IRQ are vectors this supervisor
//! explicitly disclaims. None of those branches pass control anywhere
//! else — every one of them is either a recovery or a halt.

use crate::error::{FaultKind, HaltReason, UnexpectedKind};

/// CMSIS-style signed exception id: `ipsr - 16`, so the fixed system
/// exceptions are negative and external IRQs are `>= 0`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExceptionId {
    Nmi,
    HardFault,
    MemManage,
    BusFault,
    UsageFault,
    SecureFault,
    SvCall,
    DebugMonitor,
    PendSv,
    SysTick,
    /// A system-exception slot ARMv8-M reserves but assigns no meaning to.
    Reserved(i32),
    /// An external interrupt, i.e. `ipsr - 16 >= 0`.
    External(i32),
}

/// ARMv8-M SecureFault is vector 7, i.e. signed id `7 - 16 = -9`.
pub const SECURE_FAULT_ID: i32 = -9;

impl ExceptionId {
    pub fn from_signed(id: i32) -> Self {
        match id {
            -14 => ExceptionId::Nmi,
            -13 => ExceptionId::HardFault,
            -12 => ExceptionId::MemManage,
            -11 => ExceptionId::BusFault,
            -10 => ExceptionId::UsageFault,
            SECURE_FAULT_ID => ExceptionId::SecureFault,
            -5 => ExceptionId::SvCall,
            -4 => ExceptionId::DebugMonitor,
            -2 => ExceptionId::PendSv,
            -1 => ExceptionId::SysTick,
            id if id < 0 => ExceptionId::Reserved(id),
            id => ExceptionId::External(id),
        }
    }
}

/// Convert a raw IPSR value into the signed CMSIS exception id.
pub fn exception_id(ipsr: u32) -> i32 {
    (ipsr & 0x1FF) as i32 - 16
}

/// Outcome of classifying the active vector. The only vector this
/// supervisor ever resumes from is SecureFault; everything else it claims
/// is fatal by definition (spec §4.F/§7), so there is no "pass through and
/// let someone else handle it" outcome.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Route to the fault-recovery path (component E).
    Recover,
}

/// Classify the vector named by `ipsr`. Returns `Ok(Recover)` only for
/// SecureFault; every other system exception or external IRQ this core can
/// observe is a halt, per spec §4.F's "log and halt" / "no handler
/// registered" / "not a system interrupt" branches.
pub fn classify(ipsr: u32) -> Result<DispatchOutcome, HaltReason> {
    use ExceptionId::*;
    match ExceptionId::from_signed(exception_id(ipsr)) {
        SecureFault => Ok(DispatchOutcome::Recover),
        Nmi => Err(HaltReason::FatalFault(FaultKind::Nmi)),
        HardFault => Err(HaltReason::FatalFault(FaultKind::HardFault)),
        MemManage => Err(HaltReason::FatalFault(FaultKind::MemManage)),
        BusFault => Err(HaltReason::FatalFault(FaultKind::BusFault)),
        UsageFault => Err(HaltReason::FatalFault(FaultKind::UsageFault)),
        DebugMonitor => Err(HaltReason::FatalFault(FaultKind::DebugMonitor)),
        SvCall => Err(HaltReason::UnexpectedVector(UnexpectedKind::SvCall)),
        PendSv => Err(HaltReason::UnexpectedVector(UnexpectedKind::PendSv)),
        SysTick => Err(HaltReason::UnexpectedVector(UnexpectedKind::SysTick)),
        Reserved(id) | External(id) => {
            Err(HaltReason::UnexpectedVector(UnexpectedKind::UnknownVector(id)))
        }
    }
}

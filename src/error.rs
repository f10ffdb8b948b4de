// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Error and halt types. Faults are reported by formatting a full
//! diagnostic dump into a `panic!`, the same idiom
//! `arch/cortex-v7m/src/lib.rs`'s `hard_fault_handler_arm_v7m_kernel` uses.

use core::fmt;

/// Why a recovery attempt failed to produce an ACL (component E, internal).
/// Distinct from `HaltReason`: not every `RecoveryError` is fatal — the
/// public `find_acl` API collapses both variants to "denied".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecoveryError {
    /// No region or page in any searched box covers the faulting address.
    NotFound,
    /// A covering region exists but the access extent is not fully inside
    /// it.
    PartiallyContained,
}

/// A fault whose kind makes recovery meaningless — the core cannot make
/// forward progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// SFSR indicated something other than AUVIOL (invalid entry point,
    /// attribution unit violation on a Secure-only resource, etc).
    NotAccessViolation,
    /// SFARVALID was clear — no usable faulting address at all.
    NoFaultAddress,
    /// A non-maskable interrupt fired while this core was executing.
    Nmi,
    /// HardFault: escalated fault, or a fault this core cannot attribute to
    /// a more specific handler.
    HardFault,
    /// MemManage fault (MPU violation reported through the non-secure
    /// fault status register rather than SFSR).
    MemManage,
    /// BusFault: a bus error on an instruction or data access.
    BusFault,
    /// UsageFault: undefined instruction, unaligned access, or similar.
    UsageFault,
    /// DebugMonitor fault with debug disabled, or a debug event this core
    /// has no handler for.
    DebugMonitor,
}

/// An exception vector fired that the dispatcher did not expect to handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnexpectedKind {
    /// A reserved or external vector this supervisor has no table entry
    /// for.
    UnknownVector(i32),
    /// SVCall: no supervisor-call handler is registered at this layer.
    SvCall,
    /// PendSV: no scheduler exists at this layer (boxes are call-gated,
    /// not scheduled).
    PendSv,
    /// SysTick: no tick handler is registered at this layer.
    SysTick,
    ReenteredDuringRecovery,
}

/// Every reason the supervisor can stop making forward progress. Carried in
/// the idiom of `kernel::ErrorCode`-style enums this workspace's
/// `mpu::MPU` trait contracts use, rather than a bare `Err(())`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    FatalFault(FaultKind),
    PermissionDenied,
    UnexpectedVector(UnexpectedKind),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::FatalFault(FaultKind::NotAccessViolation) => {
                write!(f, "secure fault was not an access violation (SFSR.AUVIOL clear)")
            }
            HaltReason::FatalFault(FaultKind::NoFaultAddress) => {
                write!(f, "secure fault carried no valid fault address (SFSR.SFARVALID clear)")
            }
            HaltReason::FatalFault(FaultKind::Nmi) => write!(f, "non-maskable interrupt"),
            HaltReason::FatalFault(FaultKind::HardFault) => write!(f, "hard fault"),
            HaltReason::FatalFault(FaultKind::MemManage) => write!(f, "mem-manage fault"),
            HaltReason::FatalFault(FaultKind::BusFault) => write!(f, "bus fault"),
            HaltReason::FatalFault(FaultKind::UsageFault) => write!(f, "usage fault"),
            HaltReason::FatalFault(FaultKind::DebugMonitor) => write!(f, "debug monitor fault"),
            HaltReason::PermissionDenied => write!(f, "access denied by every searched box ACL"),
            HaltReason::UnexpectedVector(UnexpectedKind::UnknownVector(id)) => {
                write!(f, "unexpected exception vector (id={id})")
            }
            HaltReason::UnexpectedVector(UnexpectedKind::SvCall) => {
                write!(f, "no handler registered for SVCall")
            }
            HaltReason::UnexpectedVector(UnexpectedKind::PendSv) => {
                write!(f, "no handler registered for PendSV")
            }
            HaltReason::UnexpectedVector(UnexpectedKind::SysTick) => {
                write!(f, "no handler registered for SysTick")
            }
            HaltReason::UnexpectedVector(UnexpectedKind::ReenteredDuringRecovery) => {
                write!(f, "recovery path re-entered while already in progress")
            }
        }
    }
}

/// Format a diagnostic dump of `reason` plus the supplied register snapshot
/// and halt by panicking, mirroring `hard_fault_handler_arm_v7m_kernel`'s
/// "dump registers, then panic" structure. Never returns.
pub fn halt(reason: HaltReason, sfsr: u32, sfar: u32, faulting_pc: u32) -> ! {
    panic!(
        "vMPU halt: {reason}\r\n  SFSR = 0x{sfsr:08x}\r\n  SFAR = 0x{sfar:08x}\r\n  PC   = 0x{faulting_pc:08x}\r\n"
    );
}

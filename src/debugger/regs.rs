// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Register access across 32/64-bit variants of x86, ARM, and PowerPC.
//!
//! `PTRACE_GETREGSET` reports how many bytes it populated, which is what
//! distinguishes a 32-bit tracee from a 64-bit one under the same kernel.
//! The decoded PC/status/LR are the public output; the raw layouts stay
//! private to this module.
use nix::errno::Errno;
use nix::unistd::Pid;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegsWidth {
    W32,
    W64,
}

#[derive(Debug, Clone, Copy)]
pub struct PcStatus {
    pub pc: u64,
    pub status_reg: u64,
    pub width: RegsWidth,
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod layout {
    // every field is layout, not data; the byte count is what matters
    #![allow(dead_code)]

    #[repr(C)]
    pub struct UserRegs32 {
        pub ebx: u32,
        pub ecx: u32,
        pub edx: u32,
        pub esi: u32,
        pub edi: u32,
        pub ebp: u32,
        pub eax: u32,
        pub ds: u16,
        pub __ds: u16,
        pub es: u16,
        pub __es: u16,
        pub fs: u16,
        pub __fs: u16,
        pub gs: u16,
        pub __gs: u16,
        pub orig_eax: u32,
        pub eip: u32,
        pub cs: u16,
        pub __cs: u16,
        pub eflags: u32,
        pub esp: u32,
        pub ss: u16,
        pub __ss: u16,
    }

    #[repr(C)]
    pub struct UserRegs64 {
        pub r15: u64,
        pub r14: u64,
        pub r13: u64,
        pub r12: u64,
        pub bp: u64,
        pub bx: u64,
        pub r11: u64,
        pub r10: u64,
        pub r9: u64,
        pub r8: u64,
        pub ax: u64,
        pub cx: u64,
        pub dx: u64,
        pub si: u64,
        pub di: u64,
        pub orig_ax: u64,
        pub ip: u64,
        pub cs: u64,
        pub flags: u64,
        pub sp: u64,
        pub ss: u64,
        pub fs_base: u64,
        pub gs_base: u64,
        pub ds: u64,
        pub es: u64,
        pub fs: u64,
        pub gs: u64,
    }

    pub type Largest = UserRegs64;
}

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
mod layout {
    #![allow(dead_code)]

    pub const ARM_LR: usize = 14;
    pub const ARM_PC: usize = 15;
    pub const ARM_CPSR: usize = 16;

    #[repr(C)]
    pub struct UserRegs32 {
        pub uregs: [u32; 18],
    }

    #[repr(C)]
    pub struct UserRegs64 {
        pub regs: [u64; 31],
        pub sp: u64,
        pub pc: u64,
        pub pstate: u64,
    }

    // Old 32-bit ARM kernels fill garbage when handed a buffer larger than
    // their native regset, so the probe buffer stays 32-bit there.
    #[cfg(target_arch = "arm")]
    pub type Largest = UserRegs32;
    #[cfg(target_arch = "aarch64")]
    pub type Largest = UserRegs64;
}

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
mod layout {
    #![allow(dead_code)]

    // ELF_NGREG says 48 registers, the kernel zero-fills the tail
    #[repr(C)]
    pub struct UserRegs32 {
        pub gpr: [u32; 32],
        pub nip: u32,
        pub msr: u32,
        pub orig_gpr3: u32,
        pub ctr: u32,
        pub link: u32,
        pub xer: u32,
        pub ccr: u32,
        pub mq: u32,
        pub trap: u32,
        pub dar: u32,
        pub dsisr: u32,
        pub result: u32,
        pub zero: [u32; 4],
    }

    #[repr(C)]
    pub struct UserRegs64 {
        pub gpr: [u64; 32],
        pub nip: u64,
        pub msr: u64,
        pub orig_gpr3: u64,
        pub ctr: u64,
        pub link: u64,
        pub xer: u64,
        pub ccr: u64,
        pub softe: u64,
        pub trap: u64,
        pub dar: u64,
        pub dsisr: u64,
        pub result: u64,
        pub zero: [u64; 4],
    }

    pub type Largest = UserRegs64;
}

/// Fill `buf` from the NT_PRSTATUS regset and report how many bytes the
/// kernel populated. Falls back to the legacy whole-struct read where that
/// request exists.
fn getregset(pid: Pid, buf: *mut u8, len: usize) -> Option<usize> {
    let mut iov = libc::iovec {
        iov_base: buf as *mut libc::c_void,
        iov_len: len,
    };

    let ret = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGSET,
            pid.as_raw(),
            libc::NT_PRSTATUS as *mut libc::c_void,
            &mut iov as *mut libc::iovec,
        )
    };
    if ret != -1 {
        return Some(iov.iov_len);
    }

    log::debug!(
        "ptrace(PTRACE_GETREGSET) failed for pid {}: {}",
        pid,
        Errno::last()
    );
    getregs_fallback(pid, buf, len)
}

#[cfg(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "powerpc",
    target_arch = "powerpc64"
))]
fn getregs_fallback(pid: Pid, buf: *mut u8, len: usize) -> Option<usize> {
    let ret = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGS,
            pid.as_raw(),
            std::ptr::null_mut::<libc::c_void>(),
            buf as *mut libc::c_void,
        )
    };
    if ret == -1 {
        log::warn!(
            "Both PTRACE_GETREGSET and PTRACE_GETREGS failed to read registers of pid {}",
            pid
        );
        return None;
    }
    // the legacy request fills the native layout
    Some(len)
}

#[cfg(target_arch = "aarch64")]
fn getregs_fallback(pid: Pid, _buf: *mut u8, _len: usize) -> Option<usize> {
    log::warn!("No legacy register read available for pid {}", pid);
    None
}

/// Read the program counter and status register of a stopped task.
///
/// Returns `None` on an unknown structure size; callers treat that as an
/// unsupported target and skip deep analysis.
pub fn read_pc_status(pid: Pid) -> Option<PcStatus> {
    let mut regs: layout::Largest = unsafe { mem::zeroed() };
    let len = getregset(
        pid,
        &mut regs as *mut layout::Largest as *mut u8,
        mem::size_of::<layout::Largest>(),
    )?;

    decode_pc_status(&regs as *const layout::Largest as *const u8, len)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn decode_pc_status(buf: *const u8, len: usize) -> Option<PcStatus> {
    use layout::*;

    if len == mem::size_of::<UserRegs32>() {
        let r32 = unsafe { &*(buf as *const UserRegs32) };
        return Some(PcStatus {
            pc: u64::from(r32.eip),
            status_reg: u64::from(r32.eflags),
            width: RegsWidth::W32,
        });
    }
    if len == mem::size_of::<UserRegs64>() {
        let r64 = unsafe { &*(buf as *const UserRegs64) };
        return Some(PcStatus {
            pc: r64.ip,
            status_reg: r64.flags,
            width: RegsWidth::W64,
        });
    }
    log::warn!("Unknown registers structure size: {}", len);
    None
}

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
fn decode_pc_status(buf: *const u8, len: usize) -> Option<PcStatus> {
    use layout::*;

    if len == mem::size_of::<UserRegs32>() {
        let r32 = unsafe { &*(buf as *const UserRegs32) };
        return Some(PcStatus {
            pc: u64::from(r32.uregs[ARM_PC]),
            status_reg: u64::from(r32.uregs[ARM_CPSR]),
            width: RegsWidth::W32,
        });
    }
    if len == mem::size_of::<UserRegs64>() {
        let r64 = unsafe { &*(buf as *const UserRegs64) };
        return Some(PcStatus {
            pc: r64.pc,
            status_reg: r64.pstate,
            width: RegsWidth::W64,
        });
    }
    log::warn!("Unknown registers structure size: {}", len);
    None
}

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
fn decode_pc_status(buf: *const u8, len: usize) -> Option<PcStatus> {
    use layout::*;

    if len == mem::size_of::<UserRegs32>() {
        let r32 = unsafe { &*(buf as *const UserRegs32) };
        return Some(PcStatus {
            pc: u64::from(r32.nip),
            status_reg: 0,
            width: RegsWidth::W32,
        });
    }
    if len == mem::size_of::<UserRegs64>() {
        let r64 = unsafe { &*(buf as *const UserRegs64) };
        return Some(PcStatus {
            pc: r64.nip,
            status_reg: 0,
            width: RegsWidth::W64,
        });
    }
    log::warn!("Unknown registers structure size: {}", len);
    None
}

/// Read the ARM link register of a stopped task. Used to sharpen the
/// fingerprint of single-frame backtraces.
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
pub fn read_link_register(pid: Pid) -> Option<u64> {
    use layout::*;

    let mut regs: Largest = unsafe { mem::zeroed() };
    let len = getregset(
        pid,
        &mut regs as *mut Largest as *mut u8,
        mem::size_of::<Largest>(),
    )?;

    let buf = &regs as *const Largest as *const u8;
    if len == mem::size_of::<UserRegs32>() {
        let r32 = unsafe { &*(buf as *const UserRegs32) };
        return Some(u64::from(r32.uregs[ARM_LR]));
    }
    if len == mem::size_of::<UserRegs64>() {
        let r64 = unsafe { &*(buf as *const UserRegs64) };
        return Some(r64.regs[30]);
    }
    log::warn!("Unknown registers structure size: {}", len);
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        // the byte-count dispatch depends on these matching the kernel
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            assert_eq!(mem::size_of::<layout::UserRegs32>(), 68);
            assert_eq!(mem::size_of::<layout::UserRegs64>(), 216);
        }
        #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
        {
            assert_eq!(mem::size_of::<layout::UserRegs32>(), 72);
            assert_eq!(mem::size_of::<layout::UserRegs64>(), 272);
        }
    }

    #[test]
    fn test_read_nonexistent_task() {
        assert!(read_pc_status(Pid::from_raw(0x7fff_fffe)).is_none());
    }
}

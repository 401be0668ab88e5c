// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Instruction text extraction.
//!
//! The concrete disassembler is an external collaborator behind the
//! [Disassembler] trait; this module reads the bytes at PC, selects the
//! disassembly mode from the observed register width, and sanitizes the
//! result so it is safe to embed in filenames.
use nix::unistd::Pid;

use crate::debugger::memory::read_process_memory;
use crate::debugger::regs::{self, RegsWidth};

/// Upper bound on sanitized instruction text.
pub const INSTR_SZ: usize = 64;

/// Bytes to fetch at PC, enough for the longest instruction.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub const MAX_INSTR_BYTES: usize = 16;
#[cfg(target_arch = "aarch64")]
pub const MAX_INSTR_BYTES: usize = 8;
#[cfg(any(target_arch = "arm", target_arch = "powerpc", target_arch = "powerpc64"))]
pub const MAX_INSTR_BYTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasmMode {
    X86_32,
    X86_64,
    Arm,
    Thumb,
    AArch64,
    PowerPc32,
    PowerPc64,
}

/// External disassembler seam: render the first instruction in `bytes` as
/// `mnemonic operands`, or `None` when the stream doesn't decode.
pub trait Disassembler {
    fn disassemble(&self, pid: Pid, bytes: &[u8], mode: DisasmMode) -> Option<String>;
}

/// Disassembler for targets without one; every stream is undecodable.
pub struct NullDisassembler;

impl Disassembler for NullDisassembler {
    fn disassemble(&self, _pid: Pid, _bytes: &[u8], _mode: DisasmMode) -> Option<String> {
        None
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn select_mode(width: RegsWidth, _status_reg: u64) -> DisasmMode {
    match width {
        RegsWidth::W64 => DisasmMode::X86_64,
        RegsWidth::W32 => DisasmMode::X86_32,
    }
}

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
fn select_mode(width: RegsWidth, status_reg: u64) -> DisasmMode {
    match width {
        RegsWidth::W64 => DisasmMode::AArch64,
        // THUMB iff bit 5 of CPSR is set
        RegsWidth::W32 => {
            if status_reg & 0x20 != 0 {
                DisasmMode::Thumb
            } else {
                DisasmMode::Arm
            }
        }
    }
}

#[cfg(any(target_arch = "powerpc", target_arch = "powerpc64"))]
fn select_mode(width: RegsWidth, _status_reg: u64) -> DisasmMode {
    match width {
        RegsWidth::W64 => DisasmMode::PowerPc64,
        RegsWidth::W32 => DisasmMode::PowerPc32,
    }
}

/// Replace path separators, whitespace, and non-printable bytes with `_`
/// and bound the length, making the text filename-safe.
pub fn sanitize_instruction(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c == '/' || c == '\\' || !c.is_ascii_graphic() {
                '_'
            } else {
                c
            }
        })
        .take(INSTR_SZ)
        .collect()
}

/// Produce the instruction text for a stopped task.
///
/// `pc` and `status_reg` are canonicalized from the task's registers for
/// re-use by the caller. Failure branches yield the literal `[UNKNOWN]`
/// (registers unreadable or stream undecodable) or `[NOT_MMAPED]` (PC
/// unreadable).
pub fn instruction_string(
    pid: Pid,
    pc: &mut u64,
    status_reg: &mut u64,
    disassembler: &dyn Disassembler,
) -> String {
    let ps = match regs::read_pc_status(pid) {
        Some(ps) => ps,
        None => {
            log::warn!("Current architecture not supported for disassembly");
            return "[UNKNOWN]".to_string();
        }
    };
    *pc = ps.pc;
    *status_reg = ps.status_reg;

    let mut buf = [0u8; MAX_INSTR_BYTES];
    let count = read_process_memory(pid, ps.pc, &mut buf);
    if count == 0 {
        return "[NOT_MMAPED]".to_string();
    }

    let raw = match disassembler.disassemble(pid, &buf[..count], select_mode(ps.width, ps.status_reg))
    {
        Some(text) => text,
        None => {
            log::warn!("Couldn't disassemble the instruction stream of pid {}", pid);
            "[UNKNOWN]".to_string()
        }
    };

    sanitize_instruction(&raw)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_instruction("mov eax, 0x1"), "mov_eax,_0x1");
        assert_eq!(sanitize_instruction("ldr\tr0, [pc]"), "ldr_r0,_[pc]");
        assert_eq!(sanitize_instruction("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_instruction("[UNKNOWN]"), "[UNKNOWN]");
        assert_eq!(sanitize_instruction("x\u{7f}\u{1b}y"), "x__y");
    }

    #[test]
    fn test_sanitize_output_is_filename_safe() {
        let nasty: String = (0u8..=255).map(|b| b as char).collect();
        let clean = sanitize_instruction(&nasty);
        assert!(clean.len() <= INSTR_SZ);
        for c in clean.chars() {
            assert!(c.is_ascii_graphic());
            assert!(c != '/' && c != '\\');
            assert!(!c.is_whitespace());
        }
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[test]
    fn test_mode_select() {
        assert_eq!(select_mode(RegsWidth::W64, 0), DisasmMode::X86_64);
        assert_eq!(select_mode(RegsWidth::W32, 0), DisasmMode::X86_32);
    }
}

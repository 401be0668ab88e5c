// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! The frame and crash-context data model shared by the ptrace save path,
//! the verifier analyze path, and the sanitizer report parser.

/// Upper bound on the number of frames kept per backtrace.
pub const MAX_FRAMES: usize = 80;

/// Upper bound on symbol/module name length in a frame.
pub const SYMBOL_SZ: usize = 256;

/// A single stack level. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Instruction address; zero when unknown.
    pub pc: u64,
    /// Symbol or module name; possibly empty.
    pub symbol: String,
    /// Source line or module offset.
    pub offset: u32,
}

impl Frame {
    pub fn from_pc(pc: u64) -> Frame {
        Frame {
            pc,
            ..Frame::default()
        }
    }

    /// Bounded copy of a symbol or module name into the frame.
    pub fn set_symbol(&mut self, name: &str) {
        let mut end = name.len().min(SYMBOL_SZ);
        // don't split a multi-byte character
        while end > 0 && !name.is_char_boundary(end) {
            end -= 1;
        }
        self.symbol = name[..end].to_string();
    }
}

/// Everything recovered about one crash event, handed from analysis to the
/// admission filter and the artifact writer.
#[derive(Debug)]
pub struct CrashContext {
    /// Task the event was delivered for.
    pub pid: i32,
    pub signo: i32,
    pub si_code: i32,
    /// `si_addr`; zeroed for user-generated signals.
    pub fault_addr: u64,
    /// True when the signal was raised by a user process, not a fault.
    pub from_user: bool,
    pub pc: u64,
    pub status_reg: u64,
    /// Sanitized instruction text, safe to embed in filenames.
    pub instr: String,
    pub frames: Vec<Frame>,
    /// Callstack fingerprint; zero when no uniqueness can be established.
    pub backtrace: u64,
}

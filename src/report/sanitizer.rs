// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Processing and extraction of sanitizer reports.
//!
//! Sanitizer runtimes signal a detected violation through a reserved
//! process exit code and drop a textual report at
//! `<work_dir>/.san.<pid>`. The report is written asynchronously by
//! whichever task tripped the sanitizer, so the task whose exit we observe
//! first may find no file yet; a sibling consumes it later. Parsing is a
//! small synchronous state machine over lines (header search, then frame
//! collection until an empty line), and the file is unlinked once parsed so
//! it is consumed exactly once.
use regex::Regex;
use std::fs;
use std::path::Path;

use crate::frames::{Frame, MAX_FRAMES};

/// Exit codes reserved for sanitizer runtimes in fuzzed children.
pub const MSAN_EXIT_CODE: i32 = 103;
pub const ASAN_EXIT_CODE: i32 = 104;
pub const UBSAN_EXIT_CODE: i32 = 105;

/// Prefix of per-task sanitizer log files inside the workspace.
pub const LOG_PREFIX: &str = ".san";

lazy_static! {
    static ref R_FRAME: Regex =
        Regex::new(r"^#(\d+)\s+(0x[0-9a-fA-F]+)\s+\((.+)\+0x([0-9a-fA-F]+)\)").unwrap();
    static ref R_FRAME_BARE: Regex = Regex::new(r"^#(\d+)\s+(0x[0-9a-fA-F]+)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizerKind {
    Msan,
    Asan,
    Ubsan,
}

impl SanitizerKind {
    pub fn from_exit_code(code: i32) -> Option<SanitizerKind> {
        match code {
            MSAN_EXIT_CODE => Some(SanitizerKind::Msan),
            ASAN_EXIT_CODE => Some(SanitizerKind::Asan),
            UBSAN_EXIT_CODE => Some(SanitizerKind::Ubsan),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SanitizerKind::Msan => "MSAN",
            SanitizerKind::Asan => "ASAN",
            SanitizerKind::Ubsan => "UBSAN",
        }
    }
}

/// Kind of access that tripped the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    Read,
    Write,
    Unknown,
}

impl AccessOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessOp::Read => "READ",
            AccessOp::Write => "WRITE",
            AccessOp::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug)]
pub struct SanitizerReport {
    /// Crash-thread frames, innermost first, bounded by [MAX_FRAMES].
    pub frames: Vec<Frame>,
    pub fault_addr: u64,
    pub op: AccessOp,
}

#[derive(Debug, PartialEq)]
enum ParseState {
    HeaderSearch,
    FrameCollect,
}

/// Parse and consume the sanitizer report of `pid`.
///
/// Returns `None` when the file cannot be opened, most often because the
/// sibling task that tripped the sanitizer has not written it yet. The
/// caller must leave its bookkeeping untouched so a later task of the same
/// process retries.
pub fn consume_report(work_dir: &Path, pid: i32) -> Option<SanitizerReport> {
    let path = work_dir.join(format!("{}.{}", LOG_PREFIX, pid));

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Couldn't open '{}' - R/O mode: {}", path.display(), e);
            return None;
        }
    };

    let report = parse_report(&text, pid);

    // consumed exactly once; siblings must not double-parse
    if let Err(e) = fs::remove_file(&path) {
        log::warn!("Couldn't unlink '{}': {}", path.display(), e);
    }

    Some(report)
}

fn parse_report(text: &str, pid: i32) -> SanitizerReport {
    let header = format!("=={}==ERROR: AddressSanitizer:", pid);

    let mut state = ParseState::HeaderSearch;
    let mut fault_addr = 0u64;
    let mut addr_token: Option<String> = None;
    let mut op = AccessOp::Unknown;
    let mut frames: Vec<Frame> = Vec::new();

    for raw_line in text.lines() {
        match state {
            ParseState::HeaderSearch => {
                if raw_line.len() > header.len() && raw_line.starts_with(&header) {
                    state = ParseState::FrameCollect;

                    if let Some(pos) = raw_line.find("address 0x") {
                        let tail = &raw_line[pos + "address ".len()..];
                        let token = tail.split(' ').next().unwrap_or("");
                        fault_addr =
                            u64::from_str_radix(token.trim_start_matches("0x"), 16).unwrap_or(0);
                        if !token.is_empty() {
                            addr_token = Some(token.to_string());
                        }
                    }
                }
            }
            ParseState::FrameCollect => {
                let line = raw_line.trim_start();

                // the crash-thread stack ends at the first empty line
                if line.is_empty() && !frames.is_empty() {
                    break;
                }
                if line.len() < 10 {
                    continue;
                }

                // the line naming the crash address carries the access kind
                if let Some(token) = &addr_token {
                    if line.contains(token.as_str()) {
                        if line.starts_with("READ") {
                            op = AccessOp::Read;
                        } else if line.starts_with("WRITE") {
                            op = AccessOp::Write;
                        }
                    }
                }

                if let Some(caps) = R_FRAME.captures(line) {
                    let index: usize = caps[1].parse().unwrap_or(usize::MAX);
                    if index != frames.len() {
                        continue;
                    }
                    if frames.len() >= MAX_FRAMES {
                        break;
                    }

                    let mut frame = Frame::from_pc(
                        u64::from_str_radix(caps[2].trim_start_matches("0x"), 16).unwrap_or(0),
                    );
                    frame.set_symbol(&caps[3]);
                    frame.offset = u64::from_str_radix(&caps[4], 16).unwrap_or(0) as u32;
                    frames.push(frame);
                } else if let Some(caps) = R_FRAME_BARE.captures(line) {
                    let index: usize = caps[1].parse().unwrap_or(usize::MAX);
                    if index != frames.len() {
                        continue;
                    }
                    if frames.len() >= MAX_FRAMES {
                        break;
                    }

                    log::debug!("Invalid sanitizer report entry ({})", line);
                    frames.push(Frame::from_pc(
                        u64::from_str_radix(caps[2].trim_start_matches("0x"), 16).unwrap_or(0),
                    ));
                }
            }
        }
    }

    SanitizerReport {
        frames,
        fault_addr,
        op,
    }
}

// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Crash artifact persistence.
//!
//! A saved crash is the input file copied under a filename that itself
//! encodes the fingerprint, plus a sibling `.report` file of newline-
//! terminated `KEY: VALUE` records ending in a stack table, plus an
//! optional `.maps` snapshot of the target's address space.
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::frames::{CrashContext, Frame};
use crate::platform::linux::signal_to_string;
use crate::report::sanitizer::{AccessOp, SanitizerKind};
use crate::util::{local_time_stamp, ptr_literal, reg_literal};
use crate::worker::WorkerScratch;

pub mod sanitizer;

/// Filename for a crash caught as a stop signal.
///
/// Dry-run verifier replays keep the original input name so the re-run can
/// be compared directly. Unique mode encodes the fingerprint alone; the
/// fallback appends a timestamp and the task id so nothing ever collides.
pub(crate) fn signal_crash_filename(
    cfg: &Config,
    worker: &WorkerScratch,
    ctx: &CrashContext,
    save_unique: bool,
) -> PathBuf {
    if cfg.is_dry_run() && cfg.use_verifier {
        return cfg.work_dir.join(&worker.orig_file_name);
    }

    let mut pc = ctx.pc;
    let mut addr = ctx.fault_addr;
    if cfg.disable_randomization {
        // merge ASLR-permuted duplicates
        pc = 0;
        addr = 0;
    }
    if ctx.from_user {
        // user-induced signals don't carry si_addr
        addr = 0;
    }

    let base = format!(
        "{}.PC.{}.STACK.{:x}.CODE.{}.ADDR.{}.INSTR.{}",
        signal_to_string(ctx.signo),
        reg_literal(pc),
        ctx.backtrace,
        ctx.si_code,
        ptr_literal(addr),
        ctx.instr,
    );

    let name = if save_unique {
        format!("{}.{}", base, cfg.file_extn)
    } else {
        format!(
            "{}.{}.{}.{}",
            base,
            local_time_stamp(),
            ctx.pid,
            cfg.file_extn
        )
    };
    cfg.work_dir.join(name)
}

/// Filename for a crash detected through a sanitizer exit code. The format
/// stays identical to the signal path for post-campaign tooling; the CODE
/// field carries the access kind and the instruction is never known.
pub(crate) fn sanitizer_crash_filename(
    cfg: &Config,
    worker: &WorkerScratch,
    kind: SanitizerKind,
    op: AccessOp,
    ctx: &CrashContext,
) -> PathBuf {
    if cfg.is_dry_run() && cfg.use_verifier {
        return cfg.work_dir.join(&worker.orig_file_name);
    }

    let mut pc = ctx.pc;
    let mut addr = ctx.fault_addr;
    if cfg.disable_randomization {
        pc = 0;
        addr = 0;
    }

    let base = format!(
        "{}.PC.{}.STACK.{:x}.CODE.{}.ADDR.{}.INSTR.{}",
        kind.tag(),
        reg_literal(pc),
        ctx.backtrace,
        op.as_str(),
        ptr_literal(addr),
        ctx.instr,
    );

    let name = if ctx.backtrace != 0 && cfg.save_unique {
        format!("{}.{}", base, cfg.file_extn)
    } else {
        // without a stack hash every crash is treated as unique
        format!(
            "{}.{}.{}.{}",
            base,
            local_time_stamp(),
            ctx.pid,
            cfg.file_extn
        )
    };
    cfg.work_dir.join(name)
}

fn frame_line(fr: &Frame) -> String {
    if fr.symbol.is_empty() {
        format!(" <{}> []", reg_literal(fr.pc))
    } else {
        format!(" <{}> [{} + 0x{:x}]", reg_literal(fr.pc), fr.symbol, fr.offset)
    }
}

/// Emit the `.report` sibling of a saved signal crash.
pub(crate) fn write_signal_report(worker: &WorkerScratch, ctx: &CrashContext) {
    let mut report = String::new();
    writeln!(report, "ORIG_FNAME: {}", worker.orig_file_name).unwrap();
    writeln!(report, "FUZZ_FNAME: {}", worker.crash_file_name.display()).unwrap();
    writeln!(report, "PID: {}", ctx.pid).unwrap();
    writeln!(
        report,
        "SIGNAL: {} ({})",
        signal_to_string(ctx.signo),
        ctx.signo
    )
    .unwrap();
    writeln!(
        report,
        "FAULT ADDRESS: {}",
        ptr_literal(if ctx.from_user { 0 } else { ctx.fault_addr })
    )
    .unwrap();
    writeln!(report, "INSTRUCTION: {}", ctx.instr).unwrap();
    writeln!(report, "STACK HASH: {:016x}", ctx.backtrace).unwrap();
    writeln!(report, "STACK:").unwrap();
    for fr in &ctx.frames {
        writeln!(report, "{}", frame_line(fr)).unwrap();
    }

    // libunwind can't walk 32-bit targets from a 64-bit tracer
    #[cfg(target_arch = "aarch64")]
    if ctx.frames.is_empty() {
        writeln!(
            report,
            " !ERROR: If 32bit fuzz target in aarch64 system, try ARM 32bit build"
        )
        .unwrap();
    }

    persist_report(worker, report);
}

/// Emit the `.report` sibling of a saved sanitizer-exit crash.
pub(crate) fn write_sanitizer_report(
    worker: &WorkerScratch,
    ctx: &CrashContext,
    exit_code: i32,
    kind: SanitizerKind,
    op: AccessOp,
) {
    let mut report = String::new();
    writeln!(report, "ORIG_FNAME: {}", worker.orig_file_name).unwrap();
    writeln!(report, "FUZZ_FNAME: {}", worker.crash_file_name.display()).unwrap();
    writeln!(report, "PID: {}", ctx.pid).unwrap();
    writeln!(report, "EXIT CODE: {} ({})", exit_code, kind.tag()).unwrap();
    writeln!(report, "OPERATION: {}", op.as_str()).unwrap();
    writeln!(report, "FAULT ADDRESS: {}", ptr_literal(ctx.fault_addr)).unwrap();
    if !ctx.frames.is_empty() {
        writeln!(report, "STACK HASH: {:016x}", ctx.backtrace).unwrap();
        writeln!(report, "STACK:").unwrap();
        for fr in &ctx.frames {
            writeln!(report, "{}", frame_line(fr)).unwrap();
        }
    }

    persist_report(worker, report);
}

fn persist_report(worker: &WorkerScratch, report: String) {
    let path = worker.crash_file_name.with_extension("report");
    if let Err(e) = fs::write(&path, report) {
        log::error!("Couldn't write report '{}': {}", path.display(), e);
    }
}

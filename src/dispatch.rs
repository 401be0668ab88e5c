// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Status-word interpretation and crash-path routing.
//!
//! Each worker funnels the `(status, pid)` tuples it collects for its
//! target through [CrashAnalyzer::analyze]. Stops with an important signal
//! run the full save path (or the analyze-only path on verifier workers),
//! sanitizer-reserved exit codes run the report-parsing path, and
//! everything else is either resumed or ignored. An unclassifiable status
//! word is a programming error and aborts the worker.
use nix::sys::ptrace::{getevent, getsiginfo};
use nix::unistd::Pid;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::debugger::ptrace::resume;
use crate::debugger::regs::read_pc_status;
use crate::disasm::{instruction_string, Disassembler};
use crate::files::{self, CopyOutcome};
use crate::frames::{CrashContext, Frame};
use crate::hashing::hash_callstack;
use crate::platform::linux::{
    is_important_signal, si_code_to_string, si_from_user, signal_to_string,
};
use crate::report;
use crate::report::sanitizer::{consume_report, AccessOp, SanitizerKind};
use crate::stats::GlobalStats;
use crate::unwind::{collect_backtrace, SymbolResolver, Unwinder};
use crate::util::ptr_literal;
use crate::worker::WorkerScratch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// Stopped with a ptrace event in the upper status bits.
    StoppedEvent { sig: i32, event: i32 },
    StoppedSignal { sig: i32 },
    Continued,
    Exited { code: i32 },
    Signaled { sig: i32 },
    Unknown,
}

pub(crate) fn classify(status: i32) -> StatusClass {
    if libc::WIFSTOPPED(status) {
        let event = (status >> 16) & 0xffff;
        let sig = libc::WSTOPSIG(status);
        if event != 0 {
            return StatusClass::StoppedEvent { sig, event };
        }
        return StatusClass::StoppedSignal { sig };
    }
    if libc::WIFCONTINUED(status) {
        return StatusClass::Continued;
    }
    if libc::WIFEXITED(status) {
        return StatusClass::Exited {
            code: libc::WEXITSTATUS(status),
        };
    }
    if libc::WIFSIGNALED(status) {
        return StatusClass::Signaled {
            sig: libc::WTERMSIG(status),
        };
    }
    StatusClass::Unknown
}

/// Triage engine shared by all workers supervising targets.
///
/// Holds the immutable configuration, the global counters, and the external
/// collaborators (unwinder, symbol resolver, disassembler) behind their
/// trait seams.
pub struct CrashAnalyzer {
    cfg: Arc<Config>,
    stats: Arc<GlobalStats>,
    unwinder: Box<dyn Unwinder + Send + Sync>,
    resolver: Box<dyn SymbolResolver + Send + Sync>,
    disassembler: Box<dyn Disassembler + Send + Sync>,
}

impl CrashAnalyzer {
    pub fn new(
        cfg: Arc<Config>,
        stats: Arc<GlobalStats>,
        unwinder: Box<dyn Unwinder + Send + Sync>,
        resolver: Box<dyn SymbolResolver + Send + Sync>,
        disassembler: Box<dyn Disassembler + Send + Sync>,
    ) -> CrashAnalyzer {
        CrashAnalyzer {
            cfg,
            stats,
            unwinder,
            resolver,
            disassembler,
        }
    }

    /// Interpret one wait status for `pid` and run the matching path.
    pub fn analyze(&self, status: i32, pid: Pid, worker: &mut WorkerScratch) {
        match classify(status) {
            StatusClass::StoppedEvent { event, .. } => self.handle_event(event, pid, worker),
            StatusClass::StoppedSignal { sig } => {
                if is_important_signal(sig) {
                    if worker.main_worker {
                        self.save_crash(pid, worker);
                    } else {
                        self.analyze_crash(pid, worker);
                    }
                }
                resume(pid, sig);
            }
            // resumed by SIGCONT delivery, or killed by the scheduler
            StatusClass::Continued | StatusClass::Signaled { .. } => {}
            StatusClass::Exited { code } => {
                if let Some(kind) = SanitizerKind::from_exit_code(code) {
                    self.save_sanitizer_exit(pid, worker, code, kind);
                }
            }
            StatusClass::Unknown => {
                panic!("Unclassifiable wait status {:#x} for pid {}", status, pid)
            }
        }
    }

    fn handle_event(&self, event: i32, pid: Pid, worker: &mut WorkerScratch) {
        log::debug!("pid: {}, ptrace event: {}", pid, event);

        if event == libc::PTRACE_EVENT_EXIT {
            match getevent(pid) {
                Ok(msg) => {
                    // The event message carries the tracee's wait status.
                    // Some ABIs truncate it; treat anything unrecognizable
                    // as a plain exit instead of guessing.
                    let msg = msg as i32;
                    if libc::WIFEXITED(msg) {
                        let code = libc::WEXITSTATUS(msg);
                        log::debug!("pid {} exited with exit code {}", pid, code);
                        if let Some(kind) = SanitizerKind::from_exit_code(code) {
                            self.save_sanitizer_exit(pid, worker, code, kind);
                        }
                    } else if libc::WIFSIGNALED(msg) {
                        log::debug!(
                            "pid {} terminated with signal {}",
                            pid,
                            libc::WTERMSIG(msg)
                        );
                    } else {
                        log::debug!("pid {} exit event with unknown status {}", pid, msg);
                    }
                }
                Err(e) => log::error!("ptrace(PTRACE_GETEVENTMSG, {}) failed: {}", pid, e),
            }
        }

        resume(pid, 0);
    }

    /// Full save path, run by the authoritative worker on an important
    /// stop signal.
    fn save_crash(&self, pid: Pid, worker: &mut WorkerScratch) {
        let cfg = &self.cfg;
        // local copy, overridden for some crashes
        let mut save_unique = cfg.save_unique;

        let si: libc::siginfo_t = match getsiginfo(pid) {
            Ok(si) => si,
            Err(e) => {
                log::warn!("Couldn't get siginfo for pid {}: {}", pid, e);
                unsafe { mem::zeroed() }
            }
        };
        let from_user = si_from_user(&si);
        let fault_addr = unsafe { si.si_addr() } as u64;

        let mut pc = 0u64;
        let mut status_reg = 0u64;
        let instr = instruction_string(pid, &mut pc, &mut status_reg, self.disassembler.as_ref());

        log::debug!(
            "pid: {}, signo: {}, code: {} ({}), addr: {}, pc: {:#x}, instr: '{}'",
            pid,
            si.si_signo,
            si.si_code,
            si_code_to_string(si.si_signo, si.si_code as i8),
            ptr_literal(fault_addr),
            pc,
            instr
        );

        if !from_user && pc != 0 && fault_addr < cfg.ignore_addr {
            log::info!(
                "'{}' is interesting ({}), but the fault address {} is below {:#x}, skipping",
                worker.file_name,
                signal_to_string(si.si_signo),
                ptr_literal(fault_addr),
                cfg.ignore_addr
            );
            return;
        }

        let mut frames = collect_backtrace(pid, self.unwinder.as_ref(), self.resolver.as_ref());

        // If the unwinder produced nothing, the register PC stands in as a
        // synthetic frame 0. Without even that, a zero hash is not safe
        // for uniqueness decisions.
        if frames.is_empty() {
            if pc != 0 {
                frames.push(Frame::from_pc(pc));
            } else {
                save_unique = false;
            }
        }

        let old_backtrace = worker.backtrace;
        worker.backtrace = hash_callstack(&frames, cfg.num_major_frames, save_unique);

        if cfg.use_san_cov {
            worker.san_cov.crashes += 1;
        }

        // Single-frame callstacks are weak. On ARM the link register buys
        // back some discrimination; elsewhere uniqueness is dropped so the
        // crash still gets a timestamped save.
        if save_unique && frames.len() == 1 {
            #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
            {
                use crate::debugger::regs::read_link_register;
                use crate::hashing::mix_link_register;
                match read_link_register(pid) {
                    Some(lr) if lr != 0 => {
                        worker.backtrace = mix_link_register(worker.backtrace, lr);
                    }
                    _ => {
                        log::warn!("Failed to get link register");
                        save_unique = false;
                    }
                }
            }
            #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
            {
                save_unique = false;
            }
        }

        if worker.has_crash_file() {
            log::debug!("Multiple crashes detected from worker against attached tids group");
            // same bug hit from another task of the target; don't re-save
            if old_backtrace == worker.backtrace {
                return;
            }
        }

        self.stats.inc_crashes();

        let ctx = CrashContext {
            pid: pid.as_raw(),
            signo: si.si_signo,
            si_code: si.si_code,
            fault_addr,
            from_user,
            pc,
            status_reg,
            instr,
            frames,
            backtrace: worker.backtrace,
        };

        // Whitelist overrides both the stackhash and symbol blacklists
        let mut whitelisted = false;
        if let Some(symbol) = cfg.whitelisted_symbol(&ctx.frames) {
            save_unique = false;
            whitelisted = true;
            log::info!(
                "Whitelisted symbol '{}' found, skipping blacklist checks",
                symbol
            );
        }

        if !whitelisted {
            if cfg.hash_blacklisted(ctx.backtrace) {
                log::info!("Blacklisted stack hash '{:x}', skipping", ctx.backtrace);
                self.stats.inc_blacklisted_crashes();
                return;
            }
            if let Some(symbol) = cfg.blacklisted_symbol(&ctx.frames) {
                log::info!("Blacklisted symbol '{}' found, skipping", symbol);
                self.stats.inc_blacklisted_crashes();
                return;
            }
        }

        self.stats.mask_dyn_file_iter();

        worker.crash_file_name = report::signal_crash_filename(cfg, worker, &ctx, save_unique);

        match files::copy_file(Path::new(&worker.file_name), &worker.crash_file_name) {
            Ok(CopyOutcome::Created) => {
                log::info!(
                    "Ok, that's interesting, saved '{}' as '{}'",
                    worker.file_name,
                    worker.crash_file_name.display()
                );
                self.stats.inc_unique_crashes();
                self.stats.reset_dyn_file_iter();
            }
            Ok(CopyOutcome::AlreadyExists) => {
                log::info!(
                    "It seems that '{}' already exists, skipping",
                    worker.crash_file_name.display()
                );
                // empty filename tells the verifier this was a duplicate
                worker.clear_crash_file();
                return;
            }
            Err(e) => {
                log::error!(
                    "Couldn't copy '{}' to '{}': {}",
                    worker.file_name,
                    worker.crash_file_name.display(),
                    e
                );
                // clear so that peer tasks can retry
                worker.clear_crash_file();
                return;
            }
        }

        report::write_signal_report(worker, &ctx);

        if cfg.save_maps {
            let maps_file = worker.crash_file_name.with_extension("maps");
            if !files::proc_maps_to_file(pid.as_raw(), &maps_file) {
                log::error!("Failed to write maps file (pid={})", pid);
            }
        }
    }

    /// Analyze-only path for verifier workers: recover the hash without
    /// masking, saving, or counter writes.
    fn analyze_crash(&self, pid: Pid, worker: &mut WorkerScratch) {
        let ps = match read_pc_status(pid) {
            Some(ps) => ps,
            None => {
                log::warn!("Couldn't read the PC of pid {}", pid);
                return;
            }
        };

        let mut frames = collect_backtrace(pid, self.unwinder.as_ref(), self.resolver.as_ref());
        if frames.is_empty() {
            if ps.pc != 0 {
                frames.push(Frame::from_pc(ps.pc));
            } else {
                // callers handle the zero-hash case
                return;
            }
        }

        worker.backtrace = hash_callstack(&frames, self.cfg.num_major_frames, false);

        #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
        if frames.len() == 1 {
            use crate::debugger::regs::read_link_register;
            use crate::hashing::mix_link_register;
            match read_link_register(pid) {
                Some(lr) => worker.backtrace = mix_link_register(worker.backtrace, lr),
                None => log::warn!("Failed to get link register"),
            }
        }
    }

    /// Save path for crashes detected through a sanitizer-reserved exit
    /// code rather than a signal. The filename format stays identical for
    /// post-campaign tooling.
    fn save_sanitizer_exit(
        &self,
        pid: Pid,
        worker: &mut WorkerScratch,
        exit_code: i32,
        kind: SanitizerKind,
    ) {
        let cfg = &self.cfg;

        // save only the first hit for each worker
        if worker.has_crash_file() {
            return;
        }

        self.stats.inc_crashes();
        self.stats.mask_dyn_file_iter();

        let mut pc = 0u64;
        let mut fault_addr = 0u64;
        let mut op = AccessOp::Unknown;
        let mut frames: Vec<Frame> = Vec::new();

        if kind == SanitizerKind::Asan {
            // The report is written once, by the task that tripped the
            // sanitizer; when it isn't there yet, leave crash_file_name
            // empty so a sibling task of the same process retries.
            let parsed = match consume_report(&cfg.work_dir, pid.as_raw()) {
                Some(parsed) => parsed,
                None => return,
            };
            frames = parsed.frames;
            fault_addr = parsed.fault_addr;
            op = parsed.op;

            worker.backtrace = hash_callstack(&frames, cfg.num_major_frames, false);
            pc = frames.first().map_or(0, |fr| fr.pc);
        }

        let ctx = CrashContext {
            pid: pid.as_raw(),
            signo: 0,
            si_code: 0,
            fault_addr,
            from_user: false,
            pc,
            status_reg: 0,
            instr: "[UNKNOWN]".to_string(),
            frames,
            backtrace: worker.backtrace,
        };

        worker.crash_file_name = report::sanitizer_crash_filename(cfg, worker, kind, op, &ctx);

        match files::copy_file(Path::new(&worker.file_name), &worker.crash_file_name) {
            Ok(CopyOutcome::Created) => {
                log::info!(
                    "Ok, that's interesting, saved '{}' as '{}'",
                    worker.file_name,
                    worker.crash_file_name.display()
                );
                self.stats.inc_unique_crashes();
                self.stats.reset_dyn_file_iter();
            }
            Ok(CopyOutcome::AlreadyExists) => {
                log::info!(
                    "It seems that '{}' already exists, skipping",
                    worker.crash_file_name.display()
                );
                // cleared hash tells the verifier this was a duplicate
                worker.backtrace = 0;
                return;
            }
            Err(e) => {
                log::error!(
                    "Couldn't copy '{}' to '{}': {}",
                    worker.file_name,
                    worker.crash_file_name.display(),
                    e
                );
                // clear so that other monitored tasks can retry
                worker.clear_crash_file();
                return;
            }
        }

        report::write_sanitizer_report(worker, &ctx, exit_code, kind, op);

        if cfg.save_maps {
            let maps_file = worker.crash_file_name.with_extension("maps");
            if !files::proc_maps_to_file(pid.as_raw(), &maps_file) {
                log::error!("Failed to write maps file (pid={})", pid);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::disasm::NullDisassembler;
    use crate::report::sanitizer::{ASAN_EXIT_CODE, LOG_PREFIX, MSAN_EXIT_CODE};
    use crate::unwind::{NullResolver, NullUnwinder};
    use std::fs;
    use std::path::PathBuf;

    // A pid we never expect to exist; every ptrace op on it fails soft
    const DEAD_PID: i32 = 0x3fff_fffe;

    fn stopped_with(sig: i32) -> i32 {
        0x7f | (sig << 8)
    }

    fn exited_with(code: i32) -> i32 {
        (code & 0xff) << 8
    }

    struct CannedUnwinder(Vec<Frame>);

    impl Unwinder for CannedUnwinder {
        fn unwind(&self, _pid: Pid) -> Vec<Frame> {
            self.0.clone()
        }
    }

    struct SymbolTag(&'static str);

    impl SymbolResolver for SymbolTag {
        fn resolve(&self, _pid: Pid, frames: &mut [Frame]) {
            for fr in frames {
                let tag = self.0;
                fr.set_symbol(tag);
            }
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        stats: Arc<GlobalStats>,
        analyzer: CrashAnalyzer,
    }

    fn fixture_with(
        mut cfg: Config,
        unwinder: Box<dyn Unwinder + Send + Sync>,
        resolver: Box<dyn SymbolResolver + Send + Sync>,
    ) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().unwrap();
        cfg.work_dir = dir.path().to_path_buf();
        let stats = Arc::new(GlobalStats::new());
        let analyzer = CrashAnalyzer::new(
            Arc::new(cfg),
            Arc::clone(&stats),
            unwinder,
            resolver,
            Box::new(NullDisassembler),
        );
        Fixture {
            dir,
            stats,
            analyzer,
        }
    }

    fn worker_with_input(dir: &Path) -> WorkerScratch {
        let input = dir.join("input-000001");
        fs::write(&input, b"crashing testcase").unwrap();
        let mut worker = WorkerScratch::new(true);
        worker.file_name = input.to_string_lossy().to_string();
        worker.orig_file_name = "seed-000001".to_string();
        worker
    }

    fn crash_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(prefix))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_classify_status_words() {
        assert_eq!(
            classify(stopped_with(libc::SIGSEGV)),
            StatusClass::StoppedSignal { sig: libc::SIGSEGV }
        );
        assert_eq!(
            classify(stopped_with(libc::SIGTRAP) | (libc::PTRACE_EVENT_EXIT << 16)),
            StatusClass::StoppedEvent {
                sig: libc::SIGTRAP,
                event: libc::PTRACE_EVENT_EXIT
            }
        );
        assert_eq!(classify(exited_with(0)), StatusClass::Exited { code: 0 });
        assert_eq!(
            classify(exited_with(ASAN_EXIT_CODE)),
            StatusClass::Exited {
                code: ASAN_EXIT_CODE
            }
        );
        assert_eq!(classify(0xffff), StatusClass::Continued);
        assert_eq!(
            classify(libc::SIGKILL),
            StatusClass::Signaled { sig: libc::SIGKILL }
        );
    }

    #[test]
    fn test_signal_crash_saved_without_backtrace() {
        // zero frames and zero PC: uniqueness is off, the crash is still
        // kept under a timestamped name with hash 0 in the report
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            stopped_with(libc::SIGSEGV),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.unique_crashes(), 1);
        assert_eq!(fx.stats.blacklisted_crashes(), 0);
        assert!(worker.has_crash_file());

        let name = worker
            .crash_file_name
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(name.contains("STACK.0."));
        assert!(name.contains(&format!(".{}.fuzz", DEAD_PID)));

        let report = fs::read_to_string(worker.crash_file_name.with_extension("report")).unwrap();
        assert!(report.contains("STACK HASH: 0000000000000000"));
    }

    #[test]
    fn test_blacklisted_hash_dropped() {
        let frames = vec![
            Frame::from_pc(0x4011a0),
            Frame::from_pc(0x4007f0),
            Frame::from_pc(0x400620),
        ];
        let hash = hash_callstack(&frames, 7, true);

        let cfg = Config {
            hash_blacklist: vec![hash],
            ..Config::default()
        };
        let fx = fixture_with(cfg, Box::new(CannedUnwinder(frames)), Box::new(NullResolver));
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            stopped_with(libc::SIGSEGV),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.blacklisted_crashes(), 1);
        assert_eq!(fx.stats.unique_crashes(), 0);
        assert!(!worker.has_crash_file());
        assert!(crash_files(fx.dir.path(), "UNKNOWN.").is_empty());
    }

    #[test]
    fn test_blacklisted_symbol_dropped() {
        let frames = vec![Frame::from_pc(0x1000), Frame::from_pc(0x2000)];
        let cfg = Config {
            symbols_blacklist: vec!["g_assert".to_string()],
            ..Config::default()
        };
        let fx = fixture_with(
            cfg,
            Box::new(CannedUnwinder(frames)),
            Box::new(SymbolTag("g_assertion_message")),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            stopped_with(libc::SIGABRT),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.blacklisted_crashes(), 1);
        assert!(!worker.has_crash_file());
    }

    #[test]
    fn test_whitelisted_symbol_skips_blacklists() {
        let frames = vec![Frame::from_pc(0x4011a0), Frame::from_pc(0x400620)];
        let hash = hash_callstack(&frames, 7, true);

        // hash is blacklisted, but the whitelist wins and forces a
        // timestamped (non-unique) save
        let cfg = Config {
            hash_blacklist: vec![hash],
            symbols_whitelist: vec!["png_read".to_string()],
            ..Config::default()
        };
        let fx = fixture_with(
            cfg,
            Box::new(CannedUnwinder(frames)),
            Box::new(SymbolTag("png_read_row")),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            stopped_with(libc::SIGSEGV),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.blacklisted_crashes(), 0);
        assert_eq!(fx.stats.unique_crashes(), 1);
        assert!(worker.has_crash_file());
        let name = worker
            .crash_file_name
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        // timestamped name regardless of the hash
        assert!(name.contains(&format!(".{}.fuzz", DEAD_PID)));
    }

    #[test]
    fn test_same_hash_from_sibling_task_dropped_silently() {
        let frames = vec![Frame::from_pc(0x4011a0), Frame::from_pc(0x400620)];
        let hash = hash_callstack(&frames, 7, true);

        let fx = fixture_with(
            Config::default(),
            Box::new(CannedUnwinder(frames)),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());
        worker.crash_file_name = fx.dir.path().join("already-saved.fuzz");
        worker.backtrace = hash;

        fx.analyzer.analyze(
            stopped_with(libc::SIGSEGV),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        // silent drop: no counters, crash file untouched
        assert_eq!(fx.stats.crashes(), 0);
        assert_eq!(fx.stats.unique_crashes(), 0);
        assert_eq!(
            worker.crash_file_name,
            fx.dir.path().join("already-saved.fuzz")
        );
    }

    #[test]
    fn test_unimportant_signal_ignored() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            stopped_with(libc::SIGTRAP),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 0);
        assert!(!worker.has_crash_file());
    }

    #[test]
    fn test_verifier_worker_analyzes_only() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());
        worker.main_worker = false;

        fx.analyzer.analyze(
            stopped_with(libc::SIGSEGV),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        // registers are unreadable for a dead pid, so analysis bails out
        // before touching anything
        assert_eq!(fx.stats.crashes(), 0);
        assert!(!worker.has_crash_file());
        assert_eq!(worker.backtrace, 0);
    }

    fn write_san_report(dir: &Path, pid: i32) {
        let body = format!(
            "=={}==ERROR: AddressSanitizer: heap-buffer-overflow on address 0x602000000014 at pc 0x4011a0\n\
             READ of size 4 at 0x602000000014 thread T0\n\
             \x20   #0 0x4011a0  (/usr/lib/libfoo.so+0x1234)\n\
             \x20   #1 0x4007f0  (/tmp/target+0x7f0)\n\
             \n",
            pid
        );
        fs::write(dir.join(format!("{}.{}", LOG_PREFIX, pid)), body).unwrap();
    }

    #[test]
    fn test_sanitizer_exit_saves_crash() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());
        write_san_report(fx.dir.path(), DEAD_PID);

        fx.analyzer.analyze(
            exited_with(ASAN_EXIT_CODE),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.unique_crashes(), 1);
        assert!(worker.has_crash_file());
        assert_ne!(worker.backtrace, 0);

        let name = worker
            .crash_file_name
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(name.starts_with("ASAN.PC.0x00000000004011a0.STACK."));
        assert!(name.contains("CODE.READ"));
        assert!(name.contains("ADDR.0x602000000014"));
        assert!(name.ends_with(".fuzz"));

        // the log file was consumed
        assert!(!fx
            .dir
            .path()
            .join(format!("{}.{}", LOG_PREFIX, DEAD_PID))
            .exists());

        let report = fs::read_to_string(worker.crash_file_name.with_extension("report")).unwrap();
        assert!(report.contains(&format!("EXIT CODE: {} (ASAN)", ASAN_EXIT_CODE)));
        assert!(report.contains("OPERATION: READ"));
        assert!(report.contains(" <0x00000000004011a0> [/usr/lib/libfoo.so + 0x1234]"));
    }

    #[test]
    fn test_sanitizer_exit_without_report_retries_later() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            exited_with(ASAN_EXIT_CODE),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        // the filename stays empty so the next task of this process can
        // find the report once the crashing sibling has written it
        assert!(!worker.has_crash_file());
        assert_eq!(fx.stats.unique_crashes(), 0);

        write_san_report(fx.dir.path(), DEAD_PID);
        fx.analyzer.analyze(
            exited_with(ASAN_EXIT_CODE),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );
        assert!(worker.has_crash_file());
        assert_eq!(fx.stats.unique_crashes(), 1);
    }

    #[test]
    fn test_sanitizer_exit_duplicate_clears_hash() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );

        let mut first = worker_with_input(fx.dir.path());
        write_san_report(fx.dir.path(), DEAD_PID);
        fx.analyzer
            .analyze(exited_with(ASAN_EXIT_CODE), Pid::from_raw(DEAD_PID), &mut first);
        assert_eq!(fx.stats.unique_crashes(), 1);

        // an identical crash from another worker collides on the filename
        let mut second = worker_with_input(fx.dir.path());
        write_san_report(fx.dir.path(), DEAD_PID);
        fx.analyzer.analyze(
            exited_with(ASAN_EXIT_CODE),
            Pid::from_raw(DEAD_PID),
            &mut second,
        );

        assert_eq!(fx.stats.crashes(), 2);
        assert_eq!(fx.stats.unique_crashes(), 1);
        assert_eq!(second.backtrace, 0);
        // the filename stays, marking the duplicate for the verifier
        assert!(second.has_crash_file());
    }

    #[test]
    fn test_msan_exit_uses_stale_hash_fallback() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer.analyze(
            exited_with(MSAN_EXIT_CODE),
            Pid::from_raw(DEAD_PID),
            &mut worker,
        );

        // no report to parse: zero hash means the timestamped fallback
        assert_eq!(fx.stats.crashes(), 1);
        assert_eq!(fx.stats.unique_crashes(), 1);
        let name = worker
            .crash_file_name
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert!(name.starts_with("MSAN."));
        assert!(name.contains("CODE.UNKNOWN"));
        assert!(name.contains(&format!(".{}.fuzz", DEAD_PID)));
    }

    #[test]
    fn test_normal_exit_ignored() {
        let fx = fixture_with(
            Config::default(),
            Box::new(NullUnwinder),
            Box::new(NullResolver),
        );
        let mut worker = worker_with_input(fx.dir.path());

        fx.analyzer
            .analyze(exited_with(0), Pid::from_raw(DEAD_PID), &mut worker);
        fx.analyzer
            .analyze(exited_with(1), Pid::from_raw(DEAD_PID), &mut worker);
        fx.analyzer
            .analyze(libc::SIGKILL, Pid::from_raw(DEAD_PID), &mut worker);

        assert_eq!(fx.stats.crashes(), 0);
        assert!(!worker.has_crash_file());
    }
}

// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

/// Sanitizer-coverage feedback counters kept per worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct SanCovCounters {
    pub crashes: u64,
}

/// Per-iteration scratch owned by exactly one fuzzing worker thread.
///
/// A worker supervises one target process and all of its tasks; nothing in
/// here is shared. `crash_file_name` being empty means no crash has been
/// persisted for the current target iteration yet; several paths rely on
/// that to coordinate between tasks of the same process.
#[derive(Debug)]
pub struct WorkerScratch {
    /// Input file currently being fuzzed.
    pub file_name: String,
    /// Name of the un-mutated original input.
    pub orig_file_name: String,
    /// Destination of the persisted crash; empty until one is saved.
    pub crash_file_name: PathBuf,
    /// Callstack hash of the last analyzed crash.
    pub backtrace: u64,
    /// True for the authoritative analyzer; verifier re-runs must not mask
    /// single-frame hashes or touch global counters beyond analysis.
    pub main_worker: bool,
    pub san_cov: SanCovCounters,
}

impl WorkerScratch {
    pub fn new(main_worker: bool) -> WorkerScratch {
        WorkerScratch {
            file_name: String::new(),
            orig_file_name: String::new(),
            crash_file_name: PathBuf::new(),
            backtrace: 0,
            main_worker,
            san_cov: SanCovCounters::default(),
        }
    }

    pub fn has_crash_file(&self) -> bool {
        !self.crash_file_name.as_os_str().is_empty()
    }

    pub fn clear_crash_file(&mut self) {
        self.crash_file_name = PathBuf::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_crash_file_flag() {
        let mut worker = WorkerScratch::new(true);
        assert!(!worker.has_crash_file());
        worker.crash_file_name = PathBuf::from("/tmp/x.fuzz");
        assert!(worker.has_crash_file());
        worker.clear_crash_file();
        assert!(!worker.has_crash_file());
    }
}

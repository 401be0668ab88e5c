// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Runtime-immutable configuration and crash admission policies.
//!
//! The surrounding harness parses whatever user interface it has into this
//! struct once, before any worker starts. After that it is only ever read,
//! so workers share it behind an `Arc` with no further coordination.
use std::path::PathBuf;

use crate::frames::Frame;

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace directory crash artifacts and reports are written into.
    pub work_dir: PathBuf,
    /// Extension appended to crash input copies.
    pub file_extn: String,
    /// How many innermost frames participate in the callstack fingerprint.
    pub num_major_frames: usize,
    /// Encode the fingerprint in the filename and drop colliding saves.
    pub save_unique: bool,
    /// Snapshot `/proc/<pid>/maps` next to each saved crash.
    pub save_maps: bool,
    /// When true, PC and fault address are zeroed before filename
    /// formatting so ASLR-permuted duplicates merge.
    pub disable_randomization: bool,
    /// Mutation rate of the surrounding harness; 0.0 means dry run.
    pub flip_rate: f64,
    /// Whether a verifier re-run pass is active.
    pub use_verifier: bool,
    /// Whether sanitizer-coverage feedback counters are maintained.
    pub use_san_cov: bool,
    /// Symbols that force a crash to be kept, overriding all blacklists.
    pub symbols_whitelist: Vec<String>,
    /// Symbols that drop a crash.
    pub symbols_blacklist: Vec<String>,
    /// Sorted fingerprints to drop.
    pub hash_blacklist: Vec<u64>,
    /// Fault addresses below this are treated as uninteresting early NULL
    /// derefs and suppressed.
    pub ignore_addr: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_dir: PathBuf::from("."),
            file_extn: "fuzz".to_string(),
            num_major_frames: 7,
            save_unique: true,
            save_maps: false,
            disable_randomization: false,
            flip_rate: 0.001,
            use_verifier: false,
            use_san_cov: false,
            symbols_whitelist: Vec::new(),
            symbols_blacklist: Vec::new(),
            hash_blacklist: Vec::new(),
            ignore_addr: 0,
        }
    }
}

impl Config {
    /// Dry run: no mutation happens, crashes are replays of existing inputs.
    pub fn is_dry_run(&self) -> bool {
        self.flip_rate == 0.0
    }

    pub fn hash_blacklisted(&self, hash: u64) -> bool {
        self.hash_blacklist.binary_search(&hash).is_ok()
    }

    /// First whitelist entry appearing in any frame's symbol text.
    pub fn whitelisted_symbol(&self, frames: &[Frame]) -> Option<&str> {
        find_symbol(&self.symbols_whitelist, frames)
    }

    /// First blacklist entry appearing in any frame's symbol text.
    pub fn blacklisted_symbol(&self, frames: &[Frame]) -> Option<&str> {
        find_symbol(&self.symbols_blacklist, frames)
    }
}

fn find_symbol<'a>(list: &'a [String], frames: &[Frame]) -> Option<&'a str> {
    list.iter()
        .find(|entry| {
            frames
                .iter()
                .any(|fr| !fr.symbol.is_empty() && fr.symbol.contains(entry.as_str()))
        })
        .map(String::as_str)
}

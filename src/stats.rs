// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Process-wide crash counters shared by all workers.
//!
//! Counters are only ever touched through atomic read-modify-write; workers
//! never take a lock around them.
use std::sync::atomic::{AtomicU64, Ordering};

/// Keeps the two most significant bits of the dynamic-file iteration
/// countdown cleared while the low bits continue counting down.
pub const DYN_ITER_SUB_MASK: u64 = 0x3fff_ffff_ffff_ffff;

#[derive(Debug, Default)]
pub struct GlobalStats {
    crashes: AtomicU64,
    unique_crashes: AtomicU64,
    blacklisted_crashes: AtomicU64,
    dyn_file_iter: AtomicU64,
}

impl GlobalStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_crashes(&self) {
        self.crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn crashes(&self) -> u64 {
        self.crashes.load(Ordering::Relaxed)
    }

    pub fn inc_unique_crashes(&self) {
        self.unique_crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unique_crashes(&self) -> u64 {
        self.unique_crashes.load(Ordering::Relaxed)
    }

    pub fn inc_blacklisted_crashes(&self) {
        self.blacklisted_crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blacklisted_crashes(&self) -> u64 {
        self.blacklisted_crashes.load(Ordering::Relaxed)
    }

    pub fn set_dyn_file_iter(&self, value: u64) {
        self.dyn_file_iter.store(value, Ordering::Relaxed);
    }

    pub fn dyn_file_iter(&self) -> u64 {
        self.dyn_file_iter.load(Ordering::Relaxed)
    }

    /// Admitted crash: clear the countdown's two most significant bits.
    pub fn mask_dyn_file_iter(&self) {
        self.dyn_file_iter.fetch_and(DYN_ITER_SUB_MASK, Ordering::Relaxed);
    }

    /// Unique crash saved: restart the countdown entirely.
    pub fn reset_dyn_file_iter(&self) {
        self.dyn_file_iter.fetch_and(0, Ordering::Relaxed);
    }
}

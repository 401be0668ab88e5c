// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Workspace file primitives.
//!
//! Workers racing on identical fingerprints must never overwrite each
//! other, so the crash copy uses exclusive create and reports an existing
//! destination as a distinct outcome.
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Created,
    AlreadyExists,
}

/// Bytewise copy of `src` to `dst`, failing soft when `dst` already exists.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<CopyOutcome> {
    let data = fs::read(src)?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
    {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(CopyOutcome::AlreadyExists),
        Err(e) => return Err(e),
    };

    file.write_all(&data)?;
    Ok(CopyOutcome::Created)
}

/// Snapshot `/proc/<pid>/maps` into `dst`. Must run while the task is still
/// stopped, before the address space is torn down.
pub fn proc_maps_to_file(pid: i32, dst: &Path) -> bool {
    let maps = match fs::read(format!("/proc/{}/maps", pid)) {
        Ok(m) => m,
        Err(e) => {
            log::error!("Couldn't read maps of pid {}: {}", pid, e);
            return false;
        }
    };

    if let Err(e) = fs::write(dst, maps) {
        log::error!("Couldn't write maps snapshot '{}': {}", dst.display(), e);
        return false;
    }
    true
}

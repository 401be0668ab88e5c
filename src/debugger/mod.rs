// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Kernel debugging layer: task seizure, register and memory access.
//!
//! Everything in here fails soft. A task can die between any two
//! operations, so errors are logged and surfaced as `None`/`false`/partial
//! results rather than propagated past the event dispatcher.
use thiserror::Error;

pub mod memory;
pub mod ptrace;
pub mod regs;

#[derive(Debug, Error)]
pub enum DebugError {
    #[error("couldn't list tasks of pid {pid}: {source}")]
    TaskList {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
    #[error("pid {pid} has no tasks left")]
    NoTasks { pid: i32 },
}

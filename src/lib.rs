// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
/*!
  sigtriage is the crash triage and deduplication core of a coverage-guided
  fuzzing harness for Linux.

  When a fuzzed child stops with a fatal signal or exits with a
  sanitizer-reserved status, the core attaches to the child and all of its
  tasks with ptrace, reconstructs enough crash context to identify the bug
  (program counter, instruction text, stack trace, fault address), reduces
  the backtrace to a stable 64-bit fingerprint, decides whether the crash
  is novel, black/white-listed, or a duplicate, and persists the input
  together with a human-readable report under a filename that itself
  encodes the fingerprint.

  ## Flow per crash

  1. The worker supervising the target collects a `(status, pid)` tuple
     and hands it to [dispatch::CrashAnalyzer::analyze].
  1. Stops with an important signal run the save path: registers are read
     ([debugger::regs]), the instruction at PC is fetched and sanitized
     ([disasm]), the stack is unwound and symbolized ([unwind]), and the
     frame sequence is reduced to a fingerprint ([hashing]).
  1. Children that exited with a sanitizer-reserved code take the
     alternate path: the textual sanitizer report is parsed into the same
     frame model ([report::sanitizer]).
  1. The admission filter applies the symbol whitelist, the stackhash
     blacklist, and the symbol blacklist, in that order ([config],
     [stats]).
  1. Admitted crashes are copied into the workspace with exclusive create
     semantics and a `.report` sibling is emitted ([report], [files]).

  The mutation engine, scheduler, unwinder, disassembler, and symbol
  resolver are external collaborators; the last three sit behind trait
  seams so targets without them degrade to `[UNKNOWN]` instruction text
  and PC-only frames instead of failing.

  Workers share only the immutable [config::Config] and the atomic
  [stats::GlobalStats]; everything else is per-worker scratch
  ([worker::WorkerScratch]), so no locks are held around any blocking
  operation.
*/

#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod debugger;
pub mod disasm;
pub mod dispatch;
pub mod files;
pub mod frames;
pub mod hashing;
pub mod platform;
pub mod report;
pub mod stats;
pub mod unwind;
pub mod util;
pub mod worker;

pub use config::Config;
pub use debugger::ptrace::{attach, detach, list_threads, wait_for_stop};
pub use dispatch::CrashAnalyzer;
pub use stats::GlobalStats;
pub use worker::WorkerScratch;

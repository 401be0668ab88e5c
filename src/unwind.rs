// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Stack collection seams.
//!
//! The unwinder and symbol resolver are external collaborators. Both
//! operate on stopped tasks; the resolver fills symbol/offset fields in
//! place and is a no-op where symbol data is unavailable.
use nix::unistd::Pid;

use crate::frames::{Frame, MAX_FRAMES};

pub trait Unwinder {
    /// Ordered frame sequence, innermost first. Empty when the unwinder
    /// cannot make progress.
    fn unwind(&self, pid: Pid) -> Vec<Frame>;
}

pub trait SymbolResolver {
    fn resolve(&self, pid: Pid, frames: &mut [Frame]);
}

/// Unwinder for targets without one.
pub struct NullUnwinder;

impl Unwinder for NullUnwinder {
    fn unwind(&self, _pid: Pid) -> Vec<Frame> {
        Vec::new()
    }
}

/// Resolver that leaves symbols empty.
pub struct NullResolver;

impl SymbolResolver for NullResolver {
    fn resolve(&self, _pid: Pid, _frames: &mut [Frame]) {}
}

/// Unwind and symbolize a stopped task, bounded to [MAX_FRAMES].
///
/// A zero-frame result here does not yet mean the crash is fingerprint-less;
/// callers synthesize a frame from the register PC when they have one.
pub fn collect_backtrace(
    pid: Pid,
    unwinder: &dyn Unwinder,
    resolver: &dyn SymbolResolver,
) -> Vec<Frame> {
    let mut frames = unwinder.unwind(pid);
    frames.truncate(MAX_FRAMES);
    resolver.resolve(pid, &mut frames);
    frames
}

#[cfg(test)]
mod test {
    use super::*;

    struct CannedUnwinder(Vec<Frame>);

    impl Unwinder for CannedUnwinder {
        fn unwind(&self, _pid: Pid) -> Vec<Frame> {
            self.0.clone()
        }
    }

    struct MarkingResolver;

    impl SymbolResolver for MarkingResolver {
        fn resolve(&self, _pid: Pid, frames: &mut [Frame]) {
            for fr in frames {
                fr.set_symbol("resolved");
            }
        }
    }

    #[test]
    fn test_backtrace_bounded_and_resolved() {
        let canned: Vec<Frame> = (0..MAX_FRAMES as u64 + 20)
            .map(|i| Frame::from_pc(0x1000 + i))
            .collect();
        let unwinder = CannedUnwinder(canned);

        let pid = Pid::this();
        let frames = collect_backtrace(pid, &unwinder, &MarkingResolver);
        assert_eq!(frames.len(), MAX_FRAMES);
        assert!(frames.iter().all(|f| f.symbol == "resolved"));
        assert_eq!(frames[0].pc, 0x1000);
    }

    #[test]
    fn test_null_seams() {
        let frames = collect_backtrace(Pid::this(), &NullUnwinder, &NullResolver);
        assert!(frames.is_empty());
    }
}

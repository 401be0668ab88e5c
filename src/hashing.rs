// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Callstack fingerprinting.
//!
//! A crash is identified by a 64-bit digest over the rendered PCs of its
//! innermost frames. Only the final three hex characters of each PC
//! participate, which keeps the fingerprint stable across module-internal
//! code motion while still separating distinct call sites. Bit 63 is
//! reserved: the mixer never sets it, and it is ORed in only to mark
//! single-frame backtraces whose hashes are too weak for uniqueness
//! decisions on their own.
use crate::frames::Frame;
use crate::util::reg_literal;

/// Reserved marker for single-frame backtraces.
pub const SINGLE_FRAME_MASK: u64 = 1 << 63;

/// Jenkins one-at-a-time. Table-free and order-sensitive; every worker must
/// agree on this function for fingerprints to be comparable.
pub fn mix64(bytes: &[u8]) -> u64 {
    let mut hash = 0u64;
    for &b in bytes {
        hash = hash.wrapping_add(u64::from(b));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash
}

fn last_nibbles(pc: u64) -> u64 {
    let lit = reg_literal(pc);
    mix64(lit[lit.len() - 3..].as_bytes())
}

/// Reduce a frame sequence to its fingerprint.
///
/// XORs the per-frame digests of up to `num_major` innermost frames, then
/// clears the reserved bit. With `enable_masking`, a backtrace of exactly
/// one frame gets the reserved bit set so downstream tooling can re-group
/// such weak hashes without conflating them with genuine ones. Verifier
/// workers pass `enable_masking = false`.
pub fn hash_callstack(frames: &[Frame], num_major: usize, enable_masking: bool) -> u64 {
    let mut hash = 0u64;
    for fr in frames.iter().take(num_major) {
        hash ^= last_nibbles(fr.pc);
    }
    hash &= !SINGLE_FRAME_MASK;

    if enable_masking && frames.len() == 1 {
        hash |= SINGLE_FRAME_MASK;
    }
    hash
}

/// Fold the link register into a single-frame hash to recover extra
/// discrimination on ARM targets. The mask bit is preserved as-is.
pub fn mix_link_register(hash: u64, lr: u64) -> u64 {
    let mask = hash & SINGLE_FRAME_MASK;
    ((hash ^ last_nibbles(lr)) & !SINGLE_FRAME_MASK) | mask
}

#[cfg(test)]
mod test {
    use super::*;

    fn frames_of(pcs: &[u64]) -> Vec<Frame> {
        pcs.iter().map(|&pc| Frame::from_pc(pc)).collect()
    }

    #[test]
    fn test_xor_of_trailing_nibbles() {
        // SIGSEGV at 0x4011a0 with a three frame unwind: the fingerprint is
        // the XOR of the digests of "1a0", "7f0" and "620"
        let bt = frames_of(&[0x4011a0, 0x4007f0, 0x400620]);
        let expect = (mix64(b"1a0") ^ mix64(b"7f0") ^ mix64(b"620")) & !SINGLE_FRAME_MASK;
        assert_eq!(hash_callstack(&bt, 7, true), expect);
    }

    #[test]
    fn test_deterministic() {
        let bt = frames_of(&[0x7f1122334455, 0x401000, 0xdeadbeef]);
        let a = hash_callstack(&bt, 7, false);
        let b = hash_callstack(&bt, 7, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_only_trailing_chars_matter() {
        // Frames differing above the last three nibbles hash identically
        let a = frames_of(&[0x55554011a0, 0x7f004007f0]);
        let b = frames_of(&[0x11114011a0, 0x0100444007f0]);
        assert_eq!(hash_callstack(&a, 7, false), hash_callstack(&b, 7, false));
    }

    #[test]
    fn test_major_frame_bound() {
        let short = frames_of(&[0x1111, 0x2222]);
        let mut long = short.clone();
        long.push(Frame::from_pc(0x3333));
        // with M = 2 the third frame is ignored
        assert_eq!(
            hash_callstack(&short, 2, false),
            hash_callstack(&long, 2, false)
        );
        // with M = 3 it changes the hash
        assert_ne!(
            hash_callstack(&short, 3, false),
            hash_callstack(&long, 3, false)
        );
    }

    #[test]
    fn test_single_frame_mask() {
        let one = frames_of(&[0x4011a0]);
        let masked = hash_callstack(&one, 7, true);
        let unmasked = hash_callstack(&one, 7, false);
        assert_ne!(masked & SINGLE_FRAME_MASK, 0);
        assert_eq!(unmasked & SINGLE_FRAME_MASK, 0);
        assert_eq!(masked & !SINGLE_FRAME_MASK, unmasked);

        // two frames never get the mask
        let two = frames_of(&[0x4011a0, 0x400620]);
        assert_eq!(hash_callstack(&two, 7, true) & SINGLE_FRAME_MASK, 0);
    }

    #[test]
    fn test_mixer_never_sets_reserved_bit() {
        for pcs in [&[0xfffu64][..], &[0x123, 0x456, 0x789][..]] {
            let h = hash_callstack(&frames_of(pcs), 7, false);
            assert_eq!(h & SINGLE_FRAME_MASK, 0);
        }
    }

    #[test]
    fn test_link_register_mixing() {
        let one = frames_of(&[0x4011a0]);
        let masked = hash_callstack(&one, 7, true);
        let mixed = mix_link_register(masked, 0x400880);
        // mask survives, low bits move
        assert_ne!(mixed & SINGLE_FRAME_MASK, 0);
        assert_ne!(mixed, masked);
        assert_eq!(
            mixed & !SINGLE_FRAME_MASK,
            (masked ^ mix64(b"880")) & !SINGLE_FRAME_MASK
        );
    }
}

// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
use nix::sys::ptrace;
use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::unistd::Pid;
use std::io::IoSliceMut;
use std::mem;

/// Copy up to `buf.len()` bytes from a stopped task's address space.
///
/// Tries the vectored cross-process read first and falls back to
/// word-granular peeks, rounding the length down to the word size. Never
/// fails on partial reads; returns the byte count actually obtained. Zero
/// means the page is unmapped or the task died.
pub fn read_process_memory(pid: Pid, addr: u64, buf: &mut [u8]) -> usize {
    let want = buf.len();
    let remote = [RemoteIoVec {
        base: addr as usize,
        len: want,
    }];

    let vectored = {
        let mut local = [IoSliceMut::new(buf)];
        process_vm_readv(pid, &mut local, &remote)
    };
    match vectored {
        Ok(n) if n == want => return n,
        Ok(n) => log::debug!("process_vm_readv() short read ({}/{} bytes)", n, want),
        Err(e) => log::debug!("process_vm_readv() failed: {}", e),
    }

    let word = mem::size_of::<libc::c_long>();
    let mut done = 0usize;
    for chunk in buf.chunks_exact_mut(word) {
        let at = addr.wrapping_add(done as u64);
        match ptrace::read(pid, at as ptrace::AddressType) {
            Ok(value) => chunk.copy_from_slice(&value.to_ne_bytes()),
            Err(e) => {
                log::warn!("Couldn't peek pid {} at {:#x}: {}", pid, at, e);
                break;
            }
        }
        done += word;
    }
    done
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_own_memory() {
        let data = *b"triage-probe-data";
        let mut buf = [0u8; 17];
        let n = read_process_memory(Pid::this(), data.as_ptr() as u64, &mut buf);
        assert_eq!(n, data.len());
        assert_eq!(buf, data);
    }

    #[test]
    fn test_read_unmapped_page() {
        // not a tracee of ours either, so both paths fail
        let mut buf = [0u8; 16];
        assert_eq!(read_process_memory(Pid::this(), 0x10, &mut buf), 0);
    }
}

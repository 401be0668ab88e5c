// Copyright (c) 2021, Qualcomm Innovation Center, Inc. All rights reserved.
//
// SPDX-License-Identifier: BSD-3-Clause
//! Seizing and steering target processes.
//!
//! The root task is seized with options that make the kernel auto-attach
//! newly created tasks (clone/fork/vfork) and report task exits before
//! reaping, so the dispatcher has to tolerate stop events from tasks it
//! never explicitly attached.
use nix::errno::Errno;
use nix::sys::ptrace::{self, Options};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;

use super::DebugError;

/// Bound on the task snapshot taken per process.
pub const MAX_TASKS: usize = 4096;

fn seize_options() -> Options {
    Options::PTRACE_O_TRACECLONE
        | Options::PTRACE_O_TRACEFORK
        | Options::PTRACE_O_TRACEVFORK
        | Options::PTRACE_O_TRACEEXIT
}

/// Point-in-time snapshot of the task ids comprising `pid`.
///
/// Tasks may appear or vanish between this listing and any later ptrace
/// operation; callers must tolerate both.
pub fn list_threads(pid: Pid) -> Result<Vec<Pid>, DebugError> {
    let path = format!("/proc/{}/task", pid);
    let entries = fs::read_dir(&path).map_err(|source| DebugError::TaskList {
        pid: pid.as_raw(),
        source,
    })?;

    let mut tasks = Vec::new();
    for entry in entries.flatten() {
        match entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) {
            Some(tid) => {
                tasks.push(Pid::from_raw(tid));
                if tasks.len() >= MAX_TASKS {
                    break;
                }
            }
            None => log::debug!(
                "Task dir entry '{}' couldn't be parsed as a tid",
                entry.file_name().to_string_lossy()
            ),
        }
    }

    log::debug!("Total number of tasks in pid {}: {}", pid, tasks.len());
    if tasks.is_empty() {
        return Err(DebugError::NoTasks { pid: pid.as_raw() });
    }
    Ok(tasks)
}

/// Seize `pid` and every one of its current tasks.
///
/// Per-task seize failures are tolerated (the task may have exited already,
/// and partial attach keeps the process usable); a failure to seize the
/// root task or to enumerate tasks is not.
pub fn attach(pid: Pid) -> bool {
    if let Err(e) = ptrace::seize(pid, seize_options()) {
        log::warn!("Couldn't seize pid {}: {}", pid, e);
        return false;
    }
    log::debug!("Attached to pid {}", pid);

    let tasks = match list_threads(pid) {
        Ok(tasks) => tasks,
        Err(e) => {
            log::error!("{}", e);
            return false;
        }
    };

    for task in tasks {
        if task == pid {
            continue;
        }
        if let Err(e) = ptrace::seize(task, seize_options()) {
            log::warn!("Couldn't seize task {} of pid {}: {}", task, pid, e);
            continue;
        }
        log::debug!("Attached to task {} (thread group {})", task, pid);
    }
    true
}

/// Interrupt, await the stop acknowledgment, and detach every task.
///
/// Tasks are re-enumerated first since new ones may have been auto-attached
/// since the original seize.
pub fn detach(pid: Pid) {
    if kill(pid, None) == Err(Errno::ESRCH) {
        log::debug!("pid {} no longer exists", pid);
        return;
    }

    let tasks = match list_threads(pid) {
        Ok(tasks) => tasks,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    for task in tasks {
        let _ = ptrace::interrupt(task);
        wait_for_stop(task);
        let _ = ptrace::detach(task, None);
    }
}

/// Await a stop of `pid`, retrying interrupted waits. Any non-stopped
/// terminal status is a failure.
pub fn wait_for_stop(pid: Pid) -> bool {
    loop {
        let mut status: libc::c_int = 0;
        let ret =
            unsafe { libc::waitpid(pid.as_raw(), &mut status, libc::__WALL | libc::WUNTRACED) };
        if ret == -1 {
            if Errno::last() == Errno::EINTR {
                continue;
            }
            log::warn!("waitpid(pid={}) failed: {}", pid, Errno::last());
            return false;
        }
        if !libc::WIFSTOPPED(status) {
            log::warn!("pid {} not in a stopped state, status: {}", pid, status);
            return false;
        }
        return true;
    }
}

/// Restart a stopped task, forwarding `sig` (0 forwards nothing).
///
/// Failure usually means the task died mid-analysis, which is fine.
pub(crate) fn resume(pid: Pid, sig: i32) {
    let ret = unsafe {
        libc::ptrace(
            libc::PTRACE_CONT,
            pid.as_raw(),
            std::ptr::null_mut::<libc::c_void>(),
            sig as libc::c_long,
        )
    };
    if ret == -1 {
        log::debug!("Couldn't continue pid {}: {}", pid, Errno::last());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_list_own_threads() {
        let me = Pid::this();
        let tasks = list_threads(me).unwrap();
        assert!(tasks.contains(&me));
    }

    #[test]
    fn test_list_vanished_process() {
        // kernel pid limit makes this unallocatable
        assert!(list_threads(Pid::from_raw(0x7fff_fffe)).is_err());
    }

    // Needs ptrace permission over children (yama ptrace_scope <= 1).
    #[test]
    #[ignore]
    fn test_attach_detach_child() {
        let mut child = Command::new("/bin/sleep").arg("10").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        assert!(attach(pid));
        detach(pid);

        child.kill().unwrap();
        child.wait().unwrap();
    }
}

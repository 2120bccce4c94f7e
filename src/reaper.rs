use std::io;

use crate::jobs::{Job, JobTable};
use crate::pending::PENDING;
use crate::signals;
use crate::status;

/// Blocking wait for a foreground job.
///
/// Loops on `waitpid(-pgid, WUNTRACED)` applying each reported status to
/// the owning process. Returns as soon as any stage stops (the rest of the
/// group was presumably stopped by the same keyboard signal, and
/// [`drain_remaining_statuses`] picks their statuses up), or once every
/// child of the group has been reaped (`ECHILD`).
///
/// The return value is the pipeline's exit status, known once the final
/// stage has reported a termination: its exit code, or `128 + signal`.
pub fn wait_for_children(job: &mut Job) -> Option<i32> {
    let mut pipeline_status = None;

    loop {
        let mut raw: libc::c_int = 0;
        let waited = unsafe { libc::waitpid(-job.pgid, &mut raw, libc::WUNTRACED) };

        if waited > 0 {
            let is_last = waited == job.last_pid();
            if let Some(process) = job.find_process_mut(waited) {
                if is_last {
                    if let Some(code) = status::exit_code_from_wait_status(raw) {
                        pipeline_status = Some(code);
                    }
                }
                if status::is_stopped(raw) {
                    process.stopped = true;
                    return pipeline_status;
                }
                if status::is_terminated(raw) {
                    process.completed = true;
                    process.stopped = false;
                    process.raw_status = raw;
                }
            }
            continue;
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ECHILD) => return pipeline_status,
            _ => {
                eprintln!("waitpid: {err}");
                return pipeline_status;
            }
        }
    }
}

/// Non-blocking sweep after a foreground wait has returned: collect every
/// immediately-reportable status of the group, closing the window in which
/// other stages of a freshly stopped pipeline still have unread statuses.
pub fn drain_remaining_statuses(job: &mut Job) {
    loop {
        let mut raw: libc::c_int = 0;
        let waited =
            unsafe { libc::waitpid(-job.pgid, &mut raw, libc::WNOHANG | libc::WUNTRACED) };

        if waited == 0 {
            return;
        }

        if waited > 0 {
            if let Some(process) = job.find_process_mut(waited) {
                if status::is_stopped(raw) {
                    process.stopped = true;
                } else if status::is_terminated(raw) {
                    process.completed = true;
                    process.stopped = false;
                    process.raw_status = raw;
                }
            }
            continue;
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ECHILD) => return,
            _ => {
                eprintln!("waitpid: {err}");
                return;
            }
        }
    }
}

/// Apply every pending `(pid, status)` recorded by the SIGCHLD handler to
/// the job table. Pids that no longer match a live process belonged to jobs
/// already released (or to adopted orphans) and are dropped.
///
/// SIGCHLD is blocked for the duration of the drain so the record's reset
/// cannot race a concurrent enqueue.
pub fn apply_pending(table: &mut JobTable) {
    let guard = match signals::block_sigchld() {
        Ok(mask) => Some(mask),
        Err(e) => {
            eprintln!("sigprocmask(block) before drain: {e}");
            None
        }
    };

    PENDING.drain(|pid, raw| {
        if let Some(process) = table.find_process_mut(pid) {
            if process.completed {
                return;
            }
            if status::is_stopped(raw) {
                process.stopped = true;
            } else if status::is_terminated(raw) {
                process.completed = true;
                process.stopped = false;
                process.raw_status = raw;
            }
        }
    });

    if let Some(mask) = guard {
        if let Err(e) = mask.restore() {
            eprintln!("sigprocmask(restore) after drain: {e}");
        }
    }
}

use std::io;

use crate::jobs::JobTable;
use crate::reaper;
use crate::shell::Shell;
use crate::signals::SignalMask;

/// The controlling terminal's fd, when stdin is one.
fn tty_fd() -> Option<libc::c_int> {
    (unsafe { libc::isatty(libc::STDIN_FILENO) } == 1).then_some(libc::STDIN_FILENO)
}

/// Hand the controlling terminal to `pgid`. Best-effort: skipped when stdin
/// is not a tty; a failure on a real tty is reported and execution
/// continues. The shell ignores SIGTTOU, so this is safe to call from a
/// non-foreground position.
pub fn give_terminal_to(pgid: libc::pid_t) {
    let Some(fd) = tty_fd() else {
        return;
    };

    loop {
        if unsafe { libc::tcsetpgrp(fd, pgid) } == 0 {
            return;
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        eprintln!("tcsetpgrp: {err}");
        return;
    }
}

/// Deliver SIGCONT to a job's process group.
pub fn send_continue_to_group(pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    loop {
        if unsafe { libc::kill(-pgid, libc::SIGCONT) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Run an installed job in the foreground.
///
/// The launch signals are still blocked on entry. Terminal goes to the job,
/// the blocking wait runs, stragglers are drained, the terminal comes back,
/// the job is notified (released when completed, announced when stopped),
/// and only then is the prior signal mask restored. `$?` is updated when
/// the final stage reported a termination.
pub fn handle_foreground_job(shell: &mut Shell, job_num: u64, prev_mask: &SignalMask) {
    let shell_pgid = shell.shell_pgid;

    if let Some(job) = shell.job_table.get_mut(job_num) {
        give_terminal_to(job.pgid);

        let pipeline_status = reaper::wait_for_children(job);
        reaper::drain_remaining_statuses(job);

        give_terminal_to(shell_pgid);

        if let Some(code) = pipeline_status {
            shell.last_exit_status = code;
        }
        shell.job_table.notify(job_num);
    }

    if let Err(e) = prev_mask.restore() {
        eprintln!("sigprocmask(restore) in parent (fg): {e}");
    }
}

/// Release a job into the background: restore the mask and report
/// `[N]  pgid` so the user can address it later.
pub fn handle_background_job(table: &JobTable, job_num: u64, prev_mask: &SignalMask) {
    if let Err(e) = prev_mask.restore() {
        eprintln!("sigprocmask(restore) in parent (bg): {e}");
    }

    if let Some(job) = table.get(job_num) {
        eprintln!("[{}]  {}", job.job_num, job.pgid);
    }
}

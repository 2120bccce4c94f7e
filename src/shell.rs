use std::io;

use crate::env::Variables;
use crate::jobs::JobTable;
use crate::signals;

/// Everything a session carries between prompt iterations.
pub struct Shell {
    pub job_table: JobTable,
    pub variables: Variables,
    /// `$?`: the exit status of the last completed pipeline.
    pub last_exit_status: i32,
    /// Snapshotted at startup; `$$` expands to this even in forked children.
    pub shell_pid: libc::pid_t,
    /// The group the terminal is returned to after every foreground job.
    pub shell_pgid: libc::pid_t,
}

impl Shell {
    /// Install the shell's signal dispositions and snapshot the session
    /// identity. A `sigaction` failure here is fatal to startup.
    pub fn new() -> io::Result<Self> {
        signals::install_shell_handlers()?;
        Ok(Shell {
            job_table: JobTable::new(),
            variables: Variables::from_environ(),
            last_exit_status: 0,
            shell_pid: unsafe { libc::getpid() },
            shell_pgid: unsafe { libc::getpgrp() },
        })
    }
}

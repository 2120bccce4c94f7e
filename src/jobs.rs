use crate::parser::Command;

/// One stage of a pipeline.
///
/// Owned by exactly one [`Job`] for that job's whole lifetime; position in
/// the job's process list determines the pipe wiring.
pub struct Process {
    pub cmd: Command,
    /// 0 until the stage has forked.
    pub pid: libc::pid_t,
    /// Terminated, normally or by signal. Never cleared once set.
    pub completed: bool,
    /// Suspended; cleared when the job is continued.
    pub stopped: bool,
    /// The last wait status recorded for this process.
    pub raw_status: libc::c_int,
}

impl Process {
    pub fn new(cmd: Command) -> Self {
        Process {
            cmd,
            pid: 0,
            completed: false,
            stopped: false,
            raw_status: 0,
        }
    }
}

/// One user-visible pipeline under job control.
pub struct Job {
    /// Monotonic within the session, never reused.
    pub job_num: u64,
    /// Process group id: the pid of the first forked stage. 0 until then.
    pub pgid: libc::pid_t,
    pub processes: Vec<Process>,
    /// The line as entered, minus any trailing `&`. Used in listings.
    pub command: String,
    pub background: bool,
}

impl Job {
    /// Every process stopped or completed, with at least one stopped.
    pub fn is_stopped(&self) -> bool {
        self.processes.iter().all(|p| p.stopped || p.completed)
            && self.processes.iter().any(|p| p.stopped)
    }

    pub fn is_completed(&self) -> bool {
        self.processes.iter().all(|p| p.completed)
    }

    /// Forget the suspension marks ahead of a SIGCONT.
    pub fn clear_stopped(&mut self) {
        for p in &mut self.processes {
            p.stopped = false;
        }
    }

    pub fn find_process_mut(&mut self, pid: libc::pid_t) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.pid == pid)
    }

    /// Pid of the final stage; its exit status is the pipeline's.
    pub fn last_pid(&self) -> libc::pid_t {
        self.processes.last().map(|p| p.pid).unwrap_or(0)
    }

    /// One listing line on stderr: `[N]  State      text`, with ` &`
    /// appended for background jobs.
    pub fn print_status_line(&self, state: &str) {
        if self.background {
            eprintln!("[{}]  {}      {} &", self.job_num, state, self.command);
        } else {
            eprintln!("[{}]  {}      {}", self.job_num, state, self.command);
        }
    }
}

/// The ordered collection of live jobs plus the monotonic number source.
///
/// Mutated only on the shell main path; the signal handler records into the
/// pending queue instead and never touches this table.
pub struct JobTable {
    jobs: Vec<Job>,
    next_job_num: u64,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_job_num: 1,
        }
    }

    /// Append a job for a parsed pipeline and return its number.
    pub fn create(&mut self, commands: Vec<Command>, raw_text: String, background: bool) -> u64 {
        let job_num = self.next_job_num;
        self.next_job_num += 1;
        self.jobs.push(Job {
            job_num,
            pgid: 0,
            processes: commands.into_iter().map(Process::new).collect(),
            command: raw_text,
            background,
        });
        job_num
    }

    pub fn get(&self, job_num: u64) -> Option<&Job> {
        self.jobs.iter().find(|j| j.job_num == job_num)
    }

    pub fn get_mut(&mut self, job_num: u64) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.job_num == job_num)
    }

    /// Resolve a job specifier from a builtin's argv: no specifier names the
    /// last job in the table, `%N` names job N. Anything else is not found.
    pub fn find(&self, specifier: Option<&str>) -> Option<u64> {
        let Some(spec) = specifier else {
            return self.jobs.last().map(|j| j.job_num);
        };

        let digits = spec.strip_prefix('%')?;
        if digits.is_empty() {
            return None;
        }
        let wanted: u64 = digits.parse().ok()?;
        if wanted == 0 {
            return None;
        }
        self.get(wanted).map(|j| j.job_num)
    }

    /// Unlink a job, releasing its processes and commands.
    pub fn remove(&mut self, job_num: u64) {
        self.jobs.retain(|j| j.job_num != job_num);
    }

    /// Snapshot of the live job numbers, in table order, for walks that
    /// remove entries as they go.
    pub fn job_nums(&self) -> Vec<u64> {
        self.jobs.iter().map(|j| j.job_num).collect()
    }

    pub fn find_process_mut(&mut self, pid: libc::pid_t) -> Option<&mut Process> {
        self.jobs.iter_mut().find_map(|j| j.find_process_mut(pid))
    }

    /// Deliver SIGHUP, then SIGCONT, then SIGTERM to every remaining
    /// process group, so stopped jobs wake up to act on the termination.
    /// Shell-exit path only.
    pub fn kill_all(&self) {
        for job in &self.jobs {
            if job.pgid <= 0 {
                continue;
            }
            unsafe {
                libc::kill(-job.pgid, libc::SIGHUP);
                libc::kill(-job.pgid, libc::SIGCONT);
                libc::kill(-job.pgid, libc::SIGTERM);
            }
        }
    }

    /// Report one job's state change: a completed job prints a Done line
    /// when it was a background job and is removed either way; a stopped
    /// job prints a Stopped line and stays.
    pub fn notify(&mut self, job_num: u64) {
        let Some(job) = self.get(job_num) else {
            return;
        };
        if job.is_completed() {
            if job.background {
                job.print_status_line("Done");
            }
            self.remove(job_num);
        } else if job.is_stopped() {
            job.print_status_line("Stopped");
        }
    }

    /// Apply the notification policy to the whole table.
    pub fn notify_all(&mut self) {
        for job_num in self.job_nums() {
            self.notify(job_num);
        }
    }
}

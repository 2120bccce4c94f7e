use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::pending::PENDING;

/// Set by the SIGINT/SIGQUIT handler; the REPL clears it each iteration.
pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Set by the SIGCHLD handler when at least one child transition was
/// recorded; the REPL consumes it to decide when a notification pass is due.
pub static CHILD_CHANGED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Release);
    // Async-signal-safe: raw write(2) only.
    unsafe {
        libc::write(libc::STDOUT_FILENO, b"\n".as_ptr().cast(), 1);
    }
}

extern "C" fn on_sigchld(_sig: libc::c_int) {
    let mut status: libc::c_int = 0;
    loop {
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG | libc::WUNTRACED) };
        if pid <= 0 {
            return;
        }
        CHILD_CHANGED.store(true, Ordering::Release);
        PENDING.push(pid, status);
    }
}

fn install(signum: libc::c_int, handler: libc::sighandler_t, flags: libc::c_int) -> io::Result<()> {
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = handler;
    action.sa_flags = flags;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signum, &action, ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Install the shell-side signal dispositions. Failure here is fatal to
/// startup.
///
/// SIGINT/SIGQUIT print a newline and mark the interruption. SIGCHLD reaps
/// everything immediately reportable into the pending record. SIGTTIN,
/// SIGTTOU and SIGTSTP are ignored: the shell hands the terminal back and
/// forth with `tcsetpgrp` and must not be suspended by its own job-control
/// traffic.
pub fn install_shell_handlers() -> io::Result<()> {
    install(libc::SIGINT, on_interrupt as libc::sighandler_t, 0)?;
    install(libc::SIGQUIT, on_interrupt as libc::sighandler_t, 0)?;
    install(libc::SIGCHLD, on_sigchld as libc::sighandler_t, libc::SA_RESTART)?;
    install(libc::SIGTTIN, libc::SIG_IGN, 0)?;
    install(libc::SIGTTOU, libc::SIG_IGN, 0)?;
    install(libc::SIGTSTP, libc::SIG_IGN, 0)?;
    Ok(())
}

/// Consume the child-changed flag.
pub fn take_child_changed() -> bool {
    CHILD_CHANGED.swap(false, Ordering::AcqRel)
}

pub fn clear_interrupted() {
    INTERRUPTED.store(false, Ordering::Release);
}

/// A saved signal mask. Captured when signals are blocked ahead of a fork
/// and restored only once the pipeline is fully installed.
pub struct SignalMask(libc::sigset_t);

impl SignalMask {
    pub fn restore(&self) -> io::Result<()> {
        if unsafe { libc::sigprocmask(libc::SIG_SETMASK, &self.0, ptr::null_mut()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

fn empty_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        set
    }
}

/// Block SIGCHLD, and for foreground launches also the keyboard signals,
/// returning the prior mask. Holding these blocked from just before the
/// first fork until the job is installed (pids recorded, terminal handed
/// over) closes the race where a child exits before the parent has seen it.
pub fn block_for_launch(background: bool) -> io::Result<SignalMask> {
    let mut block = empty_set();
    unsafe {
        libc::sigaddset(&mut block, libc::SIGCHLD);
        if !background {
            libc::sigaddset(&mut block, libc::SIGINT);
            libc::sigaddset(&mut block, libc::SIGQUIT);
            libc::sigaddset(&mut block, libc::SIGTSTP);
        }
    }

    let mut prev = empty_set();
    if unsafe { libc::sigprocmask(libc::SIG_BLOCK, &block, &mut prev) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(SignalMask(prev))
}

/// Block SIGCHLD alone, for the duration of a pending-record drain.
pub fn block_sigchld() -> io::Result<SignalMask> {
    let mut block = empty_set();
    unsafe {
        libc::sigaddset(&mut block, libc::SIGCHLD);
    }

    let mut prev = empty_set();
    if unsafe { libc::sigprocmask(libc::SIG_BLOCK, &block, &mut prev) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(SignalMask(prev))
}

/// Child-side reset, immediately after fork and before exec: the signals the
/// shell overrides go back to their default dispositions.
pub fn reset_child_dispositions() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGQUIT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
    }
}

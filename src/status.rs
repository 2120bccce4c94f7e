/// Decode a raw wait status into shell-style exit code semantics.
///
/// Processes terminated by signal map to `128 + signal`. Returns `None` for
/// statuses that report neither a normal exit nor a signal death (stops).
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if libc::WIFEXITED(raw_status) {
        return Some(libc::WEXITSTATUS(raw_status));
    }

    if libc::WIFSIGNALED(raw_status) {
        return Some(128 + libc::WTERMSIG(raw_status));
    }

    None
}

/// True when the status reports a stop (requires waiting with `WUNTRACED`).
pub fn is_stopped(raw_status: libc::c_int) -> bool {
    libc::WIFSTOPPED(raw_status)
}

/// True when the status reports a termination, normal or by signal.
pub fn is_terminated(raw_status: libc::c_int) -> bool {
    libc::WIFEXITED(raw_status) || libc::WIFSIGNALED(raw_status)
}

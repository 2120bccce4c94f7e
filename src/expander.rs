use crate::env::Variables;
use crate::parser::Command;

/// Expand `$`-leading tokens in a command's argv and redirect targets.
///
/// Runs in the forked child between mask restoration and I/O setup, so the
/// redirect targets are final strings by the time they are opened. The
/// argv[0] program word is never expanded. `shell_pid` is the pid the shell
/// recorded at startup: `$$` names the shell, and `getpid()` here would name
/// the child.
pub fn expand_command(
    cmd: &Command,
    vars: &Variables,
    last_exit_status: i32,
    shell_pid: libc::pid_t,
) -> Command {
    let mut expanded = cmd.clone();

    for arg in expanded.argv.iter_mut().skip(1) {
        if arg.starts_with('$') {
            *arg = expand_token(arg, vars, last_exit_status, shell_pid);
        }
    }

    for target in [&mut expanded.infile, &mut expanded.outfile] {
        if let Some(path) = target {
            if path.starts_with('$') {
                *path = expand_token(path, vars, last_exit_status, shell_pid);
            }
        }
    }

    expanded
}

/// Expand one token that starts with `$`. `$$` and `$?` are special; any
/// other token must continue with an identifier, whose value replaces it
/// (unset names become empty). A `$` followed by nothing that can start an
/// identifier leaves the token unchanged.
fn expand_token(token: &str, vars: &Variables, last_exit_status: i32, shell_pid: libc::pid_t) -> String {
    if token == "$$" {
        return shell_pid.to_string();
    }
    if token == "$?" {
        return last_exit_status.to_string();
    }

    match expand_variable(token, vars) {
        Some(expanded) => expanded,
        None => token.to_string(),
    }
}

/// `$NAME<rest>` → value of NAME (table first, then the process
/// environment, else empty) with `<rest>` appended. `None` when the
/// character after `$` cannot start an identifier.
fn expand_variable(token: &str, vars: &Variables) -> Option<String> {
    let rest = &token[1..];
    let bytes = rest.as_bytes();

    let Some(&first) = bytes.first() else {
        return None;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }

    let mut end = 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }

    let name = &rest[..end];
    let remainder = &rest[end..];
    let value = vars
        .get(name)
        .map(str::to_string)
        .or_else(|| std::env::var(name).ok())
        .unwrap_or_default();

    Some(format!("{value}{remainder}"))
}

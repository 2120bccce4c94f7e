use std::io;

use crate::env::{self, Variables};
use crate::job_control;
use crate::parser::Command;
use crate::reaper;
use crate::shell::Shell;
use crate::signals;

/// The commands handled inside the shell process.
const BUILTINS: &[&str] = &[
    "cd", "pwd", "help", "exit", "export", "unset", "jobs", "fg", "bg",
];

/// Returns true if the name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub enum BuiltinAction {
    Continue(i32),
    /// Terminate the shell with this status.
    Exit(i32),
}

/// Dispatch a builtin. Builtin argv is taken verbatim: expansion is a
/// child-side pre-exec step, and builtins never fork.
pub fn execute(cmd: &Command, shell: &mut Shell) -> BuiltinAction {
    let name = cmd.argv[0].as_str();
    let args = &cmd.argv[1..];

    match name {
        "cd" => BuiltinAction::Continue(builtin_cd(args)),
        "pwd" => BuiltinAction::Continue(builtin_pwd()),
        "help" => BuiltinAction::Continue(builtin_help()),
        "exit" => BuiltinAction::Exit(args.first().map(|s| atoi(s)).unwrap_or(0)),
        "export" => BuiltinAction::Continue(builtin_export(args, &mut shell.variables)),
        "unset" => BuiltinAction::Continue(builtin_unset(args, &mut shell.variables)),
        "jobs" => BuiltinAction::Continue(builtin_jobs(shell)),
        "fg" => BuiltinAction::Continue(builtin_fg(args, shell)),
        "bg" => BuiltinAction::Continue(builtin_bg(args, shell)),
        _ => {
            eprintln!("{name}: unknown builtin");
            BuiltinAction::Continue(1)
        }
    }
}

/// atoi-style conversion: optional sign, leading digits, 0 for anything
/// unparseable.
fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i32>().map(|n| sign * n).unwrap_or(0)
}

fn builtin_cd(args: &[String]) -> i32 {
    let target = match args.first().map(String::as_str) {
        None | Some("~") => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("cd: HOME not set");
                return 1;
            }
        },
        Some("-") => match std::env::var("OLDPWD") {
            Ok(prev) => prev,
            Err(_) => {
                eprintln!("cd: OLDPWD not set");
                return 1;
            }
        },
        Some(dir) => dir.to_string(),
    };

    if let Ok(cwd) = std::env::current_dir() {
        // SAFETY: environment mutation happens on the main thread only; the
        // signal handlers never read the environment.
        unsafe { std::env::set_var("OLDPWD", cwd) };
    }

    if let Err(e) = std::env::set_current_dir(&target) {
        eprintln!("cd: {target}: {e}");
        return 1;
    }
    0
}

fn builtin_pwd() -> i32 {
    match std::env::current_dir() {
        Ok(path) => {
            println!("{}", path.display());
            0
        }
        Err(e) => {
            eprintln!("pwd: {e}");
            1
        }
    }
}

fn builtin_help() -> i32 {
    println!("YegaShell");
    println!("Type a command name and press enter.");
    println!("Use the man command for information on other programs.");
    0
}

fn builtin_export(args: &[String], variables: &mut Variables) -> i32 {
    if args.is_empty() {
        variables.dump(&mut io::stdout());
        return 0;
    }

    let mut status = 0;
    for arg in args {
        let (key, value) = match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            // Bare name: re-export whatever value it has, empty when unset.
            None => (
                arg.clone(),
                variables.get(arg).unwrap_or("").to_string(),
            ),
        };

        if !env::is_valid_identifier(&key) {
            eprintln!("export: `{key}': not a valid identifier");
            status = 1;
            continue;
        }
        variables.set(&key, &value, true);
    }
    status
}

fn builtin_unset(args: &[String], variables: &mut Variables) -> i32 {
    let Some(name) = args.first() else {
        eprintln!("unset: usage: unset NAME");
        return 1;
    };

    if !variables.unset(name) {
        eprintln!("unset: `{name}': no such variable");
        return 1;
    }
    0
}

/// List every live job. Decisions are made on current state: the pending
/// record drains first, and jobs found completed print a Done line and
/// leave the table here rather than waiting for the next prompt.
fn builtin_jobs(shell: &mut Shell) -> i32 {
    reaper::apply_pending(&mut shell.job_table);

    for job_num in shell.job_table.job_nums() {
        let Some(job) = shell.job_table.get(job_num) else {
            continue;
        };
        if job.is_completed() {
            job.print_status_line("Done");
            shell.job_table.remove(job_num);
        } else if job.is_stopped() {
            job.print_status_line("Stopped");
        } else {
            job.print_status_line("Running");
        }
    }
    0
}

/// Bring a job to the foreground, resuming it first when stopped. The wait/
/// drain/terminal-handback/notification sequence is the same one an initial
/// foreground launch runs, and `$?` ends up as the job's exit status.
fn builtin_fg(args: &[String], shell: &mut Shell) -> i32 {
    reaper::apply_pending(&mut shell.job_table);

    let Some(job_num) = shell.job_table.find(args.first().map(String::as_str)) else {
        eprintln!("fg: no such job");
        return 1;
    };

    {
        let Some(job) = shell.job_table.get(job_num) else {
            eprintln!("fg: no such job");
            return 1;
        };
        if job.is_completed() {
            eprintln!("fg: job {job_num} already completed");
            return 1;
        }
    }

    let prev_mask = match signals::block_for_launch(false) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("fg: {e}");
            return 1;
        }
    };

    if let Some(job) = shell.job_table.get_mut(job_num) {
        // The job runs on the terminal now; listings and notifications
        // treat it as foreground from here on.
        job.background = false;

        if job.is_stopped() {
            job.clear_stopped();
            println!("{}", job.command);
            if let Err(e) = job_control::send_continue_to_group(job.pgid) {
                eprintln!("fg: {e}");
                if let Err(e) = prev_mask.restore() {
                    eprintln!("sigprocmask(restore): {e}");
                }
                return 1;
            }
        }
    }

    job_control::handle_foreground_job(shell, job_num, &prev_mask);
    shell.last_exit_status
}

/// Resume a stopped job in the background: mark it, announce it with the
/// trailing `&`, send the group SIGCONT, and return to the prompt without
/// waiting.
fn builtin_bg(args: &[String], shell: &mut Shell) -> i32 {
    reaper::apply_pending(&mut shell.job_table);

    let Some(job_num) = shell.job_table.find(args.first().map(String::as_str)) else {
        eprintln!("bg: no such job");
        return 1;
    };

    {
        let Some(job) = shell.job_table.get(job_num) else {
            eprintln!("bg: no such job");
            return 1;
        };
        if job.is_completed() {
            eprintln!("bg: job {job_num} already completed");
            return 1;
        }
    }

    let prev_mask = match signals::block_for_launch(true) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("bg: {e}");
            return 1;
        }
    };

    if let Some(job) = shell.job_table.get_mut(job_num) {
        job.background = true;

        if job.is_stopped() {
            job.clear_stopped();
            println!("{} &", job.command);
            if let Err(e) = job_control::send_continue_to_group(job.pgid) {
                eprintln!("bg: {e}");
                if let Err(e) = prev_mask.restore() {
                    eprintln!("sigprocmask(restore): {e}");
                }
                return 1;
            }
        }
    }

    if let Err(e) = prev_mask.restore() {
        eprintln!("sigprocmask(restore) in parent (bg): {e}");
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names() {
        assert!(is_builtin("fg"));
        assert!(is_builtin("jobs"));
        assert!(is_builtin("cd"));
        assert!(!is_builtin("ls"));
        assert!(!is_builtin("echo"));
    }

    #[test]
    fn atoi_parses_leading_digits() {
        assert_eq!(atoi("7"), 7);
        assert_eq!(atoi("42abc"), 42);
        assert_eq!(atoi("-3"), -3);
        assert_eq!(atoi("+5"), 5);
        assert_eq!(atoi("  9"), 9);
    }

    #[test]
    fn atoi_is_zero_for_non_numeric() {
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("-"), 0);
    }

    #[test]
    fn export_rejects_invalid_identifiers() {
        let mut vars = Variables::new();
        let status = builtin_export(&["2bad=1".to_string()], &mut vars);
        assert_eq!(status, 1);
        assert_eq!(vars.get("2bad"), None);
    }

    #[test]
    fn export_sets_and_marks_exported() {
        let mut vars = Variables::new();
        let status = builtin_export(&["K=v".to_string()], &mut vars);
        assert_eq!(status, 0);
        assert_eq!(vars.get("K"), Some("v"));
        assert_eq!(vars.build_envp().len(), 1);
    }

    #[test]
    fn export_bare_name_reexports_existing_value() {
        let mut vars = Variables::new();
        vars.set("K", "kept", false);
        builtin_export(&["K".to_string()], &mut vars);
        assert_eq!(vars.get("K"), Some("kept"));
        assert_eq!(vars.build_envp().len(), 1);
    }

    #[test]
    fn unset_missing_variable_fails() {
        let mut vars = Variables::new();
        assert_eq!(builtin_unset(&["NOPE".to_string()], &mut vars), 1);
        vars.set("K", "v", false);
        assert_eq!(builtin_unset(&["K".to_string()], &mut vars), 0);
        assert_eq!(vars.get("K"), None);
    }
}

use std::ffi::CString;
use std::io;
use std::os::fd::AsRawFd;

use os_pipe::{PipeReader, PipeWriter};

use crate::builtins::{self, BuiltinAction};
use crate::env::{self, Variables};
use crate::expander;
use crate::job_control;
use crate::parser::{Command, Pipeline};
use crate::shell::Shell;
use crate::signals::{self, SignalMask};

pub enum ExecutionAction {
    Continue(i32),
    Exit(i32),
}

/// Execute one parsed pipeline. Single-stage builtins run in the shell
/// process; everything else becomes a job under process-group discipline.
pub fn run(pipeline: Pipeline, shell: &mut Shell) -> ExecutionAction {
    if pipeline.commands.len() == 1 && builtins::is_builtin(&pipeline.commands[0].argv[0]) {
        // Builtins never fork; the background flag is ignored for them.
        return match builtins::execute(&pipeline.commands[0], shell) {
            BuiltinAction::Continue(code) => ExecutionAction::Continue(code),
            BuiltinAction::Exit(code) => ExecutionAction::Exit(code),
        };
    }

    ExecutionAction::Continue(launch_job(pipeline, shell))
}

/// One allocated pipe. The owned halves realize the parent's closure
/// discipline when dropped; the raw fds are what the children dup from.
struct PipePair {
    read_fd: libc::c_int,
    write_fd: libc::c_int,
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

fn launch_job(pipeline: Pipeline, shell: &mut Shell) -> i32 {
    let background = pipeline.background;
    let num_stages = pipeline.commands.len();
    let job_num = shell
        .job_table
        .create(pipeline.commands, pipeline.raw_text, background);

    // Pipe i connects stage i's stdout to stage i+1's stdin.
    let mut pipes = match create_pipes(num_stages.saturating_sub(1)) {
        Ok(pipes) => pipes,
        Err(e) => {
            eprintln!("pipe failed: {e}");
            shell.job_table.remove(job_num);
            return 1;
        }
    };

    let prev_mask = match signals::block_for_launch(background) {
        Ok(mask) => mask,
        Err(e) => {
            eprintln!("sigprocmask(block) before fork: {e}");
            shell.job_table.remove(job_num);
            return 1;
        }
    };

    if let Err(message) = fork_stages(shell, job_num, &mut pipes, &prev_mask) {
        eprintln!("{message}");
        if let Err(e) = prev_mask.restore() {
            eprintln!("sigprocmask(restore) in parent: {e}");
        }
        shell.job_table.remove(job_num);
        return 1;
    }

    // Any parent-side pipe end still open closes here, before any wait, so
    // the shell never defers EOF propagation by holding a read or write end.
    drop(pipes);

    if background {
        job_control::handle_background_job(&shell.job_table, job_num, &prev_mask);
    } else {
        job_control::handle_foreground_job(shell, job_num, &prev_mask);
    }

    shell.last_exit_status
}

fn create_pipes(count: usize) -> io::Result<Vec<PipePair>> {
    let mut pipes = Vec::with_capacity(count);
    for _ in 0..count {
        let (reader, writer) = os_pipe::pipe()?;
        pipes.push(PipePair {
            read_fd: reader.as_raw_fd(),
            write_fd: writer.as_raw_fd(),
            reader: Some(reader),
            writer: Some(writer),
        });
    }
    Ok(pipes)
}

/// Fork every stage of the job, in pipeline order.
///
/// The first child becomes the group leader; later children join its group.
/// Both sides of each fork call `setpgid` so neither ordering of the race
/// leaves a child outside the group before the terminal is handed over.
fn fork_stages(
    shell: &mut Shell,
    job_num: u64,
    pipes: &mut [PipePair],
    prev_mask: &SignalMask,
) -> Result<(), String> {
    let Shell {
        job_table,
        variables,
        last_exit_status,
        shell_pid,
        ..
    } = &mut *shell;
    let Some(job) = job_table.get_mut(job_num) else {
        return Err("job vanished before launch".to_string());
    };

    let num_stages = job.processes.len();
    let mut pgid: libc::pid_t = 0;

    for stage in 0..num_stages {
        let pid = unsafe { libc::fork() };

        if pid < 0 {
            return Err(format!("fork failed: {}", io::Error::last_os_error()));
        }

        if pid == 0 {
            child_setup(
                &job.processes[stage].cmd,
                stage,
                num_stages,
                pgid,
                pipes,
                prev_mask,
                variables,
                *last_exit_status,
                *shell_pid,
            );
        }

        if stage == 0 {
            pgid = pid;
            job.pgid = pid;
        }
        set_process_group(pid, pgid);
        job.processes[stage].pid = pid;

        // The pipe feeding this stage and the write end it inherited are the
        // child's now; the parent's copies close immediately so EOF can
        // propagate as soon as the writers exit.
        if stage > 0 {
            pipes[stage - 1].reader = None;
        }
        if stage < num_stages - 1 {
            pipes[stage].writer = None;
        }
    }

    Ok(())
}

/// Parent half of the setpgid race. The child may have already moved itself
/// (EACCES) or exec'd (EINVAL, ESRCH); either way the group is as intended.
fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) {
    loop {
        if unsafe { libc::setpgid(pid, pgid) } == 0 {
            return;
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EACCES) | Some(libc::EINVAL) | Some(libc::ESRCH) => return,
            _ => {
                eprintln!("parent: setpgid failed: {err}");
                return;
            }
        }
    }
}

/// Everything the child does between fork and exec. Any failure writes a
/// diagnostic and calls `_exit(EXIT_FAILURE)`; a process that exists only
/// to exec has nothing to unwind.
fn child_setup(
    cmd: &Command,
    stage: usize,
    num_stages: usize,
    pgid: libc::pid_t,
    pipes: &[PipePair],
    prev_mask: &SignalMask,
    variables: &Variables,
    last_exit_status: i32,
    shell_pid: libc::pid_t,
) -> ! {
    signals::reset_child_dispositions();

    // pgid is 0 for stage 0 (become the leader) and the leader's pid after.
    if unsafe { libc::setpgid(0, pgid) } < 0 {
        child_die(&format!(
            "child: setpgid failed: {}",
            io::Error::last_os_error()
        ));
    }

    if let Err(e) = prev_mask.restore() {
        child_die(&format!("sigprocmask(unblock) in child: {e}"));
    }

    // Expansion happens before the redirect targets are opened, so a target
    // like `$OUT` names its final path.
    let cmd = expander::expand_command(cmd, variables, last_exit_status, shell_pid);

    if let Err(e) = child_stdin_setup(&cmd, pipes, stage) {
        child_die(&format!("failed to open input file: {e}"));
    }
    if let Err(e) = child_stdout_setup(&cmd, pipes, stage, num_stages) {
        child_die(&format!("failed to open output file: {e}"));
    }

    close_pipe_ends(pipes);
    exec_command(&cmd, variables)
}

fn child_die(message: &str) -> ! {
    eprintln!("{message}");
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}

/// Stdin: an explicit `< file` wins; otherwise a non-first stage reads the
/// previous pipe.
fn child_stdin_setup(cmd: &Command, pipes: &[PipePair], stage: usize) -> io::Result<()> {
    if let Some(path) = &cmd.infile {
        let fd = open_child_fd(path, libc::O_RDONLY, 0)?;
        dup_onto(fd, libc::STDIN_FILENO)?;
        unsafe { libc::close(fd) };
    } else if stage > 0 {
        dup_onto(pipes[stage - 1].read_fd, libc::STDIN_FILENO)?;
    }
    Ok(())
}

/// Stdout: an explicit `>`/`>>` target wins; otherwise a non-last stage
/// writes the next pipe.
fn child_stdout_setup(
    cmd: &Command,
    pipes: &[PipePair],
    stage: usize,
    num_stages: usize,
) -> io::Result<()> {
    if let Some(path) = &cmd.outfile {
        let trunc_or_append = if cmd.append_output {
            libc::O_APPEND
        } else {
            libc::O_TRUNC
        };
        let fd = open_child_fd(path, libc::O_WRONLY | libc::O_CREAT | trunc_or_append, 0o644)?;
        dup_onto(fd, libc::STDOUT_FILENO)?;
        unsafe { libc::close(fd) };
    } else if stage < num_stages - 1 {
        dup_onto(pipes[stage].write_fd, libc::STDOUT_FILENO)?;
    }
    Ok(())
}

fn open_child_fd(path: &str, flags: libc::c_int, mode: libc::c_int) -> io::Result<libc::c_int> {
    let c_path = CString::new(path)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, mode) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

fn dup_onto(fd: libc::c_int, target: libc::c_int) -> io::Result<()> {
    if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Child side: close both ends of every pipe, including ends the parent had
/// already closed before this stage forked (those fail with EBADF; the fd
/// numbers are not reused between pipe creation and fork).
fn close_pipe_ends(pipes: &[PipePair]) {
    for pipe in pipes {
        unsafe {
            libc::close(pipe.read_fd);
            libc::close(pipe.write_fd);
        }
    }
}

/// Resolve, build the environment, and exec. Never returns.
fn exec_command(cmd: &Command, variables: &Variables) -> ! {
    let Some(program) = cmd.argv.first() else {
        child_die("invalid command");
    };

    let Some(path) = env::resolve_program(program, variables) else {
        child_die(&format!("{program}: command not found"));
    };

    let argv = match cmd
        .argv
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<CString>, _>>()
    {
        Ok(argv) => argv,
        Err(_) => child_die(&format!("{program}: argument contains NUL")),
    };
    let envp = variables.build_envp();

    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());
    let mut envp_ptrs: Vec<*const libc::c_char> = envp.iter().map(|e| e.as_ptr()).collect();
    envp_ptrs.push(std::ptr::null());

    unsafe { libc::execve(path.as_ptr(), argv_ptrs.as_ptr(), envp_ptrs.as_ptr()) };
    child_die(&format!(
        "execve failed: {}",
        io::Error::last_os_error()
    ))
}

mod builtins;
mod editor;
mod env;
mod executor;
mod expander;
mod job_control;
mod jobs;
mod parser;
mod pending;
mod reaper;
mod shell;
mod signals;
mod status;
mod tokenizer;

use std::io;
use std::process;

use crate::executor::ExecutionAction;

const PROMPT: &str = "YegaShell> ";

fn main() {
    let mut shell = match shell::Shell::new() {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("failed to install signal handlers: {e}");
            process::exit(1);
        }
    };
    let mut editor = editor::LineEditor::new();

    loop {
        // Child transitions observed since the last prompt are applied and
        // announced here, before the user types anything new.
        if signals::take_child_changed() {
            reaper::apply_pending(&mut shell.job_table);
            shell.job_table.notify_all();
        }
        signals::clear_interrupted();

        let line = match editor.read_line(PROMPT) {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("error reading input: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match tokenizer::tokenize(trimmed) {
            Ok(tokens) => tokens,
            Err(message) => {
                eprintln!("{message}");
                shell.last_exit_status = 2;
                continue;
            }
        };
        if tokens.is_empty() {
            continue;
        }

        let pipeline = match parser::parse(&tokens, trimmed) {
            Ok(pipeline) => pipeline,
            Err(message) => {
                eprintln!("{message}");
                shell.last_exit_status = 2;
                continue;
            }
        };

        match executor::run(pipeline, &mut shell) {
            ExecutionAction::Continue(code) => shell.last_exit_status = code,
            ExecutionAction::Exit(code) => {
                shell.job_table.kill_all();
                process::exit(code);
            }
        }
    }

    // EOF: remaining jobs get SIGHUP/SIGCONT/SIGTERM, and the shell's exit
    // status is the last pipeline's.
    shell.job_table.kill_all();
    process::exit(shell.last_exit_status);
}

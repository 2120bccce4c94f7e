use std::io::Write;
use std::process::{Command, Stdio};

const PROMPT: &str = "YegaShell> ";

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_yegashell"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn yegashell");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| line.trim_start_matches(PROMPT).to_string())
        .collect()
}

#[test]
fn shell_ignores_sigtstp() {
    // $$ expands to the shell's own pid, so the external kill targets the
    // shell. With SIGTSTP ignored, the shell keeps reading commands.
    let output = run_shell(&["kill -TSTP $$", "echo ALIVE"]);
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|l| l == "ALIVE"), "stdout was: {lines:?}");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[test]
fn shell_survives_sigint() {
    let output = run_shell(&["kill -INT $$", "echo ALIVE"]);
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|l| l == "ALIVE"), "stdout was: {lines:?}");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[test]
fn shell_survives_sigquit() {
    let output = run_shell(&["kill -QUIT $$", "echo ALIVE"]);
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|l| l == "ALIVE"), "stdout was: {lines:?}");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[test]
fn pipeline_sigpipe_does_not_abort_the_shell() {
    // yes writes indefinitely; head -1 exits after one line, closing the
    // read end. yes takes the default SIGPIPE disposition in the child and
    // terminates, the pipeline's status comes from head, and the shell keeps
    // going. Also exercises the parent-side pipe closure discipline: a
    // leaked write end in the shell would keep the pipeline alive forever.
    let output = run_shell(&["yes | head -1", "echo $?", "echo ALIVE"]);
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|l| l == "ALIVE"), "stdout was: {lines:?}");
    assert!(lines.iter().any(|l| l == "0"), "stdout was: {lines:?}");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[test]
fn foreground_ctrl_c_equivalent_reaches_only_the_job() {
    // The job's sh kills its own process group, standing in for a keyboard
    // SIGINT delivered to the foreground group. The shell is in a different
    // group and keeps running; the job dies by signal, so $? is 128 + 2.
    let output = run_shell(&["sh -c 'kill -INT 0'", "echo $?", "echo ALIVE"]);
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|l| l == "130"), "stdout was: {lines:?}");
    assert!(lines.iter().any(|l| l == "ALIVE"), "stdout was: {lines:?}");
}

use crate::error::{OptiError, Result};
use crate::printer::Printer;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// How many trailing stderr lines to keep for error reports.
const STDERR_TAIL: usize = 20;

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn spawn_error(program: &str, err: std::io::Error) -> OptiError {
    let detail = if err.kind() == std::io::ErrorKind::NotFound {
        "command not found".to_string()
    } else {
        err.to_string()
    };
    OptiError::process(program, detail, vec![])
}

fn exit_detail(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Next line from `r` without the line ending, or `None` at end of stream.
/// Invalid UTF-8 is replaced rather than ending the stream.
async fn next_line<R: AsyncBufRead + Unpin>(r: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    buf.clear();
    match r.read_until(b'\n', buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            while matches!(buf.last(), Some(b'\n' | b'\r')) {
                buf.pop();
            }
            Some(String::from_utf8_lossy(buf).into_owned())
        }
    }
}

/// True when `program` can be spawned at all. The exit status is irrelevant:
/// some tools reject `--version` but still exist.
pub async fn command_exists(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

/// Run to completion and return trimmed stdout. Non-zero exit is an error
/// carrying the captured stderr.
pub async fn output(printer: &Printer, program: &str, args: &[&str], cwd: &Path) -> Result<String> {
    printer.trace(program, &owned(args));
    let out = Command::new(program)
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr)
            .lines()
            .map(|l| l.to_string())
            .collect();
        return Err(OptiError::process(program, exit_detail(out.status), stderr));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim_end().to_string())
}

/// Run with stdout attached to the terminal. Stderr is forwarded line by line
/// and its tail kept so a failure can report it.
pub async fn run(printer: &Printer, program: &str, args: &[String], cwd: &Path) -> Result<()> {
    printer.trace(program, args);
    let mut child = Command::new(program)
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut tail: VecDeque<String> = VecDeque::new();
    if let Some(stderr) = child.stderr.take() {
        let mut r = BufReader::new(stderr);
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut r, &mut buf).await {
            eprintln!("{line}");
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    let status = child.wait().await.map_err(|e| spawn_error(program, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(OptiError::process(program, exit_detail(status), tail.into()))
    }
}

/// Spawn and return (child, receiver of stdout and stderr lines). The child is
/// killed when dropped.
pub fn spawn_lines(
    printer: &Printer,
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<(Child, mpsc::UnboundedReceiver<String>)> {
    printer.trace(program, args);
    let mut child = Command::new(program)
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let (tx, rx) = mpsc::unbounded_channel::<String>();

    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut r = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_line(&mut r, &mut buf).await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut r = BufReader::new(stderr);
            let mut buf = Vec::new();
            while let Some(line) = next_line(&mut r, &mut buf).await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    }

    Ok((child, rx))
}

/// Spawn with inherited stdio in the caller's process group, so the child
/// can read the terminal and receives the same Ctrl-C.
pub fn spawn_foreground(printer: &Printer, program: &str, args: &[String], cwd: &Path) -> Result<Child> {
    printer.trace(program, args);
    Command::new(program)
        .current_dir(cwd)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))
}

/// Ask the child to shut down.
#[cfg(unix)]
pub fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
pub fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn quiet() -> Printer {
        Printer::new("test", false)
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        assert!(!command_exists("definitely-not-a-real-binary-4711").await);
        assert!(command_exists("sh").await);
    }

    #[tokio::test]
    async fn output_returns_stdout_and_reports_stderr_on_failure() {
        let cwd = std::env::temp_dir();
        let out = output(&quiet(), "sh", &["-c", "echo hello"], &cwd).await.unwrap();
        assert_eq!(out, "hello");

        let err = output(&quiet(), "sh", &["-c", "echo boom >&2; exit 3"], &cwd)
            .await
            .unwrap_err();
        match err {
            OptiError::ExternalProcessFailure { detail, stderr, .. } => {
                assert_eq!(detail, "exited with code 3");
                assert_eq!(stderr, vec!["boom".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_keeps_stderr_tail() {
        let cwd = std::env::temp_dir();
        let args = vec!["-c".to_string(), "echo first >&2; echo second >&2; exit 1".to_string()];
        let err = run(&quiet(), "sh", &args, &cwd).await.unwrap_err();
        match err {
            OptiError::ExternalProcessFailure { stderr, .. } => {
                assert_eq!(stderr, vec!["first".to_string(), "second".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn spawn_lines_streams_both_pipes() {
        let cwd = std::env::temp_dir();
        let args = vec!["-c".to_string(), "echo out; echo err >&2".to_string()];
        let (_child, mut rx) = spawn_lines(&quiet(), "sh", &args, &cwd).unwrap();
        let mut seen = Vec::new();
        while let Some(line) = rx.recv().await {
            seen.push(line);
        }
        seen.sort();
        assert_eq!(seen, vec!["err".to_string(), "out".to_string()]);
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_end_the_stream() {
        let cwd = std::env::temp_dir();
        let args = vec![
            "-c".to_string(),
            "printf 'engine \\377 init\\n'; echo 'EdgeTelemetry starting up'; sleep 5".to_string(),
        ];
        let (mut child, mut rx) = spawn_lines(&quiet(), "sh", &args, &cwd).unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first, "engine \u{fffd} init");
        let got = crate::docker::wait_for_marker(
            &mut rx,
            "EdgeTelemetry starting up",
            std::time::Duration::from_secs(3),
        )
        .await;
        assert_eq!(got, crate::docker::Readiness::Ready);
        let _ = child.kill().await;
    }

    #[tokio::test]
    async fn run_keeps_stderr_after_invalid_utf8() {
        let cwd = std::env::temp_dir();
        let args = vec![
            "-c".to_string(),
            "printf 'bad \\377\\r\\n' >&2; echo 'login failed' >&2; exit 1".to_string(),
        ];
        match run(&quiet(), "sh", &args, &cwd).await.unwrap_err() {
            OptiError::ExternalProcessFailure { stderr, .. } => {
                assert_eq!(stderr, vec!["bad \u{fffd}".to_string(), "login failed".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreground_child_shares_our_process_group() {
        use nix::unistd::{getpgid, Pid};

        let cwd = std::env::temp_dir();
        let mut child = spawn_foreground(&quiet(), "sleep", &["30".to_string()], &cwd).unwrap();
        let pid = Pid::from_raw(child.id().unwrap() as i32);
        assert_eq!(getpgid(Some(pid)).unwrap(), getpgid(None).unwrap());

        terminate(&mut child);
        let status = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }
}

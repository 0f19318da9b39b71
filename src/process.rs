//! Blocking child-process execution with live output echo
//!
//! External tools (venv, pip, cmake, ldd) can run for minutes. Their combined
//! stdout/stderr is echoed line-by-line inside a box-drawing gutter as it is
//! produced, so the caller sees progress without any buffering of the whole
//! stream.

use crate::error::{PackError, PackResult};
use console::style;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

/// Print one gutter line, dimmed when stdout is a terminal
fn echo(prefix: &str, line: &str) {
    if console::Term::stdout().is_term() {
        println!("  {} {}", style(prefix).dim(), line);
    } else {
        println!("  {} {}", prefix, line);
    }
}

fn pump<R: Read + Send + 'static>(reader: R, tx: mpsc::Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let buf = BufReader::new(reader);
        for line in buf.lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

/// Run a command to completion, echoing its merged output as it arrives.
///
/// Returns the exit code. A spawn failure maps to [`PackError::ExternalTool`]
/// with code -1; a nonzero exit is returned to the caller, which decides
/// whether it is fatal.
pub fn stream_command(tool: &str, mut command: Command) -> PackResult<i32> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());

    tracing::debug!("Running {}: {:?}", tool, command);
    let mut child = command.spawn().map_err(|e| {
        tracing::error!("Failed to spawn {}: {}", tool, e);
        PackError::ExternalTool {
            tool: tool.to_string(),
            code: -1,
        }
    })?;

    echo("┌", "");

    let (tx, rx) = mpsc::channel();
    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        pumps.push(pump(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(pump(stderr, tx.clone()));
    }
    drop(tx);

    // Both pumps feed one channel; lines appear in arrival order
    for line in rx {
        echo("│", &line);
    }
    for handle in pumps {
        let _ = handle.join();
    }

    echo("└", "");

    let status = child.wait()?;
    Ok(status.code().unwrap_or(-1))
}

/// Run a command and fail unless it exits zero
pub fn run_checked(tool: &str, command: Command) -> PackResult<()> {
    let code = stream_command(tool, command)?;
    if code != 0 {
        return Err(PackError::ExternalTool {
            tool: tool.to_string(),
            code,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn reports_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; exit 3"]);
        assert_eq!(stream_command("sh", cmd).unwrap(), 3);
    }

    #[test]
    #[cfg(unix)]
    fn run_checked_fails_on_nonzero_exit() {
        let mut cmd = Command::new("false");
        cmd.arg("");
        let err = run_checked("false", cmd).unwrap_err();
        match err {
            PackError::ExternalTool { tool, code } => {
                assert_eq!(tool, "false");
                assert_ne!(code, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn spawn_failure_is_external_tool_error() {
        let cmd = Command::new("gempack-no-such-binary-xyz");
        let err = stream_command("missing", cmd).unwrap_err();
        assert!(matches!(
            err,
            PackError::ExternalTool { code: -1, .. }
        ));
    }
}

//! Runner that executes commands through the system shell.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult, LogHandler, LogLine, LogStream};

/// Runs commands with `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    shell_arg: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        let (shell, shell_arg) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
        Self {
            shell: shell.to_string(),
            shell_arg: shell_arg.to_string(),
        }
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell, e.g. `bash`.
    pub fn with_shell(mut self, shell: impl Into<String>, arg: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.shell_arg = arg.into();
        self
    }

    fn command(&self, command: &str, workdir: &Path) -> RunnerResult<Command> {
        if !workdir.is_dir() {
            return Err(RunnerError::InvalidWorkdir(workdir.display().to_string()));
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_arg)
            .arg(command)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

/// Read `reader` line by line, forwarding each line to `handler`.
async fn pump_lines<R>(reader: R, stream: LogStream, handler: LogHandler) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                collected.push(line.clone());
                handler(LogLine {
                    timestamp: Utc::now(),
                    stream,
                    index: collected.len(),
                    message: line,
                });
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%stream, error = %e, "Stopped reading command output");
                break;
            }
        }
    }
    collected
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, workdir: &Path, timeout: Duration) -> RunnerResult<ExecutionResult> {
        debug!(command, workdir = %workdir.display(), "Executing");
        let started_at = Utc::now();
        let start = Instant::now();

        let child = self
            .command(command, workdir)?
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed(format!("{}: {}", command, e)))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?,
            Err(_) => {
                warn!(command, timeout_secs = timeout.as_secs(), "Command timed out");
                return Err(RunnerError::Timeout(timeout.as_secs()));
            }
        };

        Ok(ExecutionResult {
            command: command.to_string(),
            exit_code: output.status.code().unwrap_or(-1) as i64,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn run_streaming(
        &self,
        command: &str,
        workdir: &Path,
        handler: LogHandler,
    ) -> RunnerResult<ExecutionResult> {
        debug!(command, workdir = %workdir.display(), "Executing with streamed output");
        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = self
            .command(command, workdir)?
            .spawn()
            .map_err(|e| RunnerError::SpawnFailed(format!("{}: {}", command, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both streams are drained concurrently so neither pipe can fill up.
        let stdout_task = tokio::spawn({
            let handler = handler.clone();
            async move {
                match stdout {
                    Some(out) => pump_lines(out, LogStream::Stdout, handler).await,
                    None => Vec::new(),
                }
            }
        });
        let stderr_task = tokio::spawn({
            let handler = handler.clone();
            async move {
                match stderr {
                    Some(err) => pump_lines(err, LogStream::Stderr, handler).await,
                    None => Vec::new(),
                }
            }
        });

        let stdout_lines = stdout_task.await.unwrap_or_default();
        let stderr_lines = stderr_task.await.unwrap_or_default();

        let status = child
            .wait()
            .await
            .map_err(|e| RunnerError::ExecutionFailed(e.to_string()))?;

        Ok(ExecutionResult {
            command: command.to_string(),
            exit_code: status.code().unwrap_or(-1) as i64,
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

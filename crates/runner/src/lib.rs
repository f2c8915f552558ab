//! Sequential command runner for build steps.
//!
//! Commands execute strictly in order because later steps may depend on
//! filesystem state left by earlier ones. Each command's stdout and stderr
//! are streamed line by line to an [`OutputSink`] while the command runs,
//! so long builds give live feedback instead of buffering to completion.
//! The first non-zero exit (or spawn failure) stops the run.

use ciglue_core::{CommandSpec, Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Observer for streamed command output.
///
/// For every spawned command the sink sees zero or more `on_stdout` /
/// `on_stderr` calls followed by exactly one `on_exit` call.
pub trait OutputSink: Send {
    fn on_stdout(&mut self, line: &str);
    fn on_stderr(&mut self, line: &str);
    fn on_exit(&mut self, code: i32);
}

/// Sink that forwards command output to the process's own stdio.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn on_stdout(&mut self, line: &str) {
        println!("{line}");
    }

    fn on_stderr(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn on_exit(&mut self, code: i32) {
        tracing::debug!(exit_code = code, "command finished");
    }
}

/// Sink that records everything it observes, for tests and embedders that
/// capture build output instead of printing it.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exits: Vec<i32>,
}

impl OutputSink for CollectingSink {
    fn on_stdout(&mut self, line: &str) {
        self.stdout.push(line.to_string());
    }

    fn on_stderr(&mut self, line: &str) {
        self.stderr.push(line.to_string());
    }

    fn on_exit(&mut self, code: i32) {
        self.exits.push(code);
    }
}

/// Executes an ordered list of build commands.
#[derive(Debug, Default)]
pub struct CommandRunner {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    deadline: Option<Duration>,
}

impl CommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all commands in the given directory instead of the current one.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable for every command in the run.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Apply an overall deadline to the run. When it elapses the current
    /// command is killed and the run fails with a timeout error.
    #[must_use]
    pub fn with_timeout(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Execute the commands strictly in order, streaming output to `sink`.
    ///
    /// Stops at the first command that exits non-zero or fails to spawn;
    /// that command is reported as the run's failure and no later command
    /// runs.
    pub async fn run(&self, commands: &[CommandSpec], sink: &mut dyn OutputSink) -> Result<()> {
        let started = tokio::time::Instant::now();

        for spec in commands {
            tracing::info!(command = %spec.display(), "running build command");

            let remaining = match self.deadline {
                Some(deadline) => {
                    let elapsed = started.elapsed();
                    Some(deadline.checked_sub(elapsed).ok_or(Error::Timeout {
                        operation: format!("run {}", spec.display()),
                        duration: deadline,
                    })?)
                }
                None => None,
            };

            self.run_one(spec, remaining, sink).await?;
        }

        Ok(())
    }

    async fn run_one(
        &self,
        spec: &CommandSpec,
        remaining: Option<Duration>,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let mut cmd = Command::new(&spec.cmd);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        // Spawn failure (missing binary, permissions) is reported exactly
        // like a failing command: the run stops here.
        let mut child = cmd.spawn().map_err(|e| {
            Error::command_execution(
                &spec.cmd,
                spec.args.clone(),
                format!("failed to spawn: {e}"),
                None,
            )
        })?;

        let streaming = Self::stream_until_exit(&mut child, sink);
        let status = match remaining {
            Some(remaining) => tokio::time::timeout(remaining, streaming)
                .await
                .map_err(|_| {
                    // kill_on_drop reaps the child once `child` goes out of scope
                    Error::Timeout {
                        operation: format!("run {}", spec.display()),
                        duration: remaining,
                    }
                })??,
            None => streaming.await?,
        };

        let code = status.code().unwrap_or(-1);
        sink.on_exit(code);

        if status.success() {
            Ok(())
        } else {
            Err(Error::command_execution(
                &spec.cmd,
                spec.args.clone(),
                "build command failed",
                Some(code),
            ))
        }
    }

    /// Drain stdout and stderr line by line, then await the exit status.
    /// Lines are delivered to the sink in arrival order; the exit status is
    /// observed only after both streams are closed, so every chunk precedes
    /// the exit notification.
    async fn stream_until_exit(
        child: &mut tokio::process::Child,
        sink: &mut dyn OutputSink,
    ) -> Result<std::process::ExitStatus> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::configuration("child process stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::configuration("child process stderr was not piped"))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => sink.on_stdout(&line),
                    Ok(None) => stdout_open = false,
                    Err(e) => return Err(Error::file_system(
                        PathBuf::from("<stdout>"), "read command output", e,
                    )),
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => sink.on_stderr(&line),
                    Ok(None) => stderr_open = false,
                    Err(e) => return Err(Error::file_system(
                        PathBuf::from("<stderr>"), "read command output", e,
                    )),
                },
            }
        }

        child.wait().await.map_err(|e| {
            Error::command_execution("<child>", vec![], format!("failed to await exit: {e}"), None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(cmd: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            cmd: cmd.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_streams_stdout_before_exit() {
        let runner = CommandRunner::new();
        let mut sink = CollectingSink::default();

        runner
            .run(&[spec("sh", &["-c", "echo one; echo two"])], &mut sink)
            .await
            .expect("command should succeed");

        assert_eq!(sink.stdout, vec!["one", "two"]);
        assert_eq!(sink.exits, vec![0]);
    }

    #[tokio::test]
    async fn test_stderr_is_streamed_separately() {
        let runner = CommandRunner::new();
        let mut sink = CollectingSink::default();

        runner
            .run(&[spec("sh", &["-c", "echo out; echo err >&2"])], &mut sink)
            .await
            .expect("command should succeed");

        assert_eq!(sink.stdout, vec!["out"]);
        assert_eq!(sink.stderr, vec!["err"]);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let runner = CommandRunner::new();
        let mut sink = CollectingSink::default();

        let commands = [
            spec("sh", &["-c", "echo A"]),
            spec("sh", &["-c", "echo B; exit 1"]),
            spec("sh", &["-c", "echo C"]),
        ];
        let err = runner
            .run(&commands, &mut sink)
            .await
            .expect_err("run should fail at B");

        // A and B ran, C never did
        assert_eq!(sink.stdout, vec!["A", "B"]);
        assert_eq!(sink.exits, vec![0, 1]);
        assert!(err.to_string().contains("exit code 1"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_terminal() {
        let runner = CommandRunner::new();
        let mut sink = CollectingSink::default();

        let commands = [
            spec("ciglue-definitely-not-a-command", &[]),
            spec("sh", &["-c", "echo never"]),
        ];
        let err = runner
            .run(&commands, &mut sink)
            .await
            .expect_err("spawn should fail");

        assert!(sink.stdout.is_empty());
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_working_dir_applies_to_commands() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let runner = CommandRunner::new().with_working_dir(dir.path());
        let mut sink = CollectingSink::default();

        runner
            .run(&[spec("sh", &["-c", "pwd"])], &mut sink)
            .await
            .expect("command should succeed");

        let canonical = dir.path().canonicalize().expect("canonicalize");
        assert_eq!(sink.stdout, vec![canonical.to_string_lossy().to_string()]);
    }

    #[tokio::test]
    async fn test_deadline_kills_long_command() {
        let runner = CommandRunner::new().with_timeout(Duration::from_millis(200));
        let mut sink = CollectingSink::default();

        let err = runner
            .run(&[spec("sh", &["-c", "sleep 5"])], &mut sink)
            .await
            .expect_err("run should time out");

        assert!(matches!(err, Error::Timeout { .. }));
    }
}

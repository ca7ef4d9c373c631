use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, StackError};

/// Captured result of an external command. A non-zero exit is a normal value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub working_directory: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Stream output to the terminal instead of capturing it.
    pub inherit_output: bool,
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn inherited() -> Self {
        Self {
            inherit_output: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Spawns external CLI processes. Swapped for a scripted fake in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, argv: &[String], options: &RunOptions) -> Result<ProcessOutput>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, argv: &[String], options: &RunOptions) -> Result<ProcessOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| StackError::Spawn {
            program: String::new(),
            message: "empty command line".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = &options.working_directory {
            cmd.current_dir(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        tracing::debug!(command = %argv.join(" "), "spawning process");

        if options.inherit_output {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
            let status = with_timeout(program, options.timeout, cmd.status()).await?;
            return Ok(ProcessOutput {
                exit_code: status.code().unwrap_or(-1),
                ..ProcessOutput::default()
            });
        }

        cmd.stdin(Stdio::null());
        let output = with_timeout(program, options.timeout, cmd.output()).await?;
        let result = ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if !result.success() {
            tracing::debug!(
                command = %argv.join(" "),
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "process exited non-zero"
            );
        }
        Ok(result)
    }
}

async fn with_timeout<T>(
    program: &str,
    timeout: Option<Duration>,
    fut: impl std::future::Future<Output = std::io::Result<T>>,
) -> Result<T> {
    let spawn_error = |e: std::io::Error| StackError::Spawn {
        program: program.to_string(),
        message: e.to_string(),
    };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StackError::Timeout {
                program: program.to_string(),
                seconds: limit.as_secs(),
            })?
            .map_err(spawn_error),
        None => fut.await.map_err(spawn_error),
    }
}

/// Build an owned argv from string slices.
pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Run and turn a non-zero exit into `StackError::ProcessFailure`.
pub async fn run_strict(
    runner: &dyn ProcessRunner,
    argv: &[String],
    options: &RunOptions,
) -> Result<ProcessOutput> {
    let output = runner.run(argv, options).await?;
    if !output.success() {
        return Err(StackError::ProcessFailure {
            program: argv.first().cloned().unwrap_or_default(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn strict_mode_reports_exit_code_and_stderr() {
        let runner = ScriptedRunner::new();
        runner.on("docker stop", ProcessOutput::failed(1, "No such container: x\n"));

        let err = run_strict(&runner, &argv(&["docker", "stop", "x"]), &RunOptions::default())
            .await
            .unwrap_err();
        match err {
            StackError::ProcessFailure {
                program,
                exit_code,
                stderr,
            } => {
                assert_eq!(program, "docker");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "No such container: x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_strict_mode_returns_failure_as_value() {
        let runner = ScriptedRunner::new();
        runner.on("docker stop", ProcessOutput::failed(125, "boom"));
        let out = runner
            .run(&argv(&["docker", "stop", "x"]), &RunOptions::default())
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 125);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_output() {
        let out = SystemRunner
            .run(&argv(&["sh", "-c", "echo hi; echo err >&2; exit 3"]), &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let err = SystemRunner
            .run(
                &argv(&["definitely-not-a-real-binary-xyz"]),
                &RunOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_enforces_timeout() {
        let options = RunOptions::default().with_timeout(Duration::from_millis(100));
        let err = SystemRunner
            .run(&argv(&["sleep", "5"]), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Timeout { .. }));
    }
}

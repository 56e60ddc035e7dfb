// Subprocess management for package managers and compilers, with timeout
// handling and output capture. All external invocations go through the
// ProcessRunner capability so tests can substitute a scripted runner.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ProcessError, Result};

/// Process execution configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub inherit_env: bool,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            environment: HashMap::new(),
            timeout: None,
            inherit_env: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Argv rendered for logs and error messages
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Process execution result
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability for running external processes. Arguments are always passed
/// as vectors, never interpolated through a shell.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, config: ProcessConfig) -> Result<ProcessResult>;
}

/// Production runner backed by tokio::process
pub struct SystemProcessRunner {
    default_timeout: Duration,
}

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, config: ProcessConfig) -> Result<ProcessResult> {
        use std::process::Stdio;
        use tokio::io::AsyncReadExt;
        use tokio::process::Command;
        use tokio::time::timeout;

        let start_time = std::time::Instant::now();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        if !config.inherit_env {
            cmd.env_clear();
        }
        for (key, value) in &config.environment {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            command: config.display_command(),
            error: e.to_string(),
        })?;

        let timeout_duration = config.timeout.unwrap_or(self.default_timeout);

        let execution = timeout(timeout_duration, async {
            let mut stdout_data = Vec::new();
            let mut stderr_data = Vec::new();

            if let Some(stdout) = child.stdout.as_mut() {
                stdout
                    .read_to_end(&mut stdout_data)
                    .await
                    .map_err(|e| ProcessError::OutputCaptureFailed {
                        message: format!("Failed to read stdout: {e}"),
                        command: config.command.clone(),
                    })?;
            }

            if let Some(stderr) = child.stderr.as_mut() {
                stderr
                    .read_to_end(&mut stderr_data)
                    .await
                    .map_err(|e| ProcessError::OutputCaptureFailed {
                        message: format!("Failed to read stderr: {e}"),
                        command: config.command.clone(),
                    })?;
            }

            let exit_status = child.wait().await.map_err(|e| ProcessError::ExecutionFailed {
                command: config.command.clone(),
                exit_code: None,
                stderr: format!("Failed to wait for process: {e}"),
            })?;

            Ok::<ProcessResult, crate::error::ForgeError>(ProcessResult {
                exit_code: exit_status.code(),
                stdout: String::from_utf8_lossy(&stdout_data).to_string(),
                stderr: String::from_utf8_lossy(&stderr_data).to_string(),
                duration: start_time.elapsed(),
            })
        })
        .await;

        match execution {
            Ok(result) => result,
            Err(_) => {
                // Timeout occurred - kill the process before reporting
                let _ = child.kill().await;
                let _ = child.wait().await;

                Err(ProcessError::Timeout {
                    command: config.display_command(),
                    duration: timeout_duration,
                }
                .into())
            }
        }
    }
}

/// Scripted runner for tests. Every invocation succeeds with a generic
/// version-style stdout unless a failure rule matches the rendered argv.
pub struct FakeProcessRunner {
    failures: Mutex<Vec<FailureRule>>,
    invocations: Mutex<Vec<ProcessConfig>>,
    missing_commands: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    needle: String,
    exit_code: i32,
    stderr: String,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            missing_commands: Mutex::new(Vec::new()),
        }
    }

    /// Make every invocation whose rendered argv contains `needle` exit
    /// nonzero with the given stderr.
    pub fn fail_matching(&self, needle: impl Into<String>, stderr: impl Into<String>) {
        self.failures
            .lock()
            .unwrap()
            .push(FailureRule {
                needle: needle.into(),
                exit_code: 1,
                stderr: stderr.into(),
            });
    }

    /// Simulate a command missing from the host (spawn failure)
    pub fn remove_command(&self, command: impl Into<String>) {
        self.missing_commands.lock().unwrap().push(command.into());
    }

    /// All configurations this runner has been invoked with, in order
    pub fn invocations(&self) -> Vec<ProcessConfig> {
        self.invocations.lock().unwrap().clone()
    }

    /// Count invocations whose rendered argv contains `needle`
    pub fn invocation_count_matching(&self, needle: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|config| config.display_command().contains(needle))
            .count()
    }
}

impl Default for FakeProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessRunner for FakeProcessRunner {
    async fn run(&self, config: ProcessConfig) -> Result<ProcessResult> {
        let rendered = config.display_command();
        self.invocations.lock().unwrap().push(config.clone());

        if self
            .missing_commands
            .lock()
            .unwrap()
            .iter()
            .any(|missing| *missing == config.command)
        {
            return Err(ProcessError::SpawnFailed {
                command: rendered,
                error: "No such file or directory".to_string(),
            }
            .into());
        }

        let matched = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|rule| rendered.contains(&rule.needle))
            .cloned();

        if let Some(rule) = matched {
            return Ok(ProcessResult {
                exit_code: Some(rule.exit_code),
                stdout: String::new(),
                stderr: rule.stderr,
                duration: Duration::from_millis(1),
            });
        }

        Ok(ProcessResult {
            exit_code: Some(0),
            stdout: format!("{} 1.0.0", config.command),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_builder() {
        let config = ProcessConfig::new("cargo")
            .with_args(vec!["add", "serde"])
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.command, "cargo");
        assert_eq!(config.args, vec!["add", "serde"]);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.inherit_env);
        assert_eq!(config.display_command(), "cargo add serde");
    }

    #[tokio::test]
    async fn test_fake_runner_default_success() {
        let runner = FakeProcessRunner::new();
        let result = runner
            .run(ProcessConfig::new("npm").with_args(vec!["--version"]))
            .await
            .unwrap();

        assert!(result.success());
        assert!(result.stdout.contains("npm"));
        assert_eq!(runner.invocation_count_matching("npm --version"), 1);
    }

    #[tokio::test]
    async fn test_fake_runner_failure_rule() {
        let runner = FakeProcessRunner::new();
        runner.fail_matching("install left-pad", "E404 not found");

        let result = runner
            .run(ProcessConfig::new("npm").with_args(vec!["install", "left-pad"]))
            .await
            .unwrap();

        assert!(!result.success());
        assert!(result.stderr.contains("E404"));
    }

    #[tokio::test]
    async fn test_fake_runner_missing_command() {
        let runner = FakeProcessRunner::new();
        runner.remove_command("cargo");

        let result = runner
            .run(ProcessConfig::new("cargo").with_args(vec!["--version"]))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemProcessRunner::new();
        let result = runner
            .run(ProcessConfig::new("echo").with_args(vec!["hello"]))
            .await
            .unwrap();

        assert!(result.success());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_system_runner_timeout() {
        let runner = SystemProcessRunner::new();
        let result = runner
            .run(
                ProcessConfig::new("sleep")
                    .with_args(vec!["5"])
                    .with_timeout(Duration::from_millis(50)),
            )
            .await;

        assert!(matches!(
            result,
            Err(crate::error::ForgeError::Process(ref e))
                if matches!(e.as_ref(), ProcessError::Timeout { .. })
        ));
    }
}

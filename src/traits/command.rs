use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Trait for executing system commands, allowing for mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments in `working_dir` and capture its output
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output>;
}

/// Real command executor using std::process::Command
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], working_dir: &Path) -> Result<Output> {
        Command::new(command)
            .args(args)
            .current_dir(working_dir)
            .output()
            .with_context(|| format!("Failed to execute '{}'", command))
    }
}

/// A scripted response for [`MockCommandExecutor`]
///
/// `command` is matched against the start of the full command line
/// (program plus arguments joined by spaces).
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct MockCommandResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Fail to spawn instead of returning output
    pub spawn_error: bool,
}

#[cfg(test)]
impl MockCommandResult {
    pub fn ok(command: &str, stdout: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            spawn_error: false,
        }
    }

    pub fn failed(command: &str, exit_code: i32, stderr: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            spawn_error: false,
        }
    }

    pub fn not_installed(command: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            spawn_error: true,
        }
    }
}

/// Mock command executor for testing
///
/// Each scripted result is consumed by the first matching invocation.
/// Unmatched invocations succeed with empty output. Every invocation is
/// recorded so tests can assert on what was (not) run.
#[cfg(test)]
pub struct MockCommandExecutor {
    outputs: std::sync::Mutex<Vec<MockCommandResult>>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<MockCommandResult>) -> Self {
        Self {
            outputs: std::sync::Mutex::new(outputs),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Full command lines in invocation order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str], _working_dir: &Path) -> Result<Output> {
        let line = std::iter::once(command)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let mut outputs = self.outputs.lock().unwrap();
        let Some(index) = outputs.iter().position(|r| line.starts_with(&r.command)) else {
            return Ok(Output {
                status: create_exit_status(0),
                stdout: Vec::new(),
                stderr: Vec::new(),
            });
        };

        let scripted = outputs.remove(index);
        if scripted.spawn_error {
            anyhow::bail!("Failed to execute '{}': No such file or directory", command);
        }

        Ok(Output {
            status: create_exit_status(scripted.exit_code),
            stdout: scripted.stdout.into_bytes(),
            stderr: scripted.stderr.into_bytes(),
        })
    }
}

#[cfg(test)]
fn create_exit_status(code: i32) -> std::process::ExitStatus {
    // ExitStatus can't be constructed directly; raw wait statuses carry the
    // exit code in the high byte on unix
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mock_executor_returns_configured_output() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult::ok(
            "terraform state list",
            "azurerm_resource_group.main\n",
        )]);

        let output = executor
            .execute("terraform", &["state", "list"], &PathBuf::from("."))
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&output.stdout),
            "azurerm_resource_group.main\n"
        );
    }

    #[test]
    fn test_mock_executor_reports_exit_code() {
        let executor = MockCommandExecutor::with_outputs(vec![MockCommandResult::failed(
            "terraform plan",
            2,
            "",
        )]);

        let output = executor
            .execute("terraform", &["plan", "-detailed-exitcode"], &PathBuf::from("."))
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_mock_executor_default_success_and_records_calls() {
        let executor = MockCommandExecutor::new();
        let output = executor
            .execute("terraform", &["validate"], &PathBuf::from("."))
            .unwrap();

        assert!(output.status.success());
        assert_eq!(executor.calls(), vec!["terraform validate".to_string()]);
    }

    #[test]
    fn test_mock_executor_spawn_error() {
        let executor =
            MockCommandExecutor::with_outputs(vec![MockCommandResult::not_installed("az")]);

        assert!(executor.execute("az", &["version"], &PathBuf::from(".")).is_err());
    }
}

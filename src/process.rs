use std::{path::Path, process::Stdio, time::Duration};

use tokio::{process::Command, time};
use tracing::debug;

use crate::error::ToolError;

// external command-line tool invocation with a hard timeout. the child is
// killed if the timeout elapses.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration
}

impl ToolCommand {
    pub fn new(program: &str, args: &[String], timeout: Duration) -> Self {
        ToolCommand {
            program: program.to_string(),
            args: args.to_vec(),
            timeout
        }
    }

    // runs `program args.. extra..` and returns trimmed stdout.
    pub async fn run(&self, extra: &[&str], cwd: Option<&Path>) -> Result<String, ToolError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args)
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        debug!(program = %self.program, args = ?self.args, "running external tool");

        let child = command.spawn().map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source
        })?;
        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source
            })?,
            Err(_) => {
                return Err(ToolError::Timeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs()
                });
            }
        };

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string()
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ToolCommand {
        ToolCommand::new("sh", &[String::from("-c"), script.to_string(), String::from("sh")], timeout)
    }

    #[tokio::test]
    async fn test_captures_stdout_and_arguments() {
        let command = sh("printf '  %s|%s  \\n' \"$1\" \"$2\"", Duration::from_secs(5));
        let output = command.run(&["first", "second arg"], None).await.unwrap();
        assert_eq!(output, "first|second arg");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = sh("pwd", Duration::from_secs(5))
            .run(&[], Some(dir.path()))
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&output).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = sh("echo broken >&2; exit 3", Duration::from_secs(5))
            .run(&[], None)
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected failure, got {:?}", other)
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let command = ToolCommand::new("paperpress-no-such-tool", &[], Duration::from_secs(5));
        assert!(matches!(command.run(&[], None).await, Err(ToolError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = sh("sleep 5", Duration::from_millis(100))
            .run(&[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}

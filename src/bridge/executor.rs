/// Process-backed bridge executor
///
/// Spawns the control tool once per call and enforces the per-call timeout by
/// killing the child.
use super::{Bridge, ProbeFailure, ProbeResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Bridge backed by a real executable (usually `adb`)
#[derive(Debug, Clone)]
pub struct CommandBridge {
    program: PathBuf,
}

impl CommandBridge {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandBridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

#[async_trait]
impl Bridge for CommandBridge {
    async fn execute(&self, args: &[String], timeout: Duration) -> ProbeResult {
        let start = Instant::now();

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(
                    program = %self.program.display(),
                    args = ?args,
                    error = %e,
                    "Bridge spawn failed"
                );
                return ProbeResult::failed("", ProbeFailure::Spawn(e.to_string()));
            }
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        // Buffers live outside the timed future so output read before a
        // timeout survives it
        let waited = tokio::time::timeout(timeout, async {
            let (status, _, _) = tokio::join!(
                child.wait(),
                drain(stdout_pipe, &mut stdout_buf),
                drain(stderr_pipe, &mut stderr_buf)
            );
            status
        })
        .await;

        let (success, error) = match waited {
            Ok(Ok(status)) if status.success() => (true, None),
            Ok(Ok(status)) => (false, Some(ProbeFailure::ExitCode(status.code()))),
            Ok(Err(e)) => (false, Some(ProbeFailure::Spawn(e.to_string()))),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!(error = %e, "Failed to kill timed out bridge call");
                }
                (false, Some(ProbeFailure::Timeout))
            }
        };

        let result = ProbeResult {
            success,
            stdout: String::from_utf8_lossy(&stdout_buf).trim().to_string(),
            stderr: String::from_utf8_lossy(&stderr_buf).trim().to_string(),
            error,
        };

        tracing::debug!(
            args = ?args,
            success = result.success,
            error = ?result.error,
            elapsed = %humantime::format_duration(round_to_millis(start.elapsed())),
            "Bridge call finished"
        );

        result
    }
}

/// Read a pipe to EOF, appending chunk by chunk so a cancelled read keeps what
/// already arrived
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) {
    let Some(mut pipe) = pipe else {
        return;
    };

    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_successful_call_trims_output() {
        let bridge = CommandBridge::new("sh");
        let result = bridge
            .execute(&sh("echo '  device  '"), Duration::from_secs(5))
            .await;

        assert!(result.success);
        assert_eq!(result.stdout, "device");
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code_and_stderr() {
        let bridge = CommandBridge::new("sh");
        let result = bridge
            .execute(
                &sh("echo 'error: device offline' >&2; exit 1"),
                Duration::from_secs(5),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.stderr, "error: device offline");
        assert_eq!(result.error, Some(ProbeFailure::ExitCode(Some(1))));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let bridge = CommandBridge::new("sh");
        let start = Instant::now();
        let result = bridge
            .execute(&sh("sleep 10"), Duration::from_millis(200))
            .await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ProbeFailure::Timeout));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let bridge = CommandBridge::new("sh");
        let result = bridge
            .execute(
                &sh("echo partial; echo 'still waiting' >&2; sleep 10"),
                Duration::from_millis(500),
            )
            .await;

        assert_eq!(result.error, Some(ProbeFailure::Timeout));
        assert_eq!(result.stdout, "partial");
        assert_eq!(result.stderr, "still waiting");
    }

    #[tokio::test]
    async fn test_missing_program_is_a_value_not_an_error() {
        let bridge = CommandBridge::new("/nonexistent/bridge-tool");
        let result = bridge
            .execute(&["get-state".to_string()], Duration::from_secs(1))
            .await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(ProbeFailure::Spawn(_))));
    }
}

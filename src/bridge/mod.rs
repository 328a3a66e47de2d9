/// Bridge layer - talks to devices through the external control tool
///
/// Every call resolves to a [`ProbeResult`]. Timeouts, non-zero exits and spawn
/// failures are all values; deciding whether to retry belongs to the caller.
pub mod commands;
pub mod executor;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::BridgeCommand;
pub use executor::CommandBridge;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Why a bridge call did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Child exceeded its deadline and was killed
    Timeout,

    /// Child exited with a non-zero code (`None` when killed by a signal)
    ExitCode(Option<i32>),

    /// Child could not be started or awaited
    Spawn(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Timeout => write!(f, "TIMEOUT"),
            ProbeFailure::ExitCode(Some(code)) => write!(f, "exit-code:{}", code),
            ProbeFailure::ExitCode(None) => write!(f, "exit-code:signal"),
            ProbeFailure::Spawn(message) => write!(f, "{}", message),
        }
    }
}

impl Serialize for ProbeFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one bridge invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeFailure>,
}

impl ProbeResult {
    /// Successful call with the given output
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            error: None,
        }
    }

    /// Failed call with the given stderr and failure kind
    pub fn failed(stderr: impl Into<String>, error: ProbeFailure) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            error: Some(error),
        }
    }

    pub fn timed_out() -> Self {
        Self::failed("", ProbeFailure::Timeout)
    }

    /// Did the call succeed and print exactly `token`?
    pub fn stdout_is(&self, token: &str) -> bool {
        self.success && self.stdout == token
    }

    /// Did the call succeed and print something containing `marker`?
    pub fn stdout_contains(&self, marker: &str) -> bool {
        self.success && self.stdout.contains(marker)
    }
}

/// The external control tool, as seen by the control loop.
///
/// Implementations must never block past `timeout` and must never return an
/// error: every outcome is expressed in the returned [`ProbeResult`].
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn execute(&self, args: &[String], timeout: Duration) -> ProbeResult;

    /// Run a typed command
    async fn run(&self, command: &BridgeCommand, timeout: Duration) -> ProbeResult {
        self.execute(&command.args(), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failure_display() {
        assert_eq!(ProbeFailure::Timeout.to_string(), "TIMEOUT");
        assert_eq!(ProbeFailure::ExitCode(Some(1)).to_string(), "exit-code:1");
        assert_eq!(ProbeFailure::ExitCode(None).to_string(), "exit-code:signal");
        assert_eq!(
            ProbeFailure::Spawn("No such file or directory".to_string()).to_string(),
            "No such file or directory"
        );
    }

    #[test]
    fn test_probe_result_serializes_error_as_string() {
        let json = serde_json::to_value(ProbeResult::timed_out()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "TIMEOUT");

        let json = serde_json::to_value(ProbeResult::ok("device")).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_stdout_checks_require_success() {
        let mut result = ProbeResult::ok("device");
        assert!(result.stdout_is("device"));

        result.success = false;
        assert!(!result.stdout_is("device"));
        assert!(!result.stdout_contains("dev"));
    }
}

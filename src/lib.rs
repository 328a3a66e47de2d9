pub mod artifacts;
pub mod bridge;
pub mod config;
pub mod health;
pub mod logging;
pub mod recovery;

// Re-export the job entry points for convenience
pub use health::{DeviceStatus, HealthProber, StatusClassifier};
pub use recovery::{RecoveryOrchestrator, RecoveryReport};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

// Global flag for handling Ctrl+C interrupts
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Set the interrupt flag (called by signal handler)
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Check if an interrupt has been received
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Reset the interrupt flag (primarily for testing)
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// A device managed by this run. Loaded from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Bridge selector (serial number or `host:port`)
    pub id: String,
    /// Human-friendly label used in logs and reports
    #[serde(default)]
    pub name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Devices still broken after the post-check, with their final statuses.
///
/// Every field is comma-joined in device order so callers can forward it
/// as-is to flat reporting systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDevices {
    pub failed_device_ids: String,
    pub failed_device_names: String,
    pub failed_device_statuses: String,
    pub unrecovered_count: usize,
    /// Re-running the job cannot help: every failed device is in a state no
    /// escalation step can change.
    pub no_retry: bool,
}

impl FailedDevices {
    pub fn from_devices(failed: &[(Device, DeviceStatus)]) -> Self {
        let ids: Vec<&str> = failed.iter().map(|(d, _)| d.id.as_str()).collect();
        let names: Vec<&str> = failed.iter().map(|(d, _)| d.name.as_str()).collect();
        let statuses: Vec<&str> = failed.iter().map(|(_, s)| s.as_str()).collect();

        Self {
            failed_device_ids: ids.join(","),
            failed_device_names: names.join(","),
            failed_device_statuses: statuses.join(","),
            unrecovered_count: failed.len(),
            no_retry: !failed.is_empty() && failed.iter().all(|(_, s)| s.is_unrecoverable()),
        }
    }
}

/// Job-level outcome surfaced to the caller. Probe-level failures never
/// reach this type; they are absorbed into a [`DeviceStatus`].
#[derive(Error, Debug)]
pub enum JobError {
    #[error("All {total} devices failed the ping check")]
    AllDevicesFailed { total: usize },

    #[error("{} devices failed to recover: {}", .0.unrecovered_count, .0.failed_device_ids)]
    RecoveryIncomplete(FailedDevices),

    #[error("Artifact write failed: {0}")]
    Artifact(#[from] artifacts::ArtifactError),
}

impl JobError {
    /// Whether an external retry of the whole job is pointless
    pub fn no_retry(&self) -> bool {
        match self {
            JobError::RecoveryIncomplete(failed) => failed.no_retry,
            _ => false,
        }
    }

    /// Failure details, present only for an incomplete recovery
    pub fn failed_devices(&self) -> Option<&FailedDevices> {
        match self {
            JobError::RecoveryIncomplete(failed) => Some(failed),
            _ => None,
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;

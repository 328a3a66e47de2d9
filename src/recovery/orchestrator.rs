/// Recovery orchestrator - precheck, escalate, postcheck
///
/// Phase 1 classifies every device and fixes the fleet context (whether any
/// device is UP) before anything disruptive runs. Phase 2 walks the recovery
/// ladder for each recoverable device, one device at a time, stopping at the
/// first step that brings it back. Phase 3 reclassifies the whole fleet, since
/// a daemon restart for one device can disturb the others.
///
/// All artifacts are written before a job-level failure is returned.
use super::ladder::{Applicability, LadderContext, RecoveryLadder, StepLog};
use super::settle::{settle, SettleOutcome};
use crate::artifacts::ArtifactWriter;
use crate::bridge::Bridge;
use crate::config::FleetConfig;
use crate::health::{DeviceStatus, StatusClassifier};
use crate::{is_interrupted, Device, FailedDevices, JobError, JobResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

pub const PRECHECK_ARTIFACT: &str = "precheck.json";
pub const RECOVERY_LOGS_ARTIFACT: &str = "recovery_logs.json";
pub const POSTCHECK_ARTIFACT: &str = "postcheck.json";
pub const SUMMARY_ARTIFACT: &str = "summary.json";

/// Status of one device at a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCheck {
    pub id: String,
    pub name: String,
    pub status: DeviceStatus,
}

/// Outcome of the ladder (or of skipping it) for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAttempt {
    pub id: String,
    pub name: String,
    pub precheck_status: DeviceStatus,
    pub success: bool,
    /// Level of the step that restored UP, 0 if none did
    pub recovery_level: u8,
    pub elapsed_ms: u64,
    pub logs: Vec<StepLog>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_failed_original: usize,
    pub recovered_count: usize,
    pub unrecovered_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl RunSummary {
    fn empty() -> Self {
        Self {
            total_failed_original: 0,
            recovered_count: 0,
            unrecovered_count: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Everything a successful run observed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub precheck: Vec<DeviceCheck>,
    pub has_up_devices: bool,
    pub attempts: Vec<RecoveryAttempt>,
    pub postcheck: Vec<DeviceCheck>,
    pub summary: RunSummary,
}

pub struct RecoveryOrchestrator<'a, B: Bridge + ?Sized> {
    bridge: &'a B,
    devices: &'a [Device],
    timeout: Duration,
    ladder: RecoveryLadder,
    deadline: Option<Duration>,
    artifacts: &'a ArtifactWriter,
}

impl<'a, B: Bridge + ?Sized> RecoveryOrchestrator<'a, B> {
    pub fn new(
        bridge: &'a B,
        devices: &'a [Device],
        timeout: Duration,
        artifacts: &'a ArtifactWriter,
    ) -> Self {
        Self {
            bridge,
            devices,
            timeout,
            ladder: RecoveryLadder::default(),
            deadline: None,
            artifacts,
        }
    }

    /// Orchestrator for the configured fleet, ladder and deadline
    pub fn from_config(
        bridge: &'a B,
        config: &'a FleetConfig,
        artifacts: &'a ArtifactWriter,
    ) -> Self {
        Self::new(bridge, &config.devices, config.bridge_timeout(), artifacts)
            .with_ladder(RecoveryLadder::standard(&config.settle))
            .with_deadline(config.recovery_deadline())
    }

    pub fn with_ladder(mut self, ladder: RecoveryLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Bound each device's ladder; remaining steps are dropped once it passes
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run all three phases
    pub async fn run(&self) -> JobResult<RecoveryReport> {
        tracing::info!(devices = self.devices.len(), "Job: recover");

        if self.devices.is_empty() {
            tracing::info!("No devices configured. Skipping.");
            return Ok(RecoveryReport {
                precheck: Vec::new(),
                has_up_devices: false,
                attempts: Vec::new(),
                postcheck: Vec::new(),
                summary: RunSummary::empty(),
            });
        }

        let classifier = StatusClassifier::new(self.bridge, self.timeout);

        // --- Phase 1: precheck ---
        let precheck = self.precheck(&classifier).await;
        self.artifacts.write_json(PRECHECK_ARTIFACT, &precheck)?;

        // Fixed here, before any step can disturb the fleet
        let context = LadderContext {
            has_up_devices: precheck.iter().any(|c| c.status.is_up()),
        };

        let (recoverable, unrecoverable): (Vec<&DeviceCheck>, Vec<&DeviceCheck>) = precheck
            .iter()
            .filter(|c| !c.status.is_up())
            .partition(|c| c.status.is_recoverable());

        let total_failed = recoverable.len() + unrecoverable.len();
        if total_failed == 0 {
            tracing::info!("All devices healthy. No recovery needed.");
            return Ok(RecoveryReport {
                has_up_devices: context.has_up_devices,
                precheck,
                attempts: Vec::new(),
                postcheck: Vec::new(),
                summary: RunSummary::empty(),
            });
        }

        // --- Phase 2: escalation ---
        tracing::info!(
            recoverable = recoverable.len(),
            manual = unrecoverable.len(),
            has_up_devices = context.has_up_devices,
            "Recovery target: {}, Manual required: {}",
            recoverable.len(),
            unrecoverable.len()
        );

        let mut attempts = Vec::with_capacity(total_failed);
        for check in &unrecoverable {
            attempts.push(manual_intervention(check));
        }
        for check in &recoverable {
            attempts.push(self.recover_device(&classifier, check, context).await);
        }
        self.artifacts.write_json(RECOVERY_LOGS_ARTIFACT, &attempts)?;

        // --- Phase 3: postcheck ---
        let failed_ids: HashSet<&str> = recoverable
            .iter()
            .chain(unrecoverable.iter())
            .map(|c| c.id.as_str())
            .collect();

        let (postcheck, still_failed) = self.postcheck(&classifier, &failed_ids).await;
        self.artifacts.write_json(POSTCHECK_ARTIFACT, &postcheck)?;

        let summary = RunSummary {
            total_failed_original: total_failed,
            recovered_count: total_failed - still_failed.len(),
            unrecovered_count: still_failed.len(),
            timestamp: Utc::now(),
        };
        self.artifacts.write_json(SUMMARY_ARTIFACT, &summary)?;

        tracing::info!(
            recovered = summary.recovered_count,
            failed = summary.unrecovered_count,
            "Summary: Recovered {}, Failed {}",
            summary.recovered_count,
            summary.unrecovered_count
        );

        if !still_failed.is_empty() {
            let failed = FailedDevices::from_devices(&still_failed);
            if failed.no_retry {
                tracing::warn!("Non-recoverable state detected. Requesting no retry.");
            }
            tracing::error!(
                devices = %failed.failed_device_ids,
                statuses = %failed.failed_device_statuses,
                no_retry = failed.no_retry,
                "{} devices failed to recover",
                failed.unrecovered_count
            );
            return Err(JobError::RecoveryIncomplete(failed));
        }

        Ok(RecoveryReport {
            has_up_devices: context.has_up_devices,
            precheck,
            attempts,
            postcheck,
            summary,
        })
    }

    async fn precheck(&self, classifier: &StatusClassifier<'_, B>) -> Vec<DeviceCheck> {
        tracing::info!("Starting pre-check for {} devices...", self.devices.len());

        let mut checks = Vec::with_capacity(self.devices.len());
        for device in self.devices {
            let status = classifier.classify(&device.id).await;
            if status.is_up() {
                tracing::info!(device = %device.id, "  [{}] UP", device.name);
            } else {
                tracing::warn!(device = %device.id, status = %status, "  [{}] DOWN ({})", device.name, status);
            }
            checks.push(DeviceCheck {
                id: device.id.clone(),
                name: device.name.clone(),
                status,
            });
        }
        checks
    }

    /// Walk the ladder for one device. `context` is a copy; nothing here can
    /// change what the rest of the fleet sees.
    async fn recover_device(
        &self,
        classifier: &StatusClassifier<'_, B>,
        check: &DeviceCheck,
        context: LadderContext,
    ) -> RecoveryAttempt {
        let start = Instant::now();
        // A deadline past the representable range is no deadline at all
        let deadline = self.deadline.and_then(|d| start.checked_add(d));
        let mut logs = Vec::with_capacity(self.ladder.steps().len());
        let mut level = 0;

        tracing::info!(device = %check.id, "[{}] Recovery sequence started...", check.name);

        for (index, ladder_step) in self.ladder.steps().iter().enumerate() {
            let step = ladder_step.step;

            if is_interrupted() {
                tracing::warn!(device = %check.id, "  [Step {}] Interrupted, stopping escalation", step.level());
                logs.push(StepLog::Interrupted {
                    step: step.level(),
                    action: step.action(),
                });
                break;
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::warn!(
                    device = %check.id,
                    "  [Step {}] Recovery deadline exceeded, dropping remaining steps",
                    step.level()
                );
                logs.extend(self.ladder.steps()[index..].iter().map(|remaining| {
                    StepLog::DeadlineExceeded {
                        step: remaining.step.level(),
                        action: remaining.step.action(),
                    }
                }));
                break;
            }

            let entry = match step.applicability(&context) {
                Applicability::Skip(reason) => {
                    tracing::info!(device = %check.id, "  [Step {}] Skipped ({})", step.level(), reason);
                    StepLog::Skipped {
                        step: step.level(),
                        action: step.action(),
                        reason,
                        status_after: classifier.classify(&check.id).await,
                    }
                }
                Applicability::Applicable => {
                    tracing::info!(device = %check.id, "  [Step {}] {}...", step.level(), step.description());

                    let mut command_ok = true;
                    for command in step.commands(&check.id) {
                        let result = self.bridge.run(&command, self.timeout).await;
                        if !result.success {
                            tracing::warn!(
                                device = %check.id,
                                args = ?command.args(),
                                error = ?result.error,
                                "    Step command failed"
                            );
                            command_ok = false;
                        }
                    }

                    if !ladder_step.settle.is_zero() {
                        tracing::info!(
                            device = %check.id,
                            "    -> Waiting {} to settle...",
                            humantime::format_duration(ladder_step.settle)
                        );
                        if settle(ladder_step.settle, deadline).await == SettleOutcome::Interrupted {
                            tracing::warn!(device = %check.id, "    -> Settle wait interrupted");
                            logs.push(StepLog::Interrupted {
                                step: step.level(),
                                action: step.action(),
                            });
                            break;
                        }
                    }

                    StepLog::Executed {
                        step: step.level(),
                        action: step.action(),
                        command_ok,
                        status_after: classifier.classify(&check.id).await,
                    }
                }
            };

            let recovered = entry.recovered();
            logs.push(entry);

            if recovered {
                level = step.level();
                tracing::info!(device = %check.id, level, "    -> ✅ Recovered!");
                break;
            }
        }

        if level == 0 {
            tracing::error!(device = %check.id, "    -> ❌ [{}] Failed all steps.", check.name);
        }

        RecoveryAttempt {
            id: check.id.clone(),
            name: check.name.clone(),
            precheck_status: check.status,
            success: level > 0,
            recovery_level: level,
            elapsed_ms: start.elapsed().as_millis() as u64,
            logs,
        }
    }

    /// Reclassify every device; return all checks plus the originally failed
    /// devices that are still not UP
    async fn postcheck(
        &self,
        classifier: &StatusClassifier<'_, B>,
        failed_ids: &HashSet<&str>,
    ) -> (Vec<DeviceCheck>, Vec<(Device, DeviceStatus)>) {
        tracing::info!("Starting post-check...");

        let mut checks = Vec::with_capacity(self.devices.len());
        let mut still_failed = Vec::new();

        for device in self.devices {
            let status = classifier.classify(&device.id).await;

            if failed_ids.contains(device.id.as_str()) {
                if status.is_up() {
                    tracing::info!(device = %device.id, "  ✅ [{}] RECOVERED", device.name);
                } else {
                    tracing::error!(device = %device.id, status = %status, "  ❌ [{}] UNRECOVERED ({})", device.name, status);
                    still_failed.push((device.clone(), status));
                }
            } else if !status.is_up() {
                tracing::warn!(
                    device = %device.id,
                    status = %status,
                    "  [{}] was UP at pre-check, now {}",
                    device.name,
                    status
                );
            }

            checks.push(DeviceCheck {
                id: device.id.clone(),
                name: device.name.clone(),
                status,
            });
        }

        (checks, still_failed)
    }
}

fn manual_intervention(check: &DeviceCheck) -> RecoveryAttempt {
    tracing::warn!(
        device = %check.id,
        status = %check.status,
        "[{}] Skipped recovery: state is {} (manual intervention required)",
        check.name,
        check.status
    );

    RecoveryAttempt {
        id: check.id.clone(),
        name: check.name.clone(),
        precheck_status: check.status,
        success: false,
        recovery_level: 0,
        elapsed_ms: 0,
        logs: vec![StepLog::ManualInterventionRequired {
            status: check.status,
            message: format!(
                "Skipped recovery: state is {} (manual intervention required)",
                check.status
            ),
        }],
    }
}

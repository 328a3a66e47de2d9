/// Fleet-wide ping check
///
/// Probes every configured device once and reports per-device detail. A single
/// reachable device keeps the fleet usable, so the job only fails when every
/// configured device is down.
use super::classification::{is_alive, is_connected};
use crate::artifacts::ArtifactWriter;
use crate::bridge::{Bridge, BridgeCommand, ProbeResult};
use crate::{Device, JobError, JobResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

pub const PING_ARTIFACT: &str = "ping.json";
pub const SUMMARY_ARTIFACT: &str = "summary.json";

/// Raw probe output kept for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ProbeDetails {
    pub state: ProbeResult,
    pub ping: ProbeResult,
    /// Informational only; never part of the decision
    pub version: ProbeResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProbeReport {
    pub id: String,
    pub name: String,
    pub success: bool,
    pub elapsed_ms: u64,
    pub details: ProbeDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct PingSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PingReport {
    pub devices: Vec<DeviceProbeReport>,
    pub summary: PingSummary,
}

pub struct HealthProber<'a, B: Bridge + ?Sized> {
    bridge: &'a B,
    devices: &'a [Device],
    timeout: Duration,
    artifacts: &'a ArtifactWriter,
}

impl<'a, B: Bridge + ?Sized> HealthProber<'a, B> {
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
            artifacts,
        }
    }

    /// Run the ping check across the fleet
    pub async fn run(&self) -> JobResult<PingReport> {
        tracing::info!(
            devices = self.devices.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Job: ping"
        );

        if self.devices.is_empty() {
            tracing::info!("No devices configured");
            return Ok(PingReport {
                devices: Vec::new(),
                summary: PingSummary {
                    total: 0,
                    success: 0,
                    failed: 0,
                    timestamp: Utc::now(),
                },
            });
        }

        let mut reports = Vec::with_capacity(self.devices.len());
        for device in self.devices {
            reports.push(self.probe_device(device).await);
        }

        let success = reports.iter().filter(|r| r.success).count();
        let summary = PingSummary {
            total: self.devices.len(),
            success,
            failed: reports.len() - success,
            timestamp: Utc::now(),
        };

        self.artifacts.write_json(PING_ARTIFACT, &reports)?;
        self.artifacts.write_json(SUMMARY_ARTIFACT, &summary)?;

        tracing::info!(
            success = summary.success,
            total = summary.total,
            "Summary: {}/{} devices reachable",
            summary.success,
            summary.total
        );

        if summary.success == 0 {
            tracing::error!("All devices failed the ping check");
            return Err(JobError::AllDevicesFailed {
                total: summary.total,
            });
        }

        Ok(PingReport {
            devices: reports,
            summary,
        })
    }

    async fn probe_device(&self, device: &Device) -> DeviceProbeReport {
        let start = Instant::now();
        tracing::info!(device = %device.id, "[{}] Checking...", device.name);

        let state = self
            .bridge
            .run(&BridgeCommand::get_state(&device.id), self.timeout)
            .await;
        let ping = self
            .bridge
            .run(&BridgeCommand::echo(&device.id), self.timeout)
            .await;
        let version = self
            .bridge
            .run(&BridgeCommand::os_version(&device.id), self.timeout)
            .await;

        let success = is_connected(&state) && is_alive(&ping);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let shown = |r: &ProbeResult| {
            if r.stdout.is_empty() {
                "N/A".to_string()
            } else {
                r.stdout.clone()
            }
        };

        if success {
            tracing::info!(
                device = %device.id,
                elapsed_ms,
                "✅ [{}] reachable - State: {}, Ver: {}",
                device.name,
                shown(&state),
                shown(&version)
            );
        } else {
            tracing::warn!(
                device = %device.id,
                elapsed_ms,
                state_error = ?state.error,
                ping_error = ?ping.error,
                "❌ [{}] unreachable - State: {}, Ver: {}",
                device.name,
                shown(&state),
                shown(&version)
            );
        }

        DeviceProbeReport {
            id: device.id.clone(),
            name: device.name.clone(),
            success,
            elapsed_ms,
            details: ProbeDetails {
                state,
                ping,
                version,
            },
        }
    }
}

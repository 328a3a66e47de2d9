/// Device status classification
///
/// Two consecutive probes decide the status: a connection-state query and, if
/// the daemon reports the device as connected, an echo round-trip. When the
/// device is not connected the stderr of the state query tells apart devices
/// escalation may save (offline) from those it cannot (revoked key, unplugged).
use crate::bridge::commands::{CONNECTED_STATE, LIVENESS_MARKER};
use crate::bridge::{Bridge, BridgeCommand, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Health of one device as seen by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// Connected and answering shell commands
    Up,

    /// Connected but the echo round-trip failed (hung shell, busy device)
    Unstable,

    /// Daemon sees the device as offline
    Offline,

    /// Debugging key not accepted on the device
    Unauthorized,

    /// Daemon does not know the device (unplugged, wrong serial)
    NotFound,

    /// Anything else, including daemon failures with no recognizable message
    Unknown,
}

/// Statuses no ladder step can change
pub const UNRECOVERABLE: [DeviceStatus; 3] = [
    DeviceStatus::NotFound,
    DeviceStatus::Unauthorized,
    DeviceStatus::Unknown,
];

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Up => "UP",
            DeviceStatus::Unstable => "UNSTABLE",
            DeviceStatus::Offline => "OFFLINE",
            DeviceStatus::Unauthorized => "UNAUTHORIZED",
            DeviceStatus::NotFound => "NOT_FOUND",
            DeviceStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_up(&self) -> bool {
        *self == DeviceStatus::Up
    }

    /// Down, but worth running the recovery ladder for
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceStatus::Unstable | DeviceStatus::Offline)
    }

    /// Down and needs a human
    pub fn is_unrecoverable(&self) -> bool {
        UNRECOVERABLE.contains(self)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Did the state query report the device as connected?
pub fn is_connected(state: &ProbeResult) -> bool {
    state.stdout_is(CONNECTED_STATE)
}

/// Did the echo round-trip come back?
pub fn is_alive(liveness: &ProbeResult) -> bool {
    liveness.stdout_contains(LIVENESS_MARKER)
}

/// Map probe results to a status.
///
/// `liveness` is only consulted when the state probe reports a connected
/// device; a connected device without a liveness result is `Unstable`.
pub fn classify_probes(state: &ProbeResult, liveness: Option<&ProbeResult>) -> DeviceStatus {
    if is_connected(state) {
        return match liveness {
            Some(ping) if is_alive(ping) => DeviceStatus::Up,
            _ => DeviceStatus::Unstable,
        };
    }

    let stderr = state.stderr.to_lowercase();
    if stderr.contains("unauthorized") {
        DeviceStatus::Unauthorized
    } else if stderr.contains("not found") {
        DeviceStatus::NotFound
    } else if stderr.contains("offline") {
        DeviceStatus::Offline
    } else {
        DeviceStatus::Unknown
    }
}

/// Runs the two classification probes through a bridge
pub struct StatusClassifier<'a, B: Bridge + ?Sized> {
    bridge: &'a B,
    timeout: Duration,
}

impl<'a, B: Bridge + ?Sized> StatusClassifier<'a, B> {
    pub fn new(bridge: &'a B, timeout: Duration) -> Self {
        Self { bridge, timeout }
    }

    /// Classify one device. Never fails; bridge failures become statuses.
    pub async fn classify(&self, device_id: &str) -> DeviceStatus {
        let state = self
            .bridge
            .run(&BridgeCommand::get_state(device_id), self.timeout)
            .await;

        let status = if is_connected(&state) {
            let ping = self
                .bridge
                .run(&BridgeCommand::echo(device_id), self.timeout)
                .await;
            classify_probes(&state, Some(&ping))
        } else {
            classify_probes(&state, None)
        };

        tracing::debug!(
            device = %device_id,
            status = %status,
            state_error = ?state.error,
            "Device classified"
        );

        status
    }
}

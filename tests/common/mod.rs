/// Common test utilities for integration tests
///
/// This module provides:
/// - A simulated device fleet behind the `Bridge` trait
/// - Fixtures for devices, ladders and artifact directories
pub mod mock_fleet;

use fleet_medic::artifacts::ArtifactWriter;
use fleet_medic::config::SettleConfig;
use fleet_medic::recovery::RecoveryLadder;
use fleet_medic::Device;
use std::path::Path;
use tempfile::TempDir;

/// Standard ladder with no settle waits
#[allow(dead_code)]
pub fn instant_ladder() -> RecoveryLadder {
    RecoveryLadder::standard(&SettleConfig {
        daemon_restart_secs: 0,
        reboot_secs: 0,
    })
}

/// Devices named after their ids
#[allow(dead_code)]
pub fn devices(ids: &[&str]) -> Vec<Device> {
    ids.iter()
        .map(|id| Device::new(*id, format!("Phone {}", id)))
        .collect()
}

/// Temporary artifacts directory with a writer pointed at it
pub fn artifact_dir() -> (TempDir, ArtifactWriter) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let writer = ArtifactWriter::new(temp.path());
    (temp, writer)
}

/// Parse a JSON artifact written during a test
#[allow(dead_code)]
pub fn read_artifact(dir: &Path, name: &str) -> serde_json::Value {
    let body = std::fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("artifact {} missing: {}", name, e));
    serde_json::from_str(&body).expect("artifact is not valid JSON")
}

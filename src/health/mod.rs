/// Device health: status classification and the fleet ping check
pub mod classification;
pub mod prober;

pub use classification::{classify_probes, DeviceStatus, StatusClassifier, UNRECOVERABLE};
pub use prober::{DeviceProbeReport, HealthProber, PingReport, PingSummary};

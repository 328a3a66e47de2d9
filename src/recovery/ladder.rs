/// Recovery ladder - ordered remediation steps
///
/// The ladder is a table of step definitions, cheapest first. Each step knows
/// the bridge commands it issues, whether it applies in the current fleet
/// context, and how long the device needs to settle afterwards.
use crate::bridge::BridgeCommand;
use crate::config::SettleConfig;
use crate::health::DeviceStatus;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    /// Send the HOME key event
    HomeKey,

    /// Restart the shared bridge daemon
    DaemonRestart,

    /// Reboot the device
    Reboot,
}

impl RecoveryStep {
    /// Recovery level credited when this step brings the device back
    pub fn level(&self) -> u8 {
        match self {
            RecoveryStep::HomeKey => 1,
            RecoveryStep::DaemonRestart => 2,
            RecoveryStep::Reboot => 3,
        }
    }

    /// Short action label used in step logs
    pub fn action(&self) -> &'static str {
        match self {
            RecoveryStep::HomeKey => "keyevent HOME",
            RecoveryStep::DaemonRestart => "restart-server",
            RecoveryStep::Reboot => "reboot",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecoveryStep::HomeKey => "Sending HOME key",
            RecoveryStep::DaemonRestart => "Restarting bridge daemon",
            RecoveryStep::Reboot => "Rebooting device",
        }
    }

    /// Risk level (0-10, where 10 disturbs the most)
    pub fn risk_level(&self) -> u8 {
        match self {
            RecoveryStep::HomeKey => 1,
            // Drops every connected device, not just this one
            RecoveryStep::DaemonRestart => 6,
            RecoveryStep::Reboot => 8,
        }
    }

    /// Bridge commands issued by this step, in order
    pub fn commands(&self, device_id: &str) -> Vec<BridgeCommand> {
        match self {
            RecoveryStep::HomeKey => vec![BridgeCommand::home_key(device_id)],
            RecoveryStep::DaemonRestart => {
                vec![BridgeCommand::KillServer, BridgeCommand::StartServer]
            }
            RecoveryStep::Reboot => vec![BridgeCommand::reboot(device_id)],
        }
    }

    /// Whether this step may run in the given fleet context
    pub fn applicability(&self, context: &LadderContext) -> Applicability {
        match self {
            RecoveryStep::DaemonRestart if context.has_up_devices => {
                Applicability::Skip("daemon restart unsafe while other devices are UP")
            }
            _ => Applicability::Applicable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Applicable,
    Skip(&'static str),
}

/// Fleet facts fixed at precheck and shared read-only by every device's ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LadderContext {
    pub has_up_devices: bool,
}

/// One row of the ladder table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderStep {
    pub step: RecoveryStep,
    /// Wait after the step's commands, before reclassifying
    pub settle: Duration,
}

impl LadderStep {
    pub fn new(step: RecoveryStep, settle: Duration) -> Self {
        Self { step, settle }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryLadder {
    steps: Vec<LadderStep>,
}

impl RecoveryLadder {
    pub fn new(steps: Vec<LadderStep>) -> Self {
        Self { steps }
    }

    /// HOME key, then daemon restart, then reboot
    pub fn standard(settle: &SettleConfig) -> Self {
        Self::new(vec![
            LadderStep::new(RecoveryStep::HomeKey, Duration::ZERO),
            LadderStep::new(RecoveryStep::DaemonRestart, settle.daemon_restart()),
            LadderStep::new(RecoveryStep::Reboot, settle.reboot()),
        ])
    }

    pub fn steps(&self) -> &[LadderStep] {
        &self.steps
    }
}

impl Default for RecoveryLadder {
    fn default() -> Self {
        Self::standard(&SettleConfig::default())
    }
}

/// Record of one ladder step for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepLog {
    #[serde(rename_all = "camelCase")]
    Executed {
        step: u8,
        action: &'static str,
        /// Every command of the step exited 0
        command_ok: bool,
        status_after: DeviceStatus,
    },

    #[serde(rename_all = "camelCase")]
    Skipped {
        step: u8,
        action: &'static str,
        reason: &'static str,
        status_after: DeviceStatus,
    },

    #[serde(rename_all = "camelCase")]
    ManualInterventionRequired { status: DeviceStatus, message: String },

    #[serde(rename_all = "camelCase")]
    DeadlineExceeded { step: u8, action: &'static str },

    #[serde(rename_all = "camelCase")]
    Interrupted { step: u8, action: &'static str },
}

impl StepLog {
    /// Status observed after the step, if the device was reclassified
    pub fn status_after(&self) -> Option<DeviceStatus> {
        match self {
            StepLog::Executed { status_after, .. } | StepLog::Skipped { status_after, .. } => {
                Some(*status_after)
            }
            _ => None,
        }
    }

    pub fn recovered(&self) -> bool {
        self.status_after().is_some_and(|s| s.is_up())
    }
}

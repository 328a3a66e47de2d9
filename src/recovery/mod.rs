/// Escalating recovery for failed devices
pub mod ladder;
pub mod orchestrator;
pub mod settle;

pub use ladder::{
    Applicability, LadderContext, LadderStep, RecoveryLadder, RecoveryStep, StepLog,
};
pub use orchestrator::{
    DeviceCheck, RecoveryAttempt, RecoveryOrchestrator, RecoveryReport, RunSummary,
};
pub use settle::{settle, SettleOutcome};

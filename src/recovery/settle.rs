/// Settle waits after disruptive ladder steps
///
/// A settle wait blocks the single control flow on purpose: no other device may
/// be touched while the daemon or a device is coming back. The wait still ends
/// early on a process interrupt or when the device's recovery deadline passes.
use crate::is_interrupted;
use std::time::Duration;
use tokio::time::Instant;

/// How often a running wait checks the interrupt flag
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Waited the full duration
    Completed,

    /// Cut short by an interrupt
    Interrupted,

    /// Cut short by the recovery deadline
    DeadlineReached,
}

/// Wait `duration`, bounded by `deadline` and the interrupt flag.
///
/// A duration too large to represent as an instant never completes on its own;
/// only the deadline or an interrupt ends it.
pub async fn settle(duration: Duration, deadline: Option<Instant>) -> SettleOutcome {
    let target = Instant::now().checked_add(duration);
    let (end, bounded) = match (target, deadline) {
        (Some(target), Some(deadline)) if deadline < target => (Some(deadline), true),
        (None, Some(deadline)) => (Some(deadline), true),
        (target, _) => (target, false),
    };

    loop {
        if is_interrupted() {
            return SettleOutcome::Interrupted;
        }

        let now = Instant::now();
        let wait = match end {
            Some(end) if now >= end => {
                return if bounded {
                    SettleOutcome::DeadlineReached
                } else {
                    SettleOutcome::Completed
                };
            }
            Some(end) => (end - now).min(POLL_INTERVAL),
            None => POLL_INTERVAL,
        };

        tokio::time::sleep(wait).await;
    }
}

/// Simulated device fleet for testing
///
/// Each simulated device has a condition and, optionally, the ladder action that
/// fixes it. Bridge calls are answered from the current conditions and recorded
/// so tests can assert on exactly what was sent.
use async_trait::async_trait;
use fleet_medic::bridge::{Bridge, ProbeFailure, ProbeResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Condition {
    /// Connected and answering
    Healthy,
    /// Connected but the shell never answers
    Hung,
    Offline,
    Unauthorized,
    /// Not attached to the host at all
    Missing,
}

/// Ladder action that restores a simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Fix {
    HomeKey,
    DaemonRestart,
    Reboot,
}

#[derive(Debug, Clone)]
struct SimDevice {
    condition: Condition,
    fixed_by: Option<Fix>,
    /// Goes offline once this many state queries have been answered
    drops_after: Option<usize>,
    state_queries: usize,
}

#[derive(Default)]
pub struct MockFleet {
    devices: Mutex<HashMap<String, SimDevice>>,
    calls: Mutex<Vec<String>>,
    interrupt_on: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl MockFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device that stays in `condition`
    pub fn with_device(self, id: &str, condition: Condition) -> Self {
        self.insert(id, condition, None);
        self
    }

    /// Add a device in `condition` that comes back once `fix` runs
    pub fn with_fixable(self, id: &str, condition: Condition, fix: Fix) -> Self {
        self.insert(id, condition, Some(fix));
        self
    }

    /// Add a healthy device that drops offline after `checks` state queries
    pub fn with_dropping(self, id: &str, checks: usize) -> Self {
        self.insert(id, Condition::Healthy, None);
        if let Some(device) = self.devices.lock().unwrap().get_mut(id) {
            device.drops_after = Some(checks);
        }
        self
    }

    /// Raise the process interrupt flag when `call` is sent
    pub fn interrupt_on(self, call: &str) -> Self {
        *self.interrupt_on.lock().unwrap() = Some(call.to_string());
        self
    }

    fn insert(&self, id: &str, condition: Condition, fixed_by: Option<Fix>) {
        self.devices.lock().unwrap().insert(
            id.to_string(),
            SimDevice {
                condition,
                fixed_by,
                drops_after: None,
                state_queries: 0,
            },
        );
    }

    fn query_state(&self, id: &str) -> ProbeResult {
        if let Some(device) = self.devices.lock().unwrap().get_mut(id) {
            if device.drops_after == Some(device.state_queries) {
                device.condition = Condition::Offline;
            }
            device.state_queries += 1;
        }
        self.state_of(id)
    }

    pub fn condition(&self, id: &str) -> Option<Condition> {
        self.devices.lock().unwrap().get(id).map(|d| d.condition)
    }

    /// Every call as its space-joined argument vector, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn daemon_restarted(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| c == "kill-server" || c == "start-server")
    }

    fn apply(&self, fix: Fix, device_id: Option<&str>) {
        let mut devices = self.devices.lock().unwrap();
        for (id, device) in devices.iter_mut() {
            let targeted = device_id.map_or(true, |d| d == id);
            if targeted && device.fixed_by == Some(fix) {
                device.condition = Condition::Healthy;
            }
        }
    }

    fn state_of(&self, id: &str) -> ProbeResult {
        match self.condition(id) {
            Some(Condition::Healthy) | Some(Condition::Hung) => ProbeResult::ok("device"),
            Some(Condition::Offline) => failure("error: device offline"),
            Some(Condition::Unauthorized) => failure(
                "error: device unauthorized.\nThis adb server's $ADB_VENDOR_KEYS is not set",
            ),
            Some(Condition::Missing) | None => {
                failure(&format!("error: device '{}' not found", id))
            }
        }
    }

    /// Key events still reach a hung device
    fn home_key(&self, id: &str) -> ProbeResult {
        match self.condition(id) {
            Some(Condition::Healthy) | Some(Condition::Hung) => {
                self.apply(Fix::HomeKey, Some(id));
                ProbeResult::ok("")
            }
            _ => self.state_of(id),
        }
    }

    fn shell(&self, id: &str, command: &[String]) -> ProbeResult {
        match self.condition(id) {
            Some(Condition::Healthy) => {}
            Some(Condition::Hung) => return ProbeResult::timed_out(),
            _ => return self.state_of(id),
        }

        match command.first().map(String::as_str) {
            Some("echo") => ProbeResult::ok(command[1..].join(" ")),
            Some("getprop") => ProbeResult::ok("14"),
            _ => ProbeResult::ok(""),
        }
    }
}

fn failure(stderr: &str) -> ProbeResult {
    ProbeResult::failed(stderr, ProbeFailure::ExitCode(Some(1)))
}

#[async_trait]
impl Bridge for MockFleet {
    async fn execute(&self, args: &[String], _timeout: Duration) -> ProbeResult {
        let call = args.join(" ");
        if self.interrupt_on.lock().unwrap().as_deref() == Some(call.as_str()) {
            fleet_medic::set_interrupted();
        }
        self.calls.lock().unwrap().push(call);

        let (device_id, rest) = match args {
            [flag, id, rest @ ..] if flag == "-s" => (Some(id.as_str()), rest),
            _ => (None, args),
        };

        match (device_id, rest) {
            (None, [cmd]) if cmd == "kill-server" => ProbeResult::ok(""),
            (None, [cmd]) if cmd == "start-server" => {
                self.apply(Fix::DaemonRestart, None);
                ProbeResult::ok("* daemon started successfully")
            }
            (Some(id), [cmd]) if cmd == "get-state" => self.query_state(id),
            (Some(id), [cmd, shell @ ..]) if cmd == "shell" => {
                if shell.iter().any(|a| a == "KEYCODE_HOME") {
                    self.home_key(id)
                } else {
                    self.shell(id, shell)
                }
            }
            (Some(id), [cmd]) if cmd == "reboot" => match self.condition(id) {
                Some(Condition::Missing) | None => self.state_of(id),
                _ => {
                    self.apply(Fix::Reboot, Some(id));
                    ProbeResult::ok("")
                }
            },
            _ => failure("unknown command"),
        }
    }
}

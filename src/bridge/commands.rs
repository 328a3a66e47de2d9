//! Typed bridge commands
//!
//! The control loop only ever issues this fixed set of commands; there is no
//! arbitrary passthrough.

/// Output of the connection-state query for a usable device
pub const CONNECTED_STATE: &str = "device";

/// Marker echoed back by the liveness probe
pub const LIVENESS_MARKER: &str = "ping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// `-s <id> get-state`
    GetState { device_id: String },

    /// `-s <id> shell echo ping`
    Echo { device_id: String },

    /// `-s <id> shell getprop ro.build.version.release`
    OsVersion { device_id: String },

    /// `-s <id> shell input keyevent KEYCODE_HOME`
    HomeKey { device_id: String },

    /// `kill-server` (daemon-wide)
    KillServer,

    /// `start-server` (daemon-wide)
    StartServer,

    /// `-s <id> reboot`
    Reboot { device_id: String },
}

impl BridgeCommand {
    pub fn get_state(device_id: &str) -> Self {
        BridgeCommand::GetState {
            device_id: device_id.to_string(),
        }
    }

    pub fn echo(device_id: &str) -> Self {
        BridgeCommand::Echo {
            device_id: device_id.to_string(),
        }
    }

    pub fn os_version(device_id: &str) -> Self {
        BridgeCommand::OsVersion {
            device_id: device_id.to_string(),
        }
    }

    pub fn home_key(device_id: &str) -> Self {
        BridgeCommand::HomeKey {
            device_id: device_id.to_string(),
        }
    }

    pub fn reboot(device_id: &str) -> Self {
        BridgeCommand::Reboot {
            device_id: device_id.to_string(),
        }
    }

    /// Device this command is scoped to, `None` for daemon-wide commands
    pub fn device_id(&self) -> Option<&str> {
        match self {
            BridgeCommand::GetState { device_id }
            | BridgeCommand::Echo { device_id }
            | BridgeCommand::OsVersion { device_id }
            | BridgeCommand::HomeKey { device_id }
            | BridgeCommand::Reboot { device_id } => Some(device_id),
            BridgeCommand::KillServer | BridgeCommand::StartServer => None,
        }
    }

    /// Whether this command touches the shared daemon and therefore every
    /// connected device
    pub fn is_daemon_wide(&self) -> bool {
        self.device_id().is_none()
    }

    /// Argument vector passed to the bridge program
    pub fn args(&self) -> Vec<String> {
        let tail: &[&str] = match self {
            BridgeCommand::GetState { .. } => &["get-state"],
            BridgeCommand::Echo { .. } => &["shell", "echo", LIVENESS_MARKER],
            BridgeCommand::OsVersion { .. } => &["shell", "getprop", "ro.build.version.release"],
            BridgeCommand::HomeKey { .. } => &["shell", "input", "keyevent", "KEYCODE_HOME"],
            BridgeCommand::KillServer => &["kill-server"],
            BridgeCommand::StartServer => &["start-server"],
            BridgeCommand::Reboot { .. } => &["reboot"],
        };

        let mut args = Vec::with_capacity(tail.len() + 2);
        if let Some(id) = self.device_id() {
            args.push("-s".to_string());
            args.push(id.to_string());
        }
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }
}

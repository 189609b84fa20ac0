//! Runtime configuration.
//!
//! Everything here has a sensible default; the CLI overrides fields from
//! flags and environment variables.

/// Default privilege escalation command.
pub const DEFAULT_SUDO: &str = "sudo";

/// Default loopback interface name.
pub const DEFAULT_LOOPBACK: &str = "lo";

/// Configuration shared by the runner, resolver and executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path or name of the `tc` binary.
    pub tc: String,
    /// Path or name of the `ip` binary.
    pub ip: String,
    /// Command prepended to every invocation (e.g. `["sudo"]`). Empty to disable.
    pub privilege: Vec<String>,
    /// Run every command inside this network namespace (`ip netns exec`).
    pub netns: Option<String>,
    /// Interface used for loopback targets.
    pub loopback: String,
    /// Remove the root qdisc when a later add step fails.
    pub rollback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tc: "tc".to_string(),
            ip: "ip".to_string(),
            privilege: default_privilege(),
            netns: None,
            loopback: DEFAULT_LOOPBACK.to_string(),
            rollback: true,
        }
    }
}

impl Config {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `tc` binary.
    pub fn tc(mut self, tc: impl Into<String>) -> Self {
        self.tc = tc.into();
        self
    }

    /// Set the `ip` binary.
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    /// Set the privilege prefix from a whitespace-separated command.
    pub fn privilege(mut self, cmd: &str) -> Self {
        self.privilege = cmd.split_whitespace().map(str::to_string).collect();
        self
    }

    /// Run commands without any privilege prefix.
    pub fn no_privilege(mut self) -> Self {
        self.privilege.clear();
        self
    }

    /// Run commands inside a named network namespace.
    pub fn netns(mut self, name: impl Into<String>) -> Self {
        self.netns = Some(name.into());
        self
    }

    /// Set the loopback interface name.
    pub fn loopback(mut self, name: impl Into<String>) -> Self {
        self.loopback = name.into();
        self
    }

    /// Enable or disable rollback of partially applied rules.
    pub fn rollback(mut self, enabled: bool) -> Self {
        self.rollback = enabled;
        self
    }
}

/// `sudo` unless we already run as root.
fn default_privilege() -> Vec<String> {
    if is_root() {
        Vec::new()
    } else {
        vec![DEFAULT_SUDO.to_string()]
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

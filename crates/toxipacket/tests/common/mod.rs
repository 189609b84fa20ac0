//! Common test utilities for integration tests.
//!
//! Provides `TestNamespace` for running rules against an isolated network
//! namespace and the `require_root!` macro.

use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

use toxipacket::{Config, Controller, Error, Result, SystemRunner};

/// Global counter for unique namespace names.
static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique namespace name for this test.
fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id();
    format!("toxi-{}-{}-{}", prefix, pid, id)
}

/// A network namespace with a `dummy0` interface on 10.0.0.1/24.
///
/// The namespace is deleted when the struct is dropped.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    /// Create the namespace and its dummy interface.
    pub fn new(prefix: &str) -> Result<Self> {
        let ns = Self {
            name: unique_ns_name(prefix),
        };
        run("ip", &["netns", "add", ns.name.as_str()])?;
        ns.exec("ip", &["link", "add", "dummy0", "type", "dummy"])?;
        ns.exec("ip", &["addr", "add", "10.0.0.1/24", "dev", "dummy0"])?;
        ns.exec("ip", &["link", "set", "dummy0", "up"])?;
        ns.exec("ip", &["link", "set", "lo", "up"])?;
        Ok(ns)
    }

    /// A controller whose commands all run inside this namespace.
    pub fn controller(&self) -> Controller<SystemRunner> {
        Controller::system(Config::new().no_privilege().netns(&self.name))
    }

    /// Run a command in the namespace and return its stdout.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let mut full = vec!["netns", "exec", self.name.as_str(), cmd];
        full.extend_from_slice(args);
        run("ip", &full)
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", self.name.as_str()])
            .status();
    }
}

fn run(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .map_err(|source| Error::Spawn {
            program: cmd.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::command_failed(
            format!("{} {}", cmd, args.join(" ")),
            String::from_utf8_lossy(&output.stderr),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check if running as root.
pub fn is_root() -> bool {
    toxipacket::config::is_root()
}

/// Skip the test if not running as root.
///
/// Use this at the beginning of integration tests that require root privileges.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

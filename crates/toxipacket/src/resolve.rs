//! Outbound interface resolution.
//!
//! Loopback targets map straight to the loopback device. Everything else is
//! looked up with `ip route get`, taking the device named after `dev`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::command::{CommandSpec, Operation, Runner};
use crate::error::{Error, Result};

/// A network interface name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "output", derive(serde::Serialize), serde(transparent))]
pub struct Interface(String);

impl Interface {
    /// Wrap an interface name. The name must not be empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Interface {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map `localhost` to `127.0.0.1`; every other string is returned unchanged.
pub fn normalize(ip: &str) -> &str {
    if ip.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        ip
    }
}

/// Parse a target address, accepting `localhost`.
pub fn parse_ip(ip: &str) -> Result<IpAddr> {
    normalize(ip)
        .parse()
        .map_err(|_| Error::InvalidAddress(ip.to_string()))
}

/// `127.0.0.1` or `::1`.
pub fn is_loopback_literal(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => *v4 == Ipv4Addr::LOCALHOST,
        IpAddr::V6(v6) => *v6 == Ipv6Addr::LOCALHOST,
    }
}

/// Build the `ip route get <addr>` query.
pub fn route_get_command(addr: &IpAddr) -> CommandSpec {
    CommandSpec::new(
        Operation::RouteGet,
        ["route".to_string(), "get".to_string(), addr.to_string()],
    )
}

/// Extract the device following the first `dev` keyword.
///
/// ```text
/// 10.0.0.5 via 192.168.1.1 dev eth0 src 192.168.1.20 uid 1000
///     cache
/// ```
pub fn parse_route_dev(output: &str) -> Option<&str> {
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        while let Some(field) = fields.next() {
            if field == "dev"
                && let Some(dev) = fields.next()
            {
                return Some(dev);
            }
        }
    }
    None
}

/// Resolves target addresses to their outbound interface.
#[derive(Debug)]
pub struct Resolver<'a, R> {
    runner: &'a R,
    loopback: &'a str,
}

impl<'a, R: Runner> Resolver<'a, R> {
    /// Create a resolver using `loopback` as the loopback device name.
    pub fn new(runner: &'a R, loopback: &'a str) -> Self {
        Self { runner, loopback }
    }

    /// Resolve a textual address (or `localhost`).
    ///
    /// Invalid addresses fail before any command runs.
    pub async fn resolve(&self, ip: &str) -> Result<Interface> {
        let addr = parse_ip(ip)?;
        self.resolve_addr(&addr).await
    }

    /// Resolve a parsed address.
    pub async fn resolve_addr(&self, addr: &IpAddr) -> Result<Interface> {
        if is_loopback_literal(addr) {
            if self.loopback.is_empty() {
                return Err(Error::ResolutionFailed {
                    ip: addr.to_string(),
                    reason: "no loopback interface configured".to_string(),
                });
            }
            return Ok(Interface::new(self.loopback));
        }

        let cmd = route_get_command(addr);
        let output = self
            .runner
            .run(&cmd)
            .await
            .map_err(|err| Error::ResolutionFailed {
                ip: addr.to_string(),
                reason: err.to_string(),
            })?;
        if !output.success {
            return Err(Error::ResolutionFailed {
                ip: addr.to_string(),
                reason: output.text.trim().to_string(),
            });
        }

        let dev = parse_route_dev(&output.text).ok_or_else(|| Error::ResolutionFailed {
            ip: addr.to_string(),
            reason: "no dev in route output".to_string(),
        })?;
        tracing::debug!(%addr, dev, "resolved outbound interface");

        Ok(Interface::new(dev))
    }
}

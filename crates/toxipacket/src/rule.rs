//! Loss rule model and compilation into `tc` commands.
//!
//! A rule is three kernel objects hanging off the interface root:
//!
//! ```text
//! 1: prio (root)
//! ├── u32 filter, prio 1: dst <ip> [dport <port>] -> flowid 2:1
//! └── 1:1 ── 2: netem loss <N>%
//! ```
//!
//! They must be created in this order since each references a handle made by
//! the previous one.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::command::{CommandSpec, Operation};
use crate::error::{Error, Result};
use crate::resolve::{Interface, parse_ip};

// ============================================================================
// Handles
// ============================================================================

/// A `major:minor` traffic-control handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    /// Major number (qdisc).
    pub major: u16,
    /// Minor number (class); zero for a qdisc handle.
    pub minor: u16,
}

impl Handle {
    /// Create a handle.
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{:x}:", self.major)
        } else {
            write!(f, "{:x}:{:x}", self.major, self.minor)
        }
    }
}

/// Root `prio` qdisc.
pub const ROOT_HANDLE: Handle = Handle::new(1, 0);
/// First `prio` band, parent of the netem qdisc.
pub const LOSS_PARENT: Handle = Handle::new(1, 1);
/// `netem` qdisc.
pub const NETEM_HANDLE: Handle = Handle::new(2, 0);
/// Flow the filter steers matching packets into.
pub const FLOW_ID: Handle = Handle::new(2, 1);
/// Filter priority.
pub const FILTER_PRIO: u16 = 1;

// ============================================================================
// Target
// ============================================================================

/// Packet loss percentage in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "output", derive(serde::Serialize), serde(transparent))]
pub struct LossPercent(u8);

impl LossPercent {
    /// Validate a loss percentage.
    ///
    /// Values outside `0..=100` are rejected, and so is 0: a rule that drops
    /// nothing is never applied.
    pub fn new(value: i64) -> Result<Self> {
        match u8::try_from(value) {
            Ok(v) if (1..=100).contains(&v) => Ok(Self(v)),
            _ => Err(Error::InvalidLoss(value)),
        }
    }

    /// The percentage as an integer.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for LossPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Traffic to impair: destination address, optional port and loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Destination address.
    pub ip: IpAddr,
    /// Destination port; `None` matches every port.
    pub port: Option<u16>,
    /// Loss to apply.
    pub loss: LossPercent,
}

impl Target {
    /// Validate user input into a target.
    ///
    /// `localhost` becomes `127.0.0.1` and a port of 0 means "any port".
    pub fn new(ip: &str, port: Option<u16>, loss: i64) -> Result<Self> {
        let loss = LossPercent::new(loss)?;
        let ip = parse_ip(ip)?;
        Ok(Self {
            ip,
            port: port.filter(|p| *p > 0),
            loss,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_destination(f, self.ip, self.port)
    }
}

/// Write `ip` or `ip:port`; IPv6 addresses are bracketed when a port follows.
pub(crate) fn write_destination(
    f: &mut fmt::Formatter<'_>,
    ip: IpAddr,
    port: Option<u16>,
) -> fmt::Result {
    match port {
        Some(port) => write!(f, "{}", SocketAddr::new(ip, port)),
        None => write!(f, "{}", ip),
    }
}

// ============================================================================
// Rule graph
// ============================================================================

/// The three ordered commands that install a loss rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGraph {
    /// Root `prio` qdisc creation.
    pub root: CommandSpec,
    /// `u32` classifier creation.
    pub filter: CommandSpec,
    /// `netem` qdisc creation.
    pub netem: CommandSpec,
}

impl RuleGraph {
    /// Compile a target on an interface into its commands.
    pub fn compile(interface: &Interface, target: &Target) -> Self {
        Self {
            root: root_qdisc_command(interface),
            filter: filter_command(interface, target.ip, target.port),
            netem: netem_command(interface, target.loss),
        }
    }

    /// Commands in execution order.
    pub fn steps(&self) -> [&CommandSpec; 3] {
        [&self.root, &self.filter, &self.netem]
    }
}

/// `tc qdisc add dev <if> root handle 1: prio`
pub fn root_qdisc_command(interface: &Interface) -> CommandSpec {
    CommandSpec::new(
        Operation::AddRootQdisc,
        [
            "qdisc".to_string(),
            "add".to_string(),
            "dev".to_string(),
            interface.to_string(),
            "root".to_string(),
            "handle".to_string(),
            ROOT_HANDLE.to_string(),
            "prio".to_string(),
        ],
    )
}

/// `tc filter add dev <if> protocol ip parent 1: prio 1 u32 match ... flowid 2:1`
///
/// IPv6 destinations use `protocol ipv6` and the `ip6` selectors.
pub fn filter_command(interface: &Interface, ip: IpAddr, port: Option<u16>) -> CommandSpec {
    let (protocol, selector) = match ip {
        IpAddr::V4(_) => ("ip", "ip"),
        IpAddr::V6(_) => ("ipv6", "ip6"),
    };

    let mut args = vec![
        "filter".to_string(),
        "add".to_string(),
        "dev".to_string(),
        interface.to_string(),
        "protocol".to_string(),
        protocol.to_string(),
        "parent".to_string(),
        ROOT_HANDLE.to_string(),
        "prio".to_string(),
        FILTER_PRIO.to_string(),
        "u32".to_string(),
        "match".to_string(),
        selector.to_string(),
        "dst".to_string(),
        ip.to_string(),
    ];
    if let Some(port) = port.filter(|p| *p > 0) {
        args.extend([
            "match".to_string(),
            selector.to_string(),
            "dport".to_string(),
            port.to_string(),
            "0xffff".to_string(),
        ]);
    }
    args.extend(["flowid".to_string(), FLOW_ID.to_string()]);

    CommandSpec::new(Operation::AddFilter, args)
}

/// `tc qdisc add dev <if> parent 1:1 handle 2: netem loss <N>%`
pub fn netem_command(interface: &Interface, loss: LossPercent) -> CommandSpec {
    CommandSpec::new(
        Operation::AddNetem,
        [
            "qdisc".to_string(),
            "add".to_string(),
            "dev".to_string(),
            interface.to_string(),
            "parent".to_string(),
            LOSS_PARENT.to_string(),
            "handle".to_string(),
            NETEM_HANDLE.to_string(),
            "netem".to_string(),
            "loss".to_string(),
            loss.to_string(),
        ],
    )
}

/// `tc qdisc del dev <if> root`
pub fn remove_command(interface: &Interface) -> CommandSpec {
    CommandSpec::new(
        Operation::DeleteRootQdisc,
        [
            "qdisc".to_string(),
            "del".to_string(),
            "dev".to_string(),
            interface.to_string(),
            "root".to_string(),
        ],
    )
}

/// `tc qdisc show dev <if>`
pub fn show_command(interface: &Interface) -> CommandSpec {
    CommandSpec::new(
        Operation::ShowQdisc,
        [
            "qdisc".to_string(),
            "show".to_string(),
            "dev".to_string(),
            interface.to_string(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth0() -> Interface {
        Interface::new("eth0")
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(ROOT_HANDLE.to_string(), "1:");
        assert_eq!(LOSS_PARENT.to_string(), "1:1");
        assert_eq!(NETEM_HANDLE.to_string(), "2:");
        assert_eq!(FLOW_ID.to_string(), "2:1");
        assert_eq!(Handle::new(0xffff, 0).to_string(), "ffff:");
    }

    #[test]
    fn test_loss_range() {
        for value in [1, 37, 100] {
            assert_eq!(LossPercent::new(value).unwrap().get() as i64, value);
        }
        for value in [-1, 0, 101, 256, i64::MAX] {
            assert!(matches!(
                LossPercent::new(value),
                Err(Error::InvalidLoss(v)) if v == value
            ));
        }
        assert_eq!(LossPercent::new(37).unwrap().to_string(), "37%");
    }

    #[test]
    fn test_target_normalization() {
        let target = Target::new("localhost", Some(0), 5).unwrap();
        assert_eq!(target.ip.to_string(), "127.0.0.1");
        assert_eq!(target.port, None);
        assert_eq!(target.to_string(), "127.0.0.1");

        let target = Target::new("10.0.0.5", Some(8080), 5).unwrap();
        assert_eq!(target.to_string(), "10.0.0.5:8080");
    }

    #[test]
    fn test_target_display_ipv6() {
        let target = Target::new("2001:db8::5", Some(443), 5).unwrap();
        assert_eq!(target.to_string(), "[2001:db8::5]:443");
        let target = Target::new("2001:db8::5", None, 5).unwrap();
        assert_eq!(target.to_string(), "2001:db8::5");
    }

    #[test]
    fn test_target_checks_loss_first() {
        assert!(matches!(
            Target::new("bogus", None, 200),
            Err(Error::InvalidLoss(200))
        ));
        assert!(matches!(
            Target::new("bogus", None, 20),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_compile_with_port() {
        let target = Target::new("10.0.0.5", Some(8080), 25).unwrap();
        let graph = RuleGraph::compile(&eth0(), &target);

        assert_eq!(
            graph.root.to_string(),
            "tc qdisc add dev eth0 root handle 1: prio"
        );
        assert_eq!(
            graph.filter.to_string(),
            "tc filter add dev eth0 protocol ip parent 1: prio 1 u32 \
             match ip dst 10.0.0.5 match ip dport 8080 0xffff flowid 2:1"
        );
        assert_eq!(
            graph.netem.to_string(),
            "tc qdisc add dev eth0 parent 1:1 handle 2: netem loss 25%"
        );
    }

    #[test]
    fn test_compile_without_port() {
        let target = Target::new("10.0.0.5", None, 10).unwrap();
        let graph = RuleGraph::compile(&eth0(), &target);

        assert!(!graph.filter.has_arg("dport"));
        assert!(!graph.filter.has_arg("0xffff"));
        assert_eq!(
            graph.filter.to_string(),
            "tc filter add dev eth0 protocol ip parent 1: prio 1 u32 \
             match ip dst 10.0.0.5 flowid 2:1"
        );
        assert!(graph.netem.has_arg("10%"));
    }

    #[test]
    fn test_compile_every_loss() {
        for loss in 1..=100 {
            let target = Target::new("192.0.2.1", None, loss).unwrap();
            let graph = RuleGraph::compile(&eth0(), &target);
            let steps = graph.steps();
            assert_eq!(steps.len(), 3);
            assert_eq!(steps[0].operation, Operation::AddRootQdisc);
            assert_eq!(steps[1].operation, Operation::AddFilter);
            assert_eq!(steps[2].operation, Operation::AddNetem);
            assert_eq!(steps[2].args.last(), Some(&format!("{loss}%")));
        }
    }

    #[test]
    fn test_compile_ipv6() {
        let target = Target::new("2001:db8::5", Some(443), 50).unwrap();
        let graph = RuleGraph::compile(&eth0(), &target);
        assert_eq!(
            graph.filter.to_string(),
            "tc filter add dev eth0 protocol ipv6 parent 1: prio 1 u32 \
             match ip6 dst 2001:db8::5 match ip6 dport 443 0xffff flowid 2:1"
        );
    }

    #[test]
    fn test_remove_and_show() {
        assert_eq!(
            remove_command(&eth0()).to_string(),
            "tc qdisc del dev eth0 root"
        );
        assert_eq!(show_command(&eth0()).to_string(), "tc qdisc show dev eth0");
    }
}

//! Add / remove / show orchestration.
//!
//! Each operation resolves the interface once and stops there if resolution
//! fails; no `tc` command runs for an unresolvable target.

use std::fmt;
use std::net::IpAddr;

use crate::command::{Runner, SystemRunner};
use crate::config::Config;
use crate::error::Result;
use crate::executor::Executor;
use crate::inspect::{QdiscSummary, inspect, parse_qdiscs};
use crate::resolve::{Interface, Resolver, parse_ip};
use crate::rule::{LossPercent, RuleGraph, Target, write_destination};

/// A rule that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Applied {
    /// Destination address.
    pub ip: IpAddr,
    /// Destination port, if the rule is port-specific.
    pub port: Option<u16>,
    /// Applied loss.
    pub loss: LossPercent,
    /// Interface carrying the rule.
    pub interface: Interface,
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Applied {} packet loss to ", self.loss)?;
        write_destination(f, self.ip, self.port)?;
        write!(f, " on interface {}", self.interface)
    }
}

/// Rules that were removed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Removed {
    /// Address the removal was requested for.
    pub ip: IpAddr,
    /// Interface the rules were removed from.
    pub interface: Interface,
}

impl fmt::Display for Removed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Removed rules from interface {}", self.interface)
    }
}

/// Active qdiscs on an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Shown {
    /// Interface that was inspected.
    pub interface: Interface,
    /// Raw `tc qdisc show` output.
    pub output: String,
}

impl Shown {
    /// Structured view of [`Shown::output`].
    pub fn qdiscs(&self) -> Vec<QdiscSummary> {
        parse_qdiscs(&self.output)
    }
}

impl fmt::Display for Shown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output)
    }
}

/// Drives the rule lifecycle for one operation at a time.
#[derive(Debug)]
pub struct Controller<R> {
    runner: R,
    config: Config,
}

impl Controller<SystemRunner> {
    /// Controller that runs real commands.
    pub fn system(config: Config) -> Self {
        Self::new(SystemRunner::new(config.clone()), config)
    }
}

impl<R: Runner> Controller<R> {
    /// Create a controller over any runner.
    pub fn new(runner: R, config: Config) -> Self {
        Self { runner, config }
    }

    /// The runner in use.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Validate input and apply a loss rule.
    ///
    /// Invalid loss or address fails before any command runs.
    pub async fn add(&self, ip: &str, port: Option<u16>, loss: i64) -> Result<Applied> {
        let target = Target::new(ip, port, loss)?;
        self.apply(&target).await
    }

    /// Apply a loss rule for an already validated target.
    pub async fn apply(&self, target: &Target) -> Result<Applied> {
        let interface = self.resolver().resolve_addr(&target.ip).await?;
        let graph = RuleGraph::compile(&interface, target);

        tracing::debug!(%target, loss = %target.loss, %interface, "applying rule");
        self.executor().apply(&interface, &graph).await?;

        Ok(Applied {
            ip: target.ip,
            port: target.port,
            loss: target.loss,
            interface,
        })
    }

    /// Remove the rule on the interface that routes to `ip`.
    pub async fn remove(&self, ip: &str) -> Result<Removed> {
        let addr = parse_ip(ip)?;
        let interface = self.resolver().resolve_addr(&addr).await?;

        tracing::debug!(%addr, %interface, "removing rules");
        self.executor().remove(&interface).await?;

        Ok(Removed {
            ip: addr,
            interface,
        })
    }

    /// Show active qdiscs on the interface that routes to `ip`.
    pub async fn show(&self, ip: &str) -> Result<Shown> {
        let interface = self.resolver().resolve(ip).await?;
        let output = inspect(&self.runner, &interface).await?;
        Ok(Shown { interface, output })
    }

    fn resolver(&self) -> Resolver<'_, R> {
        Resolver::new(&self.runner, &self.config.loopback)
    }

    fn executor(&self) -> Executor<'_, R> {
        Executor::new(&self.runner, self.config.rollback)
    }
}

//! Inspection of active qdiscs.

use crate::command::{Runner, run_command};
use crate::error::Result;
use crate::resolve::Interface;
use crate::rule::show_command;

/// Return `tc qdisc show dev <if>` output verbatim.
pub async fn inspect<R: Runner>(runner: &R, interface: &Interface) -> Result<String> {
    let cmd = show_command(interface);
    run_command(runner, &cmd).await?.into_result(&cmd)
}

/// One line of `tc qdisc show` output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct QdiscSummary {
    /// Qdisc kind (`prio`, `netem`, `noqueue`, ...).
    pub kind: String,
    /// Handle as printed, e.g. `1:`.
    pub handle: String,
    /// Parent handle; `None` for the root qdisc.
    pub parent: Option<String>,
    /// Netem loss parameter as printed, e.g. `25%`.
    pub loss: Option<String>,
}

impl QdiscSummary {
    /// Check if this qdisc is attached at the interface root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Best-effort parse of `tc qdisc show` output.
///
/// Lines that do not start with `qdisc <kind> <handle>` are skipped.
pub fn parse_qdiscs(output: &str) -> Vec<QdiscSummary> {
    output.lines().filter_map(parse_qdisc_line).collect()
}

fn parse_qdisc_line(line: &str) -> Option<QdiscSummary> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "qdisc" {
        return None;
    }
    let kind = fields.next()?.to_string();
    let handle = fields.next()?.to_string();

    let mut parent = None;
    let mut loss = None;
    while let Some(field) = fields.next() {
        match field {
            "parent" => parent = fields.next().map(str::to_string),
            "loss" => loss = fields.next().map(str::to_string),
            _ => {}
        }
    }

    Some(QdiscSummary {
        kind,
        handle,
        parent,
        loss,
    })
}

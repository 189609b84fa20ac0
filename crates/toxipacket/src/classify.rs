//! Classification of known `tc` failure messages.
//!
//! iproute2 reports the interesting failures only as text. All matching on
//! that text lives in [`KNOWN_FAILURES`] so call sites never look at raw
//! output themselves.

use crate::command::{Operation, Output};

/// A recognized failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A root qdisc is already installed on the device.
    AlreadyExists,
    /// There is no root qdisc to delete.
    NoRulesToRemove,
}

/// (operation, output prefix, failure) entries.
///
/// Newer iproute2 prints extended ack messages, older releases print the
/// `RTNETLINK answers` form.
pub const KNOWN_FAILURES: &[(Operation, &str, Failure)] = &[
    (
        Operation::AddRootQdisc,
        "Error: Exclusivity flag on, cannot modify",
        Failure::AlreadyExists,
    ),
    (
        Operation::AddRootQdisc,
        "RTNETLINK answers: File exists",
        Failure::AlreadyExists,
    ),
    (
        Operation::DeleteRootQdisc,
        "Error: Cannot delete qdisc with handle of zero",
        Failure::NoRulesToRemove,
    ),
    (
        Operation::DeleteRootQdisc,
        "RTNETLINK answers: No such file or directory",
        Failure::NoRulesToRemove,
    ),
];

/// Classify the output of a failed command.
///
/// Returns `None` for successful output and for failures not in the table.
pub fn classify(operation: Operation, output: &Output) -> Option<Failure> {
    if output.success {
        return None;
    }
    let text = output.text.trim_start();
    KNOWN_FAILURES
        .iter()
        .find(|(op, prefix, _)| *op == operation && text.starts_with(prefix))
        .map(|(_, _, failure)| *failure)
}

//! Rule execution against live traffic-control state.

use crate::classify::{Failure, classify};
use crate::command::{CommandSpec, Runner, run_command};
use crate::error::{Error, Result};
use crate::resolve::Interface;
use crate::rule::{RuleGraph, remove_command};

/// Applies and removes rule graphs through a [`Runner`].
#[derive(Debug)]
pub struct Executor<'a, R> {
    runner: &'a R,
    rollback: bool,
}

impl<'a, R: Runner> Executor<'a, R> {
    /// Create an executor. With `rollback`, a partially applied graph is
    /// torn down before the failure is returned.
    pub fn new(runner: &'a R, rollback: bool) -> Self {
        Self { runner, rollback }
    }

    /// Install a rule graph on an interface.
    ///
    /// An existing root qdisc stops the sequence at the first command with
    /// [`Error::AlreadyExists`].
    pub async fn apply(&self, interface: &Interface, graph: &RuleGraph) -> Result<()> {
        let output = run_command(self.runner, &graph.root).await?;
        if !output.success {
            return Err(match classify(graph.root.operation, &output) {
                Some(Failure::AlreadyExists) => Error::AlreadyExists {
                    interface: interface.to_string(),
                },
                _ => Error::command_failed(graph.root.to_string(), output.text),
            });
        }

        for step in [&graph.filter, &graph.netem] {
            if let Err(err) = self.run_checked(step).await {
                return Err(self.roll_back(interface, err).await);
            }
        }

        Ok(())
    }

    /// Delete the root qdisc, and with it the whole rule.
    pub async fn remove(&self, interface: &Interface) -> Result<()> {
        let cmd = remove_command(interface);
        let output = run_command(self.runner, &cmd).await?;
        if output.success {
            return Ok(());
        }
        Err(match classify(cmd.operation, &output) {
            Some(Failure::NoRulesToRemove) => Error::NoRulesToRemove {
                interface: interface.to_string(),
            },
            _ => Error::command_failed(cmd.to_string(), output.text),
        })
    }

    async fn run_checked(&self, cmd: &CommandSpec) -> Result<()> {
        run_command(self.runner, cmd).await?.into_result(cmd).map(|_| ())
    }

    /// Best-effort removal of the root qdisc after a later step failed.
    ///
    /// Returns the error to report: the original one, or [`Error::RollbackFailed`]
    /// when the cleanup itself fails.
    async fn roll_back(&self, interface: &Interface, err: Error) -> Error {
        if !self.rollback {
            tracing::warn!(%interface, "rule partially applied, rollback disabled");
            return err;
        }

        let cleanup = remove_command(interface);
        tracing::warn!(%interface, error = %err, "rule partially applied, removing root qdisc");

        let cleanup_output = match self.runner.run(&cleanup).await {
            Ok(output) if output.success => return err,
            Ok(output) => output.text,
            Err(run_err) => run_err.to_string(),
        };

        Error::RollbackFailed {
            source: Box::new(err),
            cleanup: cleanup.to_string(),
            cleanup_output,
        }
    }
}

//! External command execution.
//!
//! Every interaction with kernel state goes through a [`Runner`]: the rule
//! executor, the inspector and the interface resolver only ever hand it a
//! [`CommandSpec`] and look at the [`Output`] that comes back. Tests swap in
//! a fake runner that records invocations and returns scripted output.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::Config;
use crate::error::{Error, Result};

/// External program a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// iproute2 `tc`.
    Tc,
    /// iproute2 `ip`.
    Ip,
}

impl Tool {
    /// Default program name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tc => "tc",
            Self::Ip => "ip",
        }
    }
}

/// The operation a command performs, used to classify its failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `ip route get <addr>`
    RouteGet,
    /// Root `prio` qdisc creation.
    AddRootQdisc,
    /// `u32` classifier creation.
    AddFilter,
    /// `netem` qdisc creation.
    AddNetem,
    /// Root qdisc deletion.
    DeleteRootQdisc,
    /// `tc qdisc show dev <if>`
    ShowQdisc,
}

impl Operation {
    /// The program that performs this operation.
    pub fn tool(self) -> Tool {
        match self {
            Self::RouteGet => Tool::Ip,
            _ => Tool::Tc,
        }
    }
}

/// A single command to run: the operation plus its argument vector.
///
/// Arguments never go through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// What the command does.
    pub operation: Operation,
    /// Arguments after the program name.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command from an operation and arguments.
    pub fn new<I, S>(operation: Operation, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The program this command is addressed to.
    pub fn tool(&self) -> Tool {
        self.operation.tool()
    }

    #[cfg(test)]
    pub(crate) fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool().name())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Exit status was zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Stdout followed by stderr.
    pub text: String,
}

impl Output {
    #[cfg(test)]
    pub(crate) fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            text: text.into(),
        }
    }

    /// Exit code 2, as iproute2 uses.
    #[cfg(test)]
    pub(crate) fn failed(text: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(2),
            text: text.into(),
        }
    }

    /// Turn a failed output into [`Error::CommandFailed`].
    pub fn into_result(self, cmd: &CommandSpec) -> Result<String> {
        if self.success {
            Ok(self.text)
        } else {
            Err(Error::command_failed(cmd.to_string(), self.text))
        }
    }
}

impl From<std::process::Output> for Output {
    fn from(value: std::process::Output) -> Self {
        let mut text = String::from_utf8_lossy(&value.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&value.stderr));
        Self {
            success: value.status.success(),
            code: value.status.code(),
            text,
        }
    }
}

/// Capability to run external commands.
///
/// Implementations block the operation until the command exits; there is no
/// timeout or retry.
#[allow(async_fn_in_trait)]
pub trait Runner {
    /// Run a command and capture its combined output and exit status.
    ///
    /// A non-zero exit is not an error at this level; only failing to start
    /// the program is.
    async fn run(&self, cmd: &CommandSpec) -> Result<Output>;
}

/// Run a tc command through `runner`.
///
/// A program that cannot be started is reported as a failure of the
/// command itself.
pub(crate) async fn run_command<R: Runner>(runner: &R, cmd: &CommandSpec) -> Result<Output> {
    runner.run(cmd).await.map_err(|err| match err {
        err @ Error::Spawn { .. } => Error::command_failed(cmd.to_string(), err.to_string()),
        err => err,
    })
}

/// Runs commands as real subprocesses.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    config: Config,
}

impl SystemRunner {
    /// Create a runner from configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Full argument vector: privilege prefix, namespace prefix, program, args.
    pub fn argv(&self, cmd: &CommandSpec) -> Vec<String> {
        let mut argv = self.config.privilege.clone();
        if let Some(ref ns) = self.config.netns {
            argv.extend([
                self.config.ip.clone(),
                "netns".to_string(),
                "exec".to_string(),
                ns.clone(),
            ]);
        }
        argv.push(match cmd.tool() {
            Tool::Tc => self.config.tc.clone(),
            Tool::Ip => self.config.ip.clone(),
        });
        argv.extend(cmd.args.iter().cloned());
        argv
    }
}

impl Runner for SystemRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<Output> {
        let argv = self.argv(cmd);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::command_failed(cmd.to_string(), "empty command"))?;

        tracing::debug!(command = ?argv, "running command");

        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: program.clone(),
                source,
            })?;
        let output = Output::from(output);

        if !output.success {
            tracing::debug!(
                code = ?output.code,
                output = %output.text.trim_end(),
                command = %cmd,
                "command returned non-zero status"
            );
        }

        Ok(output)
    }
}

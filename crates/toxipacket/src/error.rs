//! Error types for rule operations.

use std::io;

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, applying, removing or showing rules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target is not a well-formed IPv4 or IPv6 address.
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Loss percentage outside the accepted range.
    #[error("loss needs to be in range 1-100, got {0}")]
    InvalidLoss(i64),

    /// The routing lookup failed or did not name an outbound device.
    #[error("could not determine interface for IP {ip}: {reason}")]
    ResolutionFailed {
        /// The address being resolved.
        ip: String,
        /// Route query diagnostic.
        reason: String,
    },

    /// A root qdisc already exists on the interface.
    #[error("a rule for this ip already exists on interface {interface}")]
    AlreadyExists {
        /// The interface holding the existing rule.
        interface: String,
    },

    /// Remove was requested on an interface without a root qdisc.
    #[error("no rules to remove on interface {interface}")]
    NoRulesToRemove {
        /// The interface that was inspected.
        interface: String,
    },

    /// An external command exited with a non-zero status.
    #[error("`{command}` failed: {output}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Combined stdout and stderr, verbatim.
        output: String,
    },

    /// A partial add failed and removing the root qdisc afterwards failed too.
    ///
    /// The interface is left partially configured.
    #[error("{source}; cleanup `{cleanup}` also failed: {cleanup_output}")]
    RollbackFailed {
        /// The failure that triggered the rollback.
        #[source]
        source: Box<Error>,
        /// The cleanup command line.
        cleanup: String,
        /// Combined output of the cleanup command.
        cleanup_output: String,
    },

    /// The program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create a command failure from a command line and its output.
    pub fn command_failed(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Check if this is an "already exists" error.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is a "nothing to remove" error.
    pub fn is_no_rules(&self) -> bool {
        matches!(self, Self::NoRulesToRemove { .. })
    }

    /// Check if an external command reported the failure.
    pub fn is_command_failed(&self) -> bool {
        match self {
            Self::CommandFailed { .. } => true,
            Self::RollbackFailed { source, .. } => source.is_command_failed(),
            _ => false,
        }
    }
}

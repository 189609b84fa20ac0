//! Targeted packet-loss rules on Linux traffic control.
//!
//! Installs, inspects and removes a `netem` loss rule that only affects
//! traffic to one destination address (and optionally one port), on the
//! interface that traffic leaves through. The kernel configuration is driven
//! by the iproute2 `tc` and `ip` tools; their live state is the only state.
//!
//! # Features
//!
//! - `output` - `serde::Serialize` on report types
//!
//! # Example
//!
//! ```ignore
//! use toxipacket::{Config, Controller};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> toxipacket::Result<()> {
//!     let ctl = Controller::system(Config::default());
//!
//!     // Drop 25% of packets to 10.0.0.5:8080
//!     let applied = ctl.add("10.0.0.5", Some(8080), 25).await?;
//!     println!("{applied}");
//!
//!     print!("{}", ctl.show("10.0.0.5").await?);
//!
//!     ctl.remove("10.0.0.5").await?;
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod inspect;
pub mod resolve;
pub mod rule;

pub use command::{CommandSpec, Operation, Output, Runner, SystemRunner};
pub use config::Config;
pub use controller::{Applied, Controller, Removed, Shown};
pub use error::{Error, Result};
pub use inspect::QdiscSummary;
pub use resolve::Interface;
pub use rule::{LossPercent, RuleGraph, Target};

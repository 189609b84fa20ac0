//! toxipacket - targeted packet loss for testing.
//!
//! Applies, shows and removes a netem loss rule for one destination.

mod legacy;
mod output;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use toxipacket::{Config, Controller, SystemRunner};

/// Subcommand names; any of these on the command line selects the
/// subcommand interface over the legacy flags.
const SUBCOMMANDS: &[&str] = &["add", "remove", "rm", "show", "help"];

/// Options of either interface that take a separate value.
const VALUE_OPTIONS: &[&str] = &[
    "--sudo-cmd",
    "--tc-bin",
    "--ip-bin",
    "--netns",
    "--loopback",
    "--ip",
    "-ip",
    "-p",
    "--port",
    "-l",
    "--loss",
    "-loss",
];

#[derive(Parser)]
#[command(name = "toxipacket")]
#[command(about = "Targeted packet loss via traffic control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by the subcommand and legacy interfaces.
#[derive(Args, Debug, Clone)]
struct GlobalOpts {
    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Log every command that is run.
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Run tc and ip without a privilege prefix.
    #[arg(long, global = true, env = "TOXIPACKET_NO_SUDO", value_parser = FalseyValueParser::new())]
    no_sudo: bool,

    /// Privilege prefix command (default: sudo, none when running as root).
    #[arg(long, global = true, env = "TOXIPACKET_SUDO", value_name = "CMD")]
    sudo_cmd: Option<String>,

    /// tc binary.
    #[arg(long, global = true, env = "TOXIPACKET_TC", default_value = "tc", value_name = "PATH")]
    tc_bin: String,

    /// ip binary.
    #[arg(long, global = true, env = "TOXIPACKET_IP", default_value = "ip", value_name = "PATH")]
    ip_bin: String,

    /// Run inside a named network namespace.
    #[arg(long, global = true, env = "TOXIPACKET_NETNS", value_name = "NAME")]
    netns: Option<String>,

    /// Loopback interface name.
    #[arg(long, global = true, default_value = toxipacket::config::DEFAULT_LOOPBACK)]
    loopback: String,

    /// Leave a partially applied rule in place instead of removing it.
    #[arg(long, global = true)]
    no_rollback: bool,
}

impl GlobalOpts {
    fn config(&self) -> Config {
        let mut config = Config::new()
            .tc(&self.tc_bin)
            .ip(&self.ip_bin)
            .loopback(&self.loopback)
            .rollback(!self.no_rollback);
        if let Some(ref cmd) = self.sudo_cmd {
            config = config.privilege(cmd);
        }
        if self.no_sudo {
            config = config.no_privilege();
        }
        if let Some(ref ns) = self.netns {
            config = config.netns(ns);
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply packet loss to traffic towards an address.
    Add(AddArgs),

    /// Remove rules from the interface routing to an address.
    #[command(visible_alias = "rm")]
    Remove(TargetArgs),

    /// Show active qdiscs on the interface routing to an address.
    Show(TargetArgs),
}

#[derive(Args)]
struct AddArgs {
    /// Target IP address.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Destination port to match (all ports if omitted).
    #[arg(short, long)]
    port: Option<u16>,

    /// Packet loss percentage (1-100).
    #[arg(short, long, allow_negative_numbers = true)]
    loss: i64,
}

#[derive(Args)]
struct TargetArgs {
    /// Target IP address.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
}

/// A resolved request, from either interface.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Add {
        ip: String,
        port: Option<u16>,
        loss: i64,
    },
    Remove {
        ip: String,
    },
    Show {
        ip: String,
    },
}

impl From<Command> for Action {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Add(args) => Action::Add {
                ip: args.ip,
                port: args.port,
                loss: args.loss,
            },
            Command::Remove(args) => Action::Remove { ip: args.ip },
            Command::Show(args) => Action::Show { ip: args.ip },
        }
    }
}

/// True when the arguments use the subcommand interface: the first
/// positional argument names a subcommand, or help/version is requested
/// before it.
fn uses_subcommands(args: &[String]) -> bool {
    let mut args = args.iter().skip(1).map(String::as_str);
    while let Some(arg) = args.next() {
        match arg {
            "-h" | "--help" | "-V" | "--version" => return true,
            _ if VALUE_OPTIONS.contains(&arg) => {
                args.next();
            }
            _ if arg.starts_with('-') => {}
            _ => return SUBCOMMANDS.contains(&arg),
        }
    }
    false
}

fn parse_args(args: Vec<String>) -> (GlobalOpts, Action) {
    if uses_subcommands(&args) {
        let cli = Cli::try_parse_from(args).unwrap_or_else(|e| exit_with(e));
        (cli.global, cli.command.into())
    } else {
        legacy::parse(args)
    }
}

/// Print a clap error (or help) and exit: 0 for help/version, 1 otherwise.
fn exit_with(err: clap::Error) -> ! {
    let _ = err.print();
    std::process::exit(if err.use_stderr() { 1 } else { 0 })
}

async fn run(ctl: &Controller<SystemRunner>, action: Action, json: bool) -> anyhow::Result<()> {
    match action {
        Action::Add { ip, port, loss } => {
            let applied = ctl.add(&ip, port, loss).await?;
            output::print_report(&applied, json)
        }
        Action::Remove { ip } => {
            let removed = ctl.remove(&ip).await?;
            output::print_report(&removed, json)
        }
        Action::Show { ip } => {
            let shown = ctl.show(&ip).await?;
            output::print_shown(&shown, json)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (global, action) = parse_args(std::env::args().collect());

    // Initialize tracing
    let level = if global.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctl = Controller::system(global.config());

    if let Err(e) = run(&ctl, action, global.json).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

//! Flag-only interface kept for older scripts.
//!
//! `toxipacket -ip 10.0.0.5 -p 8080 -loss 25`, `-remove`, `-show`. Long
//! flags are accepted with one or two dashes and in `-flag=value` form.

use clap::{CommandFactory, Parser};

use crate::{Action, GlobalOpts, exit_with};

/// Legacy long flags that may be written with a single dash.
const SINGLE_DASH_FLAGS: &[&str] = &["ip", "remove", "loss", "show", "port"];

#[derive(Parser, Debug)]
#[command(name = "toxipacket")]
#[command(override_usage = "toxipacket -ip <ADDRESS> [-p <PORT>] (-loss <PERCENT> | -remove | -show)")]
#[command(about = "Targeted packet loss via traffic control", long_about = None)]
struct LegacyCli {
    #[command(flatten)]
    global: GlobalOpts,

    /// Target ip.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Port to apply rules to.
    #[arg(short = 'p', long, default_value_t = 0)]
    port: u16,

    /// Remove rules for ip.
    #[arg(long)]
    remove: bool,

    /// Packet loss percentage.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    loss: i64,

    /// Show active rules.
    #[arg(long)]
    show: bool,
}

/// Rewrite `-ip`/`-loss`/... into the double-dash form clap expects.
pub fn normalize(args: Vec<String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            if rest.starts_with('-') {
                return arg;
            }
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_FLAGS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

/// Parse legacy flags into an action.
///
/// Exits with status 1 and usage when no action is requested, or when the
/// loss is outside 0-100.
pub fn parse(args: Vec<String>) -> (GlobalOpts, Action) {
    let cli = LegacyCli::try_parse_from(normalize(args)).unwrap_or_else(|e| exit_with(e));
    match into_action(&cli) {
        Ok(action) => (cli.global, action),
        Err(Usage::Missing) => {
            println!("{}", LegacyCli::command().render_help());
            std::process::exit(1);
        }
        Err(Usage::LossRange) => {
            eprintln!("Error: loss needs to be in range 0-100");
            std::process::exit(1);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Usage {
    Missing,
    LossRange,
}

fn into_action(cli: &LegacyCli) -> Result<Action, Usage> {
    if !cli.remove && cli.loss == 0 && !cli.show {
        return Err(Usage::Missing);
    }
    if !(0..=100).contains(&cli.loss) {
        return Err(Usage::LossRange);
    }

    let ip = cli.ip.clone();
    Ok(if cli.show {
        Action::Show { ip }
    } else if cli.remove {
        Action::Remove { ip }
    } else {
        Action::Add {
            ip,
            port: Some(cli.port).filter(|p| *p > 0),
            loss: cli.loss,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(list: &[&str]) -> Result<Action, Usage> {
        let args = list.iter().map(|s| s.to_string()).collect();
        let cli = LegacyCli::try_parse_from(normalize(args)).unwrap();
        into_action(&cli)
    }

    #[test]
    fn test_cli_definition() {
        LegacyCli::command().debug_assert();
    }

    #[test]
    fn test_value_options_cover_legacy_flags() {
        let cmd = LegacyCli::command();
        for arg in cmd.get_arguments() {
            if !arg.get_action().takes_values() {
                continue;
            }
            let mut flags: Vec<String> = arg
                .get_short()
                .map(|c| format!("-{}", c))
                .into_iter()
                .collect();
            if let Some(long) = arg.get_long() {
                flags.push(format!("--{}", long));
                if SINGLE_DASH_FLAGS.contains(&long) {
                    flags.push(format!("-{}", long));
                }
            }
            for flag in flags {
                assert!(crate::VALUE_OPTIONS.contains(&flag.as_str()), "{flag}");
            }
        }
    }

    #[test]
    fn test_normalize() {
        let args = ["t", "-ip", "10.0.0.5", "-loss=5", "-p", "80", "--show", "-j"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            normalize(args),
            vec!["t", "--ip", "10.0.0.5", "--loss=5", "-p", "80", "--show", "-j"]
        );
    }

    #[test]
    fn test_apply() {
        assert_eq!(
            parse_ok(&["t", "-ip", "10.0.0.5", "-p", "8080", "-loss", "25"]),
            Ok(Action::Add {
                ip: "10.0.0.5".into(),
                port: Some(8080),
                loss: 25,
            })
        );
    }

    #[test]
    fn test_port_zero_is_any() {
        assert_eq!(
            parse_ok(&["t", "-loss", "3"]),
            Ok(Action::Add {
                ip: "127.0.0.1".into(),
                port: None,
                loss: 3,
            })
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_ok(&["t", "-remove", "-show"]),
            Ok(Action::Show {
                ip: "127.0.0.1".into()
            })
        );
        assert_eq!(
            parse_ok(&["t", "-remove", "-loss", "5"]),
            Ok(Action::Remove {
                ip: "127.0.0.1".into()
            })
        );
    }

    #[test]
    fn test_nothing_requested() {
        assert_eq!(parse_ok(&["t"]), Err(Usage::Missing));
        assert_eq!(parse_ok(&["t", "-ip", "10.0.0.5"]), Err(Usage::Missing));
    }

    #[test]
    fn test_loss_range() {
        assert_eq!(parse_ok(&["t", "-loss", "101"]), Err(Usage::LossRange));
        assert_eq!(parse_ok(&["t", "-loss", "-1"]), Err(Usage::LossRange));
        assert_eq!(parse_ok(&["t", "-show", "-loss", "150"]), Err(Usage::LossRange));
    }
}

//! Report printing.

use std::fmt::Display;

use serde::Serialize;
use toxipacket::Shown;

/// Print a report as text or JSON.
pub fn print_report<T: Serialize + Display>(report: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

/// Print `tc qdisc show` output verbatim, or as JSON with a parsed view.
pub fn print_shown(shown: &Shown, json: bool) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "interface": shown.interface,
            "output": shown.output,
            "qdiscs": shown.qdiscs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", shown);
    }
    Ok(())
}

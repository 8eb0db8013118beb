//! Replay command - applies an edit script and prints what observers saw.

use crate::cli::{OutputFormat, ReplayArgs};
use crate::output::{print_json, print_report};
use crate::script;

/// Run the replay command
pub fn run(args: &ReplayArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let edits = script::load(&args.script)?;
    let report = script::replay(&args.table, &args.field, &args.initial, edits)?;

    match format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => print_json(&report)?,
    }

    Ok(())
}

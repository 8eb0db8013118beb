//! Output formatting helpers for human-readable and JSON output.

use fieldtext::{ChangeEvent, ChangeKind, EditRequest};
use serde::Serialize;

use crate::script::ReplayReport;

fn describe_edit(edit: &EditRequest) -> String {
    match edit {
        EditRequest::Insert { index, text } => format!("insert {index} {text:?}"),
        EditRequest::Remove { start, end } => format!("remove {start}..{end}"),
        EditRequest::Clear => "clear".to_string(),
    }
}

fn describe_event(event: &ChangeEvent) -> String {
    match event.kind {
        ChangeKind::Insert => format!("+ {} {:?}", event.start, event.value),
        ChangeKind::Remove => format!("- {}..{} {:?}", event.start, event.end, event.value),
    }
}

/// Print a report as one line per step and event, then the final text.
pub fn print_report(report: &ReplayReport) {
    println!("{} = {:?}", report.field, report.initial);
    for (i, step) in report.steps.iter().enumerate() {
        match &step.error {
            Some(error) => println!("[{i}] {}: error: {error}", describe_edit(&step.edit)),
            None => println!("[{i}] {}", describe_edit(&step.edit)),
        }
        for event in &step.events {
            println!("      {}", describe_event(event));
        }
    }
    println!("final = {:?}", report.final_text);
}

/// Print any serializable value as a single line of JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

//! Edit scripts: loading and replaying them against an in-memory record.

use std::path::Path;
use std::sync::{Arc, Mutex};

use fieldtext::{
    ChangeEvent, EditRequest, FieldId, ObservableString,
    datastore::{InMemory, Schema},
};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Reads a JSON array of edit requests.
pub fn load(path: &Path) -> Result<Vec<EditRequest>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let edits: Vec<EditRequest> = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), edits = edits.len(), "Loaded edit script");
    Ok(edits)
}

/// Outcome of one script step.
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub edit: EditRequest,
    pub events: Vec<ChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub field: FieldId,
    pub initial: String,
    pub steps: Vec<StepReport>,
    #[serde(rename = "final")]
    pub final_text: String,
}

impl ReplayReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|step| step.error.is_some()).count()
    }
}

/// Creates a one-record store and applies `edits` in order.
///
/// A failed edit is recorded in its step and leaves the text untouched; the
/// remaining edits still run.
pub fn replay(
    table: &str,
    field: &str,
    initial: &str,
    edits: Vec<EditRequest>,
) -> fieldtext::Result<ReplayReport> {
    let store = Arc::new(InMemory::new([Schema::new(table).with_text_field(field)]));
    let record = store.create_record(table, [(field, initial)])?;
    let value = ObservableString::new(store, FieldId::new(table, record, field))?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    value.changed().connect(move |event: &ChangeEvent| {
        sink.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone())
    });

    let mut steps = Vec::with_capacity(edits.len());
    for (step, edit) in edits.into_iter().enumerate() {
        let error = match value.apply(edit.clone()) {
            Ok(()) => None,
            Err(err) => {
                warn!(step, module = err.module(), error = %err, "Edit failed");
                Some(err.to_string())
            }
        };
        let events = std::mem::take(
            &mut *seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        steps.push(StepReport {
            edit,
            events,
            error,
        });
    }

    let final_text = value.text()?.unwrap_or_default();
    let report = ReplayReport {
        field: value.field().clone(),
        initial: initial.to_string(),
        steps,
        final_text,
    };
    info!(
        field = %report.field,
        steps = report.steps.len(),
        failures = report.failures(),
        "Replayed edit script"
    );
    Ok(report)
}

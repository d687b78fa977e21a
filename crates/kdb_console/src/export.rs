//! Export shapes for groups and sessions, and CSV for table-shaped values.

use std::path::Path;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::classify::{self, Table};
use crate::ledger::{ContinuousSession, PolledResult, ResultGroup};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("value is not table-shaped")]
    NotTabular,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON export of one query group. Fields the group never got are omitted.
pub fn group_export(group: &ResultGroup) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), Value::from(group.id.to_string()));
    out.insert("query".into(), Value::from(group.query.clone()));
    out.insert(
        "queryTimestamp".into(),
        Value::from(group.query_time.to_rfc3339()),
    );
    if let (Some(value), Some(at)) = (group.response(), group.response_time()) {
        out.insert("response".into(), value.clone());
        out.insert("responseTimestamp".into(), Value::from(at.to_rfc3339()));
    }
    if let (Some(text), Some(at)) = (group.error_text(), group.error_time()) {
        out.insert("error".into(), Value::from(text));
        out.insert("errorTimestamp".into(), Value::from(at.to_rfc3339()));
    }
    Value::Object(out)
}

/// JSON export of one continuous session with its result count.
pub fn session_export(session: &ContinuousSession) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), Value::from(session.id.to_string()));
    out.insert("mode".into(), Value::from(session.mode.as_str()));
    out.insert("query".into(), Value::from(session.query.clone()));
    out.insert(
        "startTime".into(),
        Value::from(session.start_time.to_rfc3339()),
    );
    if let Some(end) = session.end_time {
        out.insert("endTime".into(), Value::from(end.to_rfc3339()));
    }
    out.insert("resultCount".into(), Value::from(session.results.len()));
    out.insert(
        "results".into(),
        Value::Array(session.results.iter().map(polled_export).collect()),
    );
    Value::Object(out)
}

fn polled_export(polled: &PolledResult) -> Value {
    let mut out = json!({
        "timestamp": polled.timestamp.to_rfc3339(),
        "coordinates": { "x": polled.coordinates.x, "y": polled.coordinates.y },
    });
    if let Some(map) = out.as_object_mut() {
        match (polled.result(), polled.error()) {
            (Some(value), _) => {
                map.insert("result".into(), value.clone());
            }
            (_, Some(error)) => {
                map.insert("error".into(), Value::from(error));
            }
            _ => {}
        }
    }
    out
}

/// Whether `value` can be written as CSV.
pub fn is_tabular(value: &Value) -> bool {
    classify::table(value).is_some()
}

fn write_table<W: std::io::Write>(wtr: &mut csv::Writer<W>, table: &Table) -> Result<(), ExportError> {
    wtr.write_record(&table.columns)?;
    for row in 0..table.row_count() {
        let record: Vec<String> = (0..table.columns.len())
            .map(|col| table.cell_text(row, col))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// CSV text for a record list or a column dictionary.
pub fn table_csv(value: &Value) -> Result<String, ExportError> {
    let table = classify::table(value).ok_or(ExportError::NotTabular)?;
    let mut wtr = csv::Writer::from_writer(Vec::new());
    write_table(&mut wtr, &table)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a table-shaped value to `path` as CSV.
pub fn write_table_csv(value: &Value, path: &Path) -> Result<(), ExportError> {
    let table = classify::table(value).ok_or(ExportError::NotTabular)?;
    let mut wtr = csv::Writer::from_path(path)?;
    write_table(&mut wtr, &table)?;
    tracing::info!(path = %path.display(), rows = table.row_count(), "table exported");
    Ok(())
}

//! Parse boundary for exported bid snapshots.
//!
//! A snapshot is a JSON array of bid rows. Anything else (unreadable file, invalid
//! JSON, a non-array document, or a single malformed row) is rejected here so that
//! a reconciliation pass never starts on partial data.

use std::path::Path;

use serde_json::Value;
use snafu::ResultExt;

use crate::error::*;
use crate::models::BidRecord;

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Vec<BidRecord>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).context(SnapshotRead {
        path: path.display().to_string(),
    })?;
    parse_snapshot(&raw)
}

pub fn parse_snapshot(raw: &str) -> Result<Vec<BidRecord>> {
    let document: Value = serde_json::from_str(raw).context(SnapshotJson)?;

    let rows = match document {
        Value::Array(rows) => rows,
        other => {
            return SnapshotNotAnArray {
                found: json_kind(&other),
            }
            .fail()
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| serde_json::from_value(row).context(MalformedBidRow { index }))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
#[snafu(visibility(pub))]
pub enum SnapshotError {
    #[snafu(display("Failed to read snapshot file {path}"))]
    SnapshotRead {
        path: String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Snapshot is not valid JSON"))]
    SnapshotJson {
        source: serde_json::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Snapshot must be a JSON array of bid rows, found {found}"))]
    SnapshotNotAnArray {
        found: &'static str,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Malformed bid row at index {index}: {source}"))]
    MalformedBidRow {
        index: usize,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Invalid address {input:?}, expected 0x followed by 40 hex characters"))]
    InvalidAddress {
        input: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

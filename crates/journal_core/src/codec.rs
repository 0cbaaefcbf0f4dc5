//! Text format of a record file.
//!
//! A record lives in `<id>.txt` and holds exactly two newline-terminated
//! lines:
//!
//! ```text
//! 2024-03-01 09:30:00
//! Bought coffee beans
//! ```
//!
//! The first line is the UTC timestamp, the second the content. Newlines and
//! backslashes inside the content are escaped so it always fits on one line.
//! A file missing its final newline is reported as [`CodecError::Incomplete`];
//! that is how a reader recognizes a file another process is still writing.

use crate::record::{Record, RecordId};
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Extension of record files.
pub const EXTENSION: &str = "txt";

/// Timestamp layout of the first line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reasons a file fails to decode as a record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("file is not valid UTF-8")]
    NotUtf8,

    /// Fewer than two complete lines; usually a write still in flight.
    #[error("file is incomplete")]
    Incomplete,

    #[error("unexpected content after the second line")]
    TrailingData,

    #[error("invalid timestamp {0:?}")]
    BadTimestamp(String),
}

/// File name of the record with the given id.
pub fn file_name(id: &RecordId) -> String {
    format!("{}.{}", id, EXTENSION)
}

/// Extracts the record id from a file name, if the name denotes a record file.
///
/// Hidden files (including the store's own temp files) and files with other
/// extensions are not record files.
pub fn parse_file_name(name: &str) -> Option<RecordId> {
    let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    RecordId::parse(stem)
}

/// Formats a timestamp the way the first line stores it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a first-line timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CodecError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| CodecError::BadTimestamp(raw.to_string()))
}

/// Serializes a record into file bytes.
pub fn encode(record: &Record) -> Vec<u8> {
    format!(
        "{}\n{}\n",
        format_timestamp(record.timestamp()),
        escape(record.content())
    )
    .into_bytes()
}

/// Parses file bytes into the record with the given id.
pub fn decode(id: RecordId, bytes: &[u8]) -> Result<Record, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
    let body = text.strip_suffix('\n').ok_or(CodecError::Incomplete)?;

    let (timestamp_line, content_line) = body.split_once('\n').ok_or(CodecError::Incomplete)?;
    if content_line.contains('\n') {
        return Err(CodecError::TrailingData);
    }

    let timestamp = parse_timestamp(timestamp_line.trim_end_matches('\r'))?;
    let content = unescape(content_line.trim_end_matches('\r'));
    Ok(Record::with_id(id, content, timestamp))
}

fn escape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

// Unknown escapes are kept verbatim so hand-written files survive a round trip.
fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

//! Typed error boundaries. Fatal conditions (§7 items 2 and 5) propagate as
//! `Err` up to the binary, which reports via `anyhow` and exits non-zero.
//! Everything else (§7 items 1, 3, 4) is logged and quarantined at the
//! point of discovery; it never reaches these types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0:?} could not be read: {1}")]
    Unreadable(std::path::PathBuf, std::io::Error),
    #[error("config file {0:?} is not valid JSON: {1}")]
    Malformed(std::path::PathBuf, serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv file {0:?} could not be read: {1}")]
    Unreadable(std::path::PathBuf, std::io::Error),
    #[error("csv file {0:?} has no data rows")]
    Empty(std::path::PathBuf),
    #[error("csv row {row} has {found} columns, expected {expected} (set by the first row)")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("csv row {row} field {field:?} contains a character outside `0-9 . - + e`")]
    InvalidCharacter { row: usize, field: String },
    #[error("csv row {row} field {field:?} could not be parsed as a number")]
    NotANumber { row: usize, field: String },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of input while parsing {context}")]
    UnexpectedEnd { context: &'static str },
    #[error("unknown operator {substring:?} at position {position}")]
    UnknownOperator { substring: String, position: usize },
    #[error("expected {expected:?} at position {position}, found {found:?}")]
    Expected {
        expected: &'static str,
        found: String,
        position: usize,
    },
    #[error("malformed number {substring:?} at position {position}")]
    MalformedNumber { substring: String, position: usize },
}

/// Fatal: the pool's free list is exhausted even after appending a new slab.
/// Per spec §7 item 5, this is unrecoverable and aborts the process.
#[derive(Debug, Error)]
#[error("node pool allocation failed: free list exhausted after slab growth")]
pub struct AllocationError;

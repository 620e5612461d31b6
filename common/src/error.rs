//! Shared error type

use thiserror::Error;

/// Errors raised by the row and section model
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Unknown column '{column}' in {collection}")]
    UnknownColumn { collection: String, column: String },

    #[error("Column '{column}' in {collection} is read-only")]
    ReadOnlyColumn { collection: String, column: String },

    #[error("Row {index} out of range for {collection} ({len} rows)")]
    RowOutOfRange {
        collection: String,
        index: usize,
        len: usize,
    },

    #[error("Section {0} has a fixed row list")]
    NotDynamic(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result alias
pub type Result<T> = std::result::Result<T, Error>;

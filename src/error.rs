use crate::signature::SignatureError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to read {collection}: {source}")]
    Fetch {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to write {collection}/{id}: {source}")]
    Write {
        collection: String,
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("Report submit failed: {failed} of {attempted} writes failed ({documents})")]
    SubmitFailed {
        failed: usize,
        attempted: usize,
        documents: String,
    },

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] plant_report_common::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

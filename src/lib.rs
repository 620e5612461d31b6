//! Plant Report
//!
//! Data-entry model for the weekly water treatment plant report: record
//! tables persisted row by row to a document store, signature capture and
//! the controller that submits or clears a whole report.

pub mod cli;
pub mod config;
pub mod controller;
pub mod documents;
pub mod entry;
pub mod error;
pub mod signature;
pub mod store;
pub mod table;

pub use controller::{SectionController, SubmitReport};
pub use error::{ReportError, Result};
pub use signature::{SignatureCapture, SignaturePad, SignatureTarget};
pub use store::{DocumentStore, FileStore, MemoryStore};
pub use table::{DeletePolicy, LoadOutcome, RecordTable, SaveReport};

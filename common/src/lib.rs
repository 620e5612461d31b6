//! Plant Report Common Library
//!
//! Row model, section configuration and the rules shared by the report
//! tables: document id sanitization and the stock balance rule.

pub mod types;
pub mod layout;
pub mod error;
pub mod id;
pub mod section;
pub mod stock;

pub use types::{CellValue, Row, PNG_DATA_URL_PREFIX, SIGNATURE_COLUMN};
pub use layout::ReportLayout;
pub use error::{Error, Result};
pub use id::{find_collisions, is_sentinel, resolve_document_id, sanitize_id, IdStrategy};
pub use section::SectionConfig;
pub use stock::{StockEntry, StockRule};

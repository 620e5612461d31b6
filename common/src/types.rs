//! Row and cell value types
//!
//! A row is an ordered map of column name to cell value. Persisted rows are
//! flat JSON objects, so `CellValue` serializes untagged:
//! - numbers stay JSON numbers (`"Opening Stock (Kg)": 100`)
//! - everything else is a string, including signature data URLs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Column holding a signature image rather than typed text
pub const SIGNATURE_COLUMN: &str = "Signature";

/// Prefix of every signature image stored in a cell
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Number(_) => false,
            CellValue::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Number(_) => None,
        }
    }

    pub fn is_signature(&self) -> bool {
        self.as_text()
            .map(|s| s.starts_with(PNG_DATA_URL_PREFIX))
            .unwrap_or(false)
    }

    /// Converts a stored JSON value. Objects and arrays have no cell form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(CellValue::Number),
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Bool(b) => Some(CellValue::Text(b.to_string())),
            Value::Null => Some(CellValue::Text(String::new())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            // whole numbers are stored as JSON integers
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Value::from(*n as i64),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) if s.starts_with(PNG_DATA_URL_PREFIX) => write!(f, "[signed]"),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One table row.
///
/// `id` is the document key once the row has been stored under a
/// non-label id; it is never written into the persisted fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        self.cells.insert(column.to_string(), value);
    }

    /// True when no cell carries a value
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(CellValue::is_blank)
    }

    /// Builds a row from stored fields, keeping only `allowed` keys.
    ///
    /// Returns the row and the keys that were dropped.
    pub fn from_fields(
        id: Option<String>,
        fields: &Map<String, Value>,
        allowed: &[&str],
    ) -> (Self, Vec<String>) {
        let mut row = Row { id, cells: BTreeMap::new() };
        let mut dropped = Vec::new();

        for (key, value) in fields {
            if !allowed.contains(&key.as_str()) {
                dropped.push(key.clone());
                continue;
            }
            match CellValue::from_json(value) {
                Some(cell) => {
                    row.cells.insert(key.clone(), cell);
                }
                None => dropped.push(key.clone()),
            }
        }

        (row, dropped)
    }

    /// Persisted document body
    pub fn to_fields(&self) -> Map<String, Value> {
        self.cells
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

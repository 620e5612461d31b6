//! Declarative section configuration
//!
//! A section is one table of the report: an ordered list of row labels, an
//! ordered list of columns and the collection its rows are stored in.

use crate::error::{Error, Result};
use crate::id::{sanitize_id, IdStrategy};
use crate::stock::StockRule;
use crate::types::{Row, SIGNATURE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfig {
    /// Heading shown above the table
    pub title: String,
    /// Collection the rows are stored in
    pub collection: String,
    pub labels: Vec<String>,
    pub columns: Vec<String>,
    /// Column that repeats the row label inside stored rows ("Product Name", "Day")
    #[serde(default)]
    pub label_column: Option<String>,
    /// Seed rows, positionally aligned with `labels`
    #[serde(default)]
    pub default_rows: Vec<Row>,
    #[serde(default)]
    pub stock_rule: Option<StockRule>,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    /// Rows can be added and deleted
    #[serde(default)]
    pub dynamic: bool,
    /// Rows without any value are not written on bulk save
    #[serde(default)]
    pub skip_empty_rows: bool,
    /// Section has its own technician name/signature slot
    #[serde(default)]
    pub technician_slot: bool,
}

impl SectionConfig {
    pub fn new(title: &str, collection: &str, labels: &[&str], columns: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            collection: collection.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            label_column: None,
            default_rows: Vec::new(),
            stock_rule: None,
            id_strategy: IdStrategy::Label,
            dynamic: false,
            skip_empty_rows: false,
            technician_slot: false,
        }
    }

    pub fn with_label_column(mut self, column: &str) -> Self {
        self.label_column = Some(column.to_string());
        self
    }

    pub fn with_default_rows(mut self, rows: Vec<Row>) -> Self {
        self.default_rows = rows;
        self
    }

    pub fn with_stock_rule(mut self, rule: StockRule) -> Self {
        self.stock_rule = Some(rule);
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self.skip_empty_rows = true;
        self
    }

    pub fn with_technician_slot(mut self) -> Self {
        self.technician_slot = true;
        self
    }

    /// Keys a stored row may carry
    pub fn allowed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        if let Some(label_column) = &self.label_column {
            if !keys.contains(&label_column.as_str()) {
                keys.push(label_column.as_str());
            }
        }
        keys
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.allowed_keys().contains(&column)
    }

    pub fn derived_column(&self) -> Option<&str> {
        self.stock_rule.as_ref().map(|r| r.derived_column())
    }

    /// False for derived and signature columns
    pub fn is_editable(&self, column: &str) -> bool {
        if column == SIGNATURE_COLUMN {
            return false;
        }
        self.derived_column() != Some(column)
    }

    pub fn has_signature_column(&self) -> bool {
        self.columns.iter().any(|c| c == SIGNATURE_COLUMN)
    }

    /// Row used for `index` before anything is loaded
    pub fn default_row(&self, index: usize) -> Row {
        let mut row = self.default_rows.get(index).cloned().unwrap_or_default();
        if let (Some(column), Some(label)) = (&self.label_column, self.labels.get(index)) {
            if !row.cells.contains_key(column) {
                row.set(column, label.as_str().into());
            }
        }
        if let Some(rule) = &self.stock_rule {
            if row.cells.contains_key(&rule.opening) {
                rule.apply(&mut row);
            }
        }
        row
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Checks the shape of a configured section.
    ///
    /// Duplicate sanitized labels are allowed only for generated ids; with
    /// label ids they would overwrite each other.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(Error::Config(format!("section '{}' has no collection", self.title)));
        }
        if self.columns.is_empty() {
            return Err(Error::Config(format!("section '{}' has no columns", self.title)));
        }
        if let Some(rule) = &self.stock_rule {
            for column in [&rule.opening, &rule.consumption, &rule.closing] {
                if !self.columns.contains(column) {
                    return Err(Error::Config(format!(
                        "section '{}': stock column '{}' is not declared",
                        self.title, column
                    )));
                }
            }
        }
        if self.id_strategy == IdStrategy::Label {
            let mut seen = HashSet::new();
            for label in &self.labels {
                if !seen.insert(sanitize_id(label)) {
                    return Err(Error::Config(format!(
                        "section '{}': label '{}' collides with another row id",
                        self.title, label
                    )));
                }
            }
        }
        Ok(())
    }
}

//! Stock balance rule
//!
//! Chemical stock sections keep three numeric columns in balance:
//! `opening - consumption = closing`. One of consumption/closing is typed by
//! the operator, the other is derived on every edit and is read-only.

use crate::types::{CellValue, Row};
use serde::{Deserialize, Serialize};

pub const OPENING_STOCK: &str = "Opening Stock (Kg)";
pub const CONSUMPTION: &str = "Consumption (Kg)";
pub const CLOSING_STOCK: &str = "Closing Stock (Kg)";

/// Which of the two stock outputs the operator types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEntry {
    /// Consumption is typed, closing stock is derived
    #[default]
    Consumption,
    /// Closing stock is typed (counted), consumption is derived
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRule {
    pub opening: String,
    pub consumption: String,
    pub closing: String,
    #[serde(default)]
    pub entered: StockEntry,
}

impl Default for StockRule {
    fn default() -> Self {
        Self {
            opening: OPENING_STOCK.to_string(),
            consumption: CONSUMPTION.to_string(),
            closing: CLOSING_STOCK.to_string(),
            entered: StockEntry::Consumption,
        }
    }
}

impl StockRule {
    pub fn closing_entered() -> Self {
        Self {
            entered: StockEntry::Closing,
            ..Self::default()
        }
    }

    /// The column this rule writes
    pub fn derived_column(&self) -> &str {
        match self.entered {
            StockEntry::Consumption => &self.closing,
            StockEntry::Closing => &self.consumption,
        }
    }

    fn entered_column(&self) -> &str {
        match self.entered {
            StockEntry::Consumption => &self.consumption,
            StockEntry::Closing => &self.closing,
        }
    }

    pub fn is_input(&self, column: &str) -> bool {
        column == self.opening || column == self.entered_column()
    }

    /// Columns holding numbers (all three)
    pub fn is_numeric(&self, column: &str) -> bool {
        column == self.opening || column == self.consumption || column == self.closing
    }

    /// Recomputes the derived column from the two inputs.
    ///
    /// Missing or unparseable inputs count as 0.
    pub fn apply(&self, row: &mut Row) {
        let opening = row.get(&self.opening).map(parse_numeric).unwrap_or(0.0);
        let entered = row.get(self.entered_column()).map(parse_numeric).unwrap_or(0.0);
        let derived = round_kg(opening - entered);
        let column = self.derived_column().to_string();
        row.set(&column, CellValue::Number(derived));
    }
}

/// Numeric reading of a cell; blanks and garbage read as 0
pub fn parse_numeric(value: &CellValue) -> f64 {
    match value {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Number(_) => 0.0,
        CellValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0),
    }
}

/// Coerces typed text into a number when it parses
pub fn coerce_numeric(value: CellValue) -> CellValue {
    match value {
        CellValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(s),
        },
        number => number,
    }
}

// drops float noise such as 0.30000000000000004
fn round_kg(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

//! Built-in report layout
//!
//! The weekly water treatment report: condenser water readings per weekday,
//! chilled water readings for the report date, two chemical stock tables and
//! the plant readings sheet.

use crate::error::{Error, Result};
use crate::id::IdStrategy;
use crate::section::SectionConfig;
use crate::stock::{StockRule, CLOSING_STOCK, CONSUMPTION, OPENING_STOCK};
use crate::types::{Row, SIGNATURE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CONDENSER_WATER: &str = "condenserWater1";
pub const CHILLED_WATER: &str = "chilledWater1";
pub const CONDENSER_CHEMICALS: &str = "condenserChemicals1";
pub const COOLING_TOWER_CHEMICALS: &str = "coolingTowerChemicals1";
pub const PLANT_READINGS: &str = "additionalTable";

pub const WEEKDAYS: &[&str] = &[
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Condenser chemical products with their opening stock (Kg)
pub const CONDENSER_CHEMICAL_STOCKS: &[(&str, f64)] = &[
    ("PM3601 (25Kg)", 100.0),
    ("Biocide AQ", 200.0),
    ("PF CC6202 (20Kg)", 150.0),
    ("PDV Salt (25Kg)", 300.0),
    ("Sodium Hypochlorite (25 kg)", 250.0),
    ("BD 250C (25Kg)", 180.0),
    ("PF CL4015 (CHW)", 120.0),
    ("BD 350 (30Kg)", 90.0),
    ("Dip slide (pcs)", 60.0),
];

pub const COOLING_TOWER_PRODUCTS: &[&str] = &[
    "Hydrochloric Acid (25Kg)",
    "Sodium Hypochlorite (25Kg)",
    "Phosphoric Acid (35Kg)",
    "Expired CHW Chemicals",
    "Expired CT Chemicals",
];

pub const PLANT_READING_LABELS: &[&str] = &[
    "Condenser water dip slide test result",
    "Chilled water dip slide test result",
    "Condenser system Make-up (m³ / USG)",
    "Condenser system Blowdown (m³ / USG)",
    "Chilled water system Make-up (m³ / USG)",
    "C.O.C based on conductivity (Condenser/Make-up)",
    "C.O.C based on (CT make-up/CT blowdown)",
    "MIOX Running Hours (Hr.)",
];

pub const PRODUCT_NAME: &str = "Product Name";
pub const DAY: &str = "Day";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportLayout {
    pub sections: Vec<SectionConfig>,
}

impl ReportLayout {
    pub fn new(sections: Vec<SectionConfig>) -> Self {
        Self { sections }
    }

    /// Weekly report; `report_date` labels the single chilled water row
    pub fn weekly(report_date: &str) -> Self {
        let condenser_water = SectionConfig::new(
            "Condenser Water",
            CONDENSER_WATER,
            WEEKDAYS,
            &[
                "Makeup Conductivity (µS/cm)",
                "Condenser Conductivity (µS/cm)",
                "Free Chlorine",
                "Action",
                "Name",
                SIGNATURE_COLUMN,
            ],
        )
        .with_technician_slot();

        let chilled_water = SectionConfig::new(
            "Chilled Water",
            CHILLED_WATER,
            &[report_date],
            &[DAY, "Conductivity", "Action"],
        )
        .with_label_column(DAY)
        .with_id_strategy(IdStrategy::Generated)
        .with_technician_slot();

        let chemical_labels: Vec<&str> = CONDENSER_CHEMICAL_STOCKS.iter().map(|(l, _)| *l).collect();
        let chemical_defaults = CONDENSER_CHEMICAL_STOCKS
            .iter()
            .map(|(_, opening)| Row::new().with_cell(OPENING_STOCK, *opening))
            .collect();
        let condenser_chemicals = SectionConfig::new(
            "Condenser Chemicals",
            CONDENSER_CHEMICALS,
            &chemical_labels,
            &[OPENING_STOCK, CONSUMPTION, CLOSING_STOCK],
        )
        .with_label_column(PRODUCT_NAME)
        .with_stock_rule(StockRule::default())
        .with_default_rows(chemical_defaults)
        .with_technician_slot();

        let cooling_tower_chemicals = SectionConfig::new(
            "Cooling Tower Chemicals",
            COOLING_TOWER_CHEMICALS,
            COOLING_TOWER_PRODUCTS,
            &["Available empty Jerry Cans in plants"],
        )
        .with_label_column(PRODUCT_NAME)
        .dynamic();

        let plant_readings = SectionConfig::new(
            "Plant Readings",
            PLANT_READINGS,
            PLANT_READING_LABELS,
            &["Value"],
        );

        Self::new(vec![
            condenser_water,
            chilled_water,
            condenser_chemicals,
            cooling_tower_chemicals,
            plant_readings,
        ])
    }

    pub fn section(&self, collection: &str) -> Result<&SectionConfig> {
        self.sections
            .iter()
            .find(|s| s.collection == collection)
            .ok_or_else(|| Error::UnknownSection(collection.to_string()))
    }

    pub fn collections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.collection.as_str()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            section.validate()?;
            if !seen.insert(section.collection.as_str()) {
                return Err(Error::Config(format!(
                    "collection '{}' is used by more than one section",
                    section.collection
                )));
            }
        }
        Ok(())
    }
}

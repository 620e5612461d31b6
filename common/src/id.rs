//! Document id resolution
//!
//! Rows are stored under a document id derived from their label. Every
//! character outside `[A-Za-z0-9]` becomes `_`, so `PM3601 (25Kg)` is stored
//! as `PM3601__25Kg_`.

use crate::types::Row;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Section-level technician name and signature
pub const TECHNICIAN_INFO_ID: &str = "technicianInfo";
/// Legacy section signature document
pub const SIGNATURE_ID: &str = "signature";
/// Report header document
pub const METADATA_ID: &str = "metadata";
/// Row labels of a dynamic section, in display order
pub const ROW_ORDER_ID: &str = "rowOrder";

const SENTINEL_IDS: &[&str] = &[TECHNICIAN_INFO_ID, SIGNATURE_ID, METADATA_ID, ROW_ORDER_ID];

/// How a section derives document ids for rows without a stored id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// Sanitized row label
    #[default]
    Label,
    /// Fresh opaque id, kept on the row after the first save
    Generated,
}

pub fn sanitize_id(label: &str) -> String {
    lazy_static::lazy_static! {
        static ref NON_ALNUM: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
    }
    NON_ALNUM.replace_all(label, "_").into_owned()
}

/// Metadata documents that share a collection with rows
pub fn is_sentinel(id: &str) -> bool {
    SENTINEL_IDS.contains(&id)
}

/// Document id for `row`: its stored id, else one derived from `label`.
///
/// A generated id is returned but not written back; callers that keep the
/// row store it in `row.id` so later saves hit the same document.
pub fn resolve_document_id(row: &Row, label: &str, strategy: IdStrategy) -> String {
    if let Some(id) = row.id.as_deref().filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    match strategy {
        IdStrategy::Label => sanitize_id(label),
        IdStrategy::Generated => uuid::Uuid::new_v4().simple().to_string(),
    }
}

/// Ids that more than one row resolves to, in first-seen order
pub fn find_collisions<'a, I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for id in ids {
        let count = counts.entry(id).or_insert(0);
        if *count == 0 {
            order.push(id);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter(|id| counts[id] > 1)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_product_label() {
        assert_eq!(sanitize_id("PM3601 (25Kg)"), "PM3601__25Kg_");
        assert_eq!(sanitize_id("Sodium Hypochlorite (25 kg)"), "Sodium_Hypochlorite__25_kg_");
        assert_eq!(sanitize_id("Sunday"), "Sunday");
    }

    #[test]
    fn test_sanitize_date_label() {
        assert_eq!(sanitize_id("18/10/2026"), "18_10_2026");
    }

    #[test]
    fn test_sanitize_non_ascii_is_one_underscore_per_char() {
        assert_eq!(sanitize_id("µS/cm"), "_S_cm");
        assert_eq!(sanitize_id("m³"), "m_");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let labels = [
            "PM3601 (25Kg)",
            "Dip slide (pcs)",
            "C.O.C based on (CT make-up/CT blowdown)",
            "",
            "___",
            "µS/cm — ok",
            "Available empty Jerry Cans in plants (06-11-2022)",
        ];
        for label in labels {
            let once = sanitize_id(label);
            assert_eq!(sanitize_id(&once), once, "not idempotent for {:?}", label);
            assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    #[test]
    fn test_is_sentinel() {
        assert!(is_sentinel("technicianInfo"));
        assert!(is_sentinel("signature"));
        assert!(is_sentinel("metadata"));
        assert!(is_sentinel(ROW_ORDER_ID));
        assert!(!is_sentinel("Sunday"));
    }

    #[test]
    fn test_resolve_prefers_stored_id() {
        let row = Row {
            id: Some("existing".to_string()),
            ..Row::default()
        };
        assert_eq!(resolve_document_id(&row, "PM3601 (25Kg)", IdStrategy::Label), "existing");
        assert_eq!(resolve_document_id(&row, "x", IdStrategy::Generated), "existing");
    }

    #[test]
    fn test_resolve_from_label() {
        let row = Row::default();
        assert_eq!(resolve_document_id(&row, "BD 350 (30Kg)", IdStrategy::Label), "BD_350__30Kg_");
    }

    #[test]
    fn test_resolve_generated_is_fresh() {
        let row = Row::default();
        let a = resolve_document_id(&row, "18/10/2026", IdStrategy::Generated);
        let b = resolve_document_id(&row, "18/10/2026", IdStrategy::Generated);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_find_collisions() {
        let ids = ["PF_CC6202__20Kg_", "Biocide_AQ", "PF_CC6202__20Kg_", "a", "a", "a"];
        assert_eq!(find_collisions(ids), vec!["PF_CC6202__20Kg_", "a"]);
        assert!(find_collisions(["x", "y"]).is_empty());
    }
}

//! Section-level side documents stored next to the row documents:
//! technician sign-off, the notes list and the report header.

use crate::error::{ReportError, Result};
use crate::store::{DocumentStore, Fields};
use chrono::{Datelike, Duration, NaiveDate};
use plant_report_common::id::{METADATA_ID, TECHNICIAN_INFO_ID};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const NOTES_COLLECTION: &str = "notes";
pub const NOTE_LIST_ID: &str = "noteList";
pub const REPORT_COLLECTION: &str = "report";

pub const DEFAULT_PLANT_NAME: &str = "AD-008";

/// A JSON document living under a fixed id
pub trait SideDocument: Serialize + DeserializeOwned + Default {
    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ReportError::Config(format!(
                "side document must serialize to an object, got {}",
                other
            ))),
        }
    }

    fn from_fields(fields: Fields) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }
}

/// `Ok(None)` when the document does not exist yet
pub async fn load_document<T: SideDocument, S: DocumentStore>(
    store: &S,
    collection: &str,
    id: &str,
) -> Result<Option<T>> {
    let fields = store
        .get(collection, id)
        .await
        .map_err(|source| ReportError::Fetch {
            collection: collection.to_string(),
            source,
        })?;
    fields.map(T::from_fields).transpose()
}

pub async fn save_document<T: SideDocument, S: DocumentStore>(
    store: &S,
    collection: &str,
    id: &str,
    document: &T,
) -> Result<()> {
    store
        .put(collection, id, document.to_fields()?)
        .await
        .map_err(|source| ReportError::Write {
            collection: collection.to_string(),
            id: id.to_string(),
            source,
        })
}

/// Technician name and signature of one section, stored as
/// `<collection>/technicianInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicianInfo {
    pub name: String,
    pub signature: String,
}

impl SideDocument for TechnicianInfo {}

impl TechnicianInfo {
    pub const ID: &'static str = TECHNICIAN_INFO_ID;

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Free-text notes with their own sign-off, stored as `notes/noteList`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteList {
    pub notes: Vec<String>,
    pub name: String,
    pub signature: String,
}

impl SideDocument for NoteList {}

impl NoteList {
    /// Appends a trimmed note; blank input is ignored
    pub fn add(&mut self, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() {
            return false;
        }
        self.notes.push(note.to_string());
        true
    }

    pub fn delete(&mut self, index: usize) -> Option<String> {
        (index < self.notes.len()).then(|| self.notes.remove(index))
    }
}

/// Report header, stored as `report/metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportMeta {
    pub plant_name: String,
    week_commencing: NaiveDate,
    pub report_date: NaiveDate,
    pub revision_date: NaiveDate,
}

impl SideDocument for ReportMeta {}

impl Default for ReportMeta {
    fn default() -> Self {
        Self::new(DEFAULT_PLANT_NAME, chrono::Local::now().date_naive())
    }
}

impl ReportMeta {
    pub const ID: &'static str = METADATA_ID;

    pub fn new(plant_name: &str, today: NaiveDate) -> Self {
        Self {
            plant_name: plant_name.to_string(),
            week_commencing: week_start(today),
            report_date: today,
            revision_date: today,
        }
    }

    pub fn week_commencing(&self) -> NaiveDate {
        self.week_commencing
    }

    /// Any date of the week; stored as that week's Sunday
    pub fn set_week_commencing(&mut self, date: NaiveDate) {
        self.week_commencing = week_start(date);
    }

    pub fn week_ending(&self) -> NaiveDate {
        self.week_commencing + Duration::days(6)
    }

    /// e.g. `Week Commencing Sunday : 28th July 2024 to 3rd August 2024`
    pub fn week_label(&self) -> String {
        format!(
            "Week Commencing Sunday : {} to {}",
            long_date(self.week_commencing),
            long_date(self.week_ending())
        )
    }

    /// Day shown in the chilled water row, `dd/mm/yyyy`
    pub fn report_date_label(&self) -> String {
        self.report_date.format("%d/%m/%Y").to_string()
    }
}

/// Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

fn long_date(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{} {}", day, suffix, date.format("%B %Y"))
}

/// Reads the report header; a stored week is re-normalized to its Sunday
pub async fn load_meta<S: DocumentStore>(store: &S) -> Result<Option<ReportMeta>> {
    let meta: Option<ReportMeta> = load_document(store, REPORT_COLLECTION, ReportMeta::ID).await?;
    Ok(meta.map(|mut m| {
        m.week_commencing = week_start(m.week_commencing);
        m
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_start_is_sunday() {
        assert_eq!(week_start(date(2024, 7, 28)), date(2024, 7, 28));
        assert_eq!(week_start(date(2024, 8, 1)), date(2024, 7, 28));
        assert_eq!(week_start(date(2024, 8, 3)), date(2024, 7, 28));
        assert_eq!(week_start(date(2024, 8, 4)), date(2024, 8, 4));
    }

    #[test]
    fn test_week_label() {
        let mut meta = ReportMeta::new("AD-002", date(2024, 7, 30));
        assert_eq!(
            meta.week_label(),
            "Week Commencing Sunday : 28th July 2024 to 3rd August 2024"
        );
        meta.set_week_commencing(date(2026, 10, 14));
        assert_eq!(meta.week_commencing(), date(2026, 10, 11));
        assert_eq!(meta.week_ending(), date(2026, 10, 17));
        assert_eq!(meta.report_date_label(), "30/07/2024");
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(long_date(date(2024, 7, 1)), "1st July 2024");
        assert_eq!(long_date(date(2024, 7, 2)), "2nd July 2024");
        assert_eq!(long_date(date(2024, 7, 11)), "11th July 2024");
        assert_eq!(long_date(date(2024, 7, 22)), "22nd July 2024");
        assert_eq!(long_date(date(2024, 7, 13)), "13th July 2024");
    }

    #[test]
    fn test_notes_add_and_delete() {
        let mut notes = NoteList::default();
        assert!(notes.add("  Dosing pump serviced "));
        assert!(!notes.add("   "));
        assert!(notes.add("Dip slide taken"));
        assert_eq!(notes.notes, vec!["Dosing pump serviced", "Dip slide taken"]);

        assert_eq!(notes.delete(0).as_deref(), Some("Dosing pump serviced"));
        assert_eq!(notes.delete(5), None);
        assert_eq!(notes.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_technician_round_trip() {
        let store = MemoryStore::new();
        let info = TechnicianInfo {
            name: "Ali".into(),
            signature: "data:image/png;base64,AAAA".into(),
        };
        save_document(&store, "condenserWater1", TechnicianInfo::ID, &info).await.unwrap();

        let doc = store.get("condenserWater1", "technicianInfo").await.unwrap().unwrap();
        assert_eq!(doc["name"], json!("Ali"));

        let loaded: Option<TechnicianInfo> =
            load_document(&store, "condenserWater1", TechnicianInfo::ID).await.unwrap();
        assert_eq!(loaded, Some(info));
    }

    #[tokio::test]
    async fn test_partial_note_document() {
        let store = MemoryStore::new();
        let fields = json!({"notes": ["a", "b"]}).as_object().cloned().unwrap();
        store.put(NOTES_COLLECTION, NOTE_LIST_ID, fields).await.unwrap();

        let notes: NoteList = load_document(&store, NOTES_COLLECTION, NOTE_LIST_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notes.notes, vec!["a", "b"]);
        assert!(notes.name.is_empty());
    }

    #[tokio::test]
    async fn test_meta_round_trip_normalizes_week() {
        let store = MemoryStore::new();
        let fields = json!({
            "plant_name": "AD-008",
            "week_commencing": "2024-08-01",
            "report_date": "2024-08-01",
            "revision_date": "2021-10-25"
        })
        .as_object()
        .cloned()
        .unwrap();
        store.put(REPORT_COLLECTION, METADATA_ID, fields).await.unwrap();

        let meta = load_meta(&store).await.unwrap().unwrap();
        assert_eq!(meta.week_commencing(), date(2024, 7, 28));
        assert_eq!(meta.revision_date, date(2021, 10, 25));
    }
}

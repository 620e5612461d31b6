//! Section controller
//!
//! Owns every table of a report, the section-level side documents and the
//! single signature capture slot. All mutation goes through `&mut self`, so
//! edits, signatures and saves are applied one at a time in call order.

use crate::documents::{
    load_document, load_meta, save_document, NoteList, ReportMeta, SideDocument, TechnicianInfo,
    NOTES_COLLECTION, NOTE_LIST_ID, REPORT_COLLECTION,
};
use crate::error::{ReportError, Result};
use crate::signature::{SignatureCapture, SignatureError, SignaturePad, SignatureTarget};
use crate::store::DocumentStore;
use crate::table::{DeletePolicy, LoadOutcome, RecordTable, WriteOutcome};
use chrono::NaiveDate;
use plant_report_common::{CellValue, Error, ReportLayout, Row};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Aggregate outcome of `submit_all`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub writes: Vec<WriteOutcome>,
    pub skipped: usize,
}

impl SubmitReport {
    pub fn attempted(&self) -> usize {
        self.writes.len()
    }

    pub fn is_success(&self) -> bool {
        self.writes.iter().all(WriteOutcome::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.writes.iter().filter(|w| !w.is_ok())
    }

    /// Fails when any single write failed; earlier writes stay committed
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let failed: Vec<String> = self
            .failures()
            .map(|w| format!("{}/{}", w.collection, w.id))
            .collect();
        Err(ReportError::SubmitFailed {
            failed: failed.len(),
            attempted: self.attempted(),
            documents: failed.join(", "),
        })
    }
}

pub struct SectionController<S: DocumentStore> {
    store: S,
    tables: Vec<RecordTable>,
    technicians: BTreeMap<String, TechnicianInfo>,
    notes: NoteList,
    meta: ReportMeta,
    capture: SignatureCapture,
    snapshots: HashMap<String, Vec<Row>>,
}

impl<S: DocumentStore> SectionController<S> {
    pub fn new(store: S, layout: ReportLayout) -> Result<Self> {
        layout.validate()?;

        let technicians = layout
            .sections
            .iter()
            .filter(|s| s.technician_slot)
            .map(|s| (s.collection.clone(), TechnicianInfo::default()))
            .collect();
        let tables: Vec<RecordTable> = layout.sections.into_iter().map(RecordTable::new).collect();

        let mut controller = Self {
            store,
            tables,
            technicians,
            notes: NoteList::default(),
            meta: ReportMeta::default(),
            capture: SignatureCapture::new(),
            snapshots: HashMap::new(),
        };
        controller.sync_all();
        Ok(controller)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tables(&self) -> &[RecordTable] {
        &self.tables
    }

    pub fn collections(&self) -> Vec<&str> {
        self.tables.iter().map(RecordTable::collection).collect()
    }

    fn table_index(&self, collection: &str) -> Result<usize> {
        self.tables
            .iter()
            .position(|t| t.collection() == collection)
            .ok_or_else(|| Error::UnknownSection(collection.to_string()).into())
    }

    pub fn table(&self, collection: &str) -> Result<&RecordTable> {
        Ok(&self.tables[self.table_index(collection)?])
    }

    pub fn technician(&self, collection: &str) -> Option<&TechnicianInfo> {
        self.technicians.get(collection)
    }

    pub fn technicians(&self) -> impl Iterator<Item = (&str, &TechnicianInfo)> {
        self.technicians.iter().map(|(c, t)| (c.as_str(), t))
    }

    pub fn notes(&self) -> &NoteList {
        &self.notes
    }

    pub fn meta(&self) -> &ReportMeta {
        &self.meta
    }

    /// Latest row snapshot reported for a collection
    pub fn snapshot(&self, collection: &str) -> Option<&[Row]> {
        self.snapshots.get(collection).map(Vec::as_slice)
    }

    /// Records the latest rows of a collection; returns whether they changed
    pub fn update_data(&mut self, collection: &str, rows: Vec<Row>) -> bool {
        if self.snapshots.get(collection) == Some(&rows) {
            return false;
        }
        self.snapshots.insert(collection.to_string(), rows);
        true
    }

    fn sync(&mut self, index: usize) -> bool {
        let collection = self.tables[index].collection().to_string();
        let rows = self.tables[index].rows().to_vec();
        self.update_data(&collection, rows)
    }

    fn sync_all(&mut self) {
        for index in 0..self.tables.len() {
            self.sync(index);
        }
    }

    /// Loads every table and side document; a failed fetch falls back to defaults
    pub async fn load_all(&mut self) -> Vec<(String, LoadOutcome)> {
        let mut outcomes = Vec::with_capacity(self.tables.len());
        for table in &mut self.tables {
            let outcome = table.load(&self.store).await;
            outcomes.push((table.collection().to_string(), outcome));
        }

        let collections: Vec<String> = self.technicians.keys().cloned().collect();
        for collection in collections {
            let info = self
                .fetch_or_default(&collection, TechnicianInfo::ID)
                .await;
            self.technicians.insert(collection, info);
        }
        self.notes = self.fetch_or_default(NOTES_COLLECTION, NOTE_LIST_ID).await;
        self.meta = match load_meta(&self.store).await {
            Ok(meta) => meta.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "report metadata unreadable, using defaults");
                ReportMeta::default()
            }
        };

        self.sync_all();
        outcomes
    }

    async fn fetch_or_default<T: SideDocument>(&self, collection: &str, id: &str) -> T {
        match load_document(&self.store, collection, id).await {
            Ok(document) => document.unwrap_or_default(),
            Err(e) => {
                warn!(collection = %collection, id = %id, error = %e, "side document unreadable, using defaults");
                T::default()
            }
        }
    }

    pub fn edit_cell(&mut self, collection: &str, index: usize, column: &str, value: CellValue) -> Result<()> {
        let table = self.table_index(collection)?;
        self.tables[table].edit_cell(index, column, value)?;
        self.sync(table);
        Ok(())
    }

    pub fn add_row(&mut self, collection: &str, label: &str) -> Result<usize> {
        let table = self.table_index(collection)?;
        let index = self.tables[table].add_row(label)?;
        self.sync(table);
        Ok(index)
    }

    pub async fn delete_row(&mut self, collection: &str, index: usize, policy: DeletePolicy) -> Result<()> {
        let table = self.table_index(collection)?;
        self.tables[table].delete_row(&self.store, index, policy).await?;
        self.sync(table);
        Ok(())
    }

    fn check_target(&self, target: &SignatureTarget) -> Result<()> {
        let valid = match target {
            SignatureTarget::Cell {
                collection,
                row,
                column,
            } => {
                let table = self.table(collection)?;
                *row < table.len() && table.config().columns.iter().any(|c| c == column)
            }
            SignatureTarget::Technician { collection } => self.technicians.contains_key(collection),
            SignatureTarget::Notes => true,
        };
        if !valid {
            return Err(SignatureError::InvalidTarget(target.to_string()).into());
        }
        Ok(())
    }

    /// Opens the capture for `target`, replacing any capture already open
    pub fn open_signature(&mut self, target: SignatureTarget) -> Result<Option<SignatureTarget>> {
        self.check_target(&target)?;
        Ok(self.capture.open(target))
    }

    pub fn signature_target(&self) -> Option<&SignatureTarget> {
        self.capture.target()
    }

    pub fn signature_pad(&mut self) -> Option<&mut SignaturePad> {
        self.capture.pad_mut()
    }

    pub fn cancel_signature(&mut self) -> Result<SignatureTarget> {
        Ok(self.capture.cancel()?)
    }

    /// Commits the open capture and writes the signed document immediately.
    ///
    /// The signature stays in memory when the write fails; the next submit
    /// retries it.
    pub async fn commit_signature(&mut self) -> Result<SignatureTarget> {
        let (data_url, target) = self.capture.commit(|url, target| (url, target))?;

        match &target {
            SignatureTarget::Cell {
                collection,
                row,
                column,
            } => {
                let table = self.table_index(collection)?;
                let result = self.tables[table]
                    .commit_signature(&self.store, *row, column, data_url)
                    .await;
                self.sync(table);
                result?;
            }
            SignatureTarget::Technician { collection } => {
                let info = self
                    .technicians
                    .get_mut(collection)
                    .ok_or_else(|| SignatureError::InvalidTarget(target.to_string()))?;
                info.signature = data_url;
                save_document(&self.store, collection, TechnicianInfo::ID, &*info).await?;
            }
            SignatureTarget::Notes => {
                self.notes.signature = data_url;
                save_document(&self.store, NOTES_COLLECTION, NOTE_LIST_ID, &self.notes).await?;
            }
        }

        info!(signed = %target, "signature saved");
        Ok(target)
    }

    /// Opens, draws and commits in one step
    pub async fn sign(&mut self, target: SignatureTarget, pad: SignaturePad) -> Result<SignatureTarget> {
        self.check_target(&target)?;
        self.capture.open_with(target, pad);
        self.commit_signature().await
    }

    pub fn set_technician_name(&mut self, collection: &str, name: &str) -> Result<()> {
        self.table_index(collection)?;
        let info = self
            .technicians
            .get_mut(collection)
            .ok_or_else(|| Error::Config(format!("{} has no technician sign-off", collection)))?;
        info.name = name.trim().to_string();
        Ok(())
    }

    pub fn add_note(&mut self, note: &str) -> bool {
        self.notes.add(note)
    }

    pub fn delete_note(&mut self, index: usize) -> Option<String> {
        self.notes.delete(index)
    }

    pub fn set_notes_name(&mut self, name: &str) {
        self.notes.name = name.trim().to_string();
    }

    pub fn set_week_commencing(&mut self, date: NaiveDate) {
        self.meta.set_week_commencing(date);
    }

    pub fn set_plant_name(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Config("plant name must not be empty".into()).into());
        }
        self.meta.plant_name = name.to_string();
        Ok(())
    }

    /// Writes every table in layout order, then technician sign-offs, notes
    /// and the report header.
    ///
    /// Writes are sequential and never rolled back: a failure is recorded
    /// and the remaining documents are still written.
    pub async fn submit_all(&mut self) -> SubmitReport {
        let mut report = SubmitReport::default();

        for table in &mut self.tables {
            let saved = table.bulk_save(&self.store).await;
            report.writes.extend(saved.writes);
            report.skipped += saved.skipped;
        }

        for (collection, info) in &self.technicians {
            let result = save_document(&self.store, collection, TechnicianInfo::ID, info).await;
            report
                .writes
                .push(WriteOutcome::from_result(collection, TechnicianInfo::ID, &result));
        }

        let result = save_document(&self.store, NOTES_COLLECTION, NOTE_LIST_ID, &self.notes).await;
        report
            .writes
            .push(WriteOutcome::from_result(NOTES_COLLECTION, NOTE_LIST_ID, &result));

        let result = save_document(&self.store, REPORT_COLLECTION, ReportMeta::ID, &self.meta).await;
        report
            .writes
            .push(WriteOutcome::from_result(REPORT_COLLECTION, ReportMeta::ID, &result));

        self.sync_all();

        let failed = report.failures().count();
        if failed == 0 {
            info!(writes = report.attempted(), skipped = report.skipped, "report submitted");
        } else {
            warn!(failed, attempted = report.attempted(), "report submitted with failures");
        }
        report
    }

    /// Deletes every document of every owned collection and resets the form.
    ///
    /// Stops at the first failing collection; local state is only reset once
    /// every collection has been cleared.
    pub async fn clear_all(&mut self) -> Result<usize> {
        let mut collections: Vec<String> = self.collections().into_iter().map(str::to_string).collect();
        collections.push(NOTES_COLLECTION.to_string());
        collections.push(REPORT_COLLECTION.to_string());

        let mut removed = 0;
        for collection in &collections {
            removed += self
                .store
                .delete_all(collection)
                .await
                .map_err(|source| ReportError::Write {
                    collection: collection.clone(),
                    id: "*".to_string(),
                    source,
                })?;
        }

        for table in &mut self.tables {
            table.reset();
        }
        for info in self.technicians.values_mut() {
            *info = TechnicianInfo::default();
        }
        self.notes = NoteList::default();
        let plant_name = std::mem::take(&mut self.meta.plant_name);
        self.meta = ReportMeta::default();
        self.meta.plant_name = plant_name;
        let _ = self.capture.cancel();
        self.snapshots.clear();
        self.sync_all();

        info!(removed, "report cleared");
        Ok(removed)
    }
}

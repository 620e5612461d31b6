//! Record table
//!
//! One section's rows, reconciled against the section's collection:
//! - load: rows are fetched by document key, never by list position
//! - edit: one cell at a time, the stock rule recomputes its derived column
//! - sign: the signed row is written immediately
//! - bulk save: every row is upserted in order, failures are collected

use crate::error::{ReportError, Result};
use crate::signature::SignatureError;
use crate::store::{Document, DocumentStore, Fields, StoreResult};
use plant_report_common::id::{
    find_collisions, is_sentinel, resolve_document_id, sanitize_id, ROW_ORDER_ID,
};
use plant_report_common::stock::coerce_numeric;
use plant_report_common::{CellValue, Error, IdStrategy, Row, SectionConfig, PNG_DATA_URL_PREFIX};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// What `load` found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Rows backed by a stored document
    pub found: usize,
    /// Rows that fell back to the default or blank row
    pub defaulted: usize,
    /// Stored keys ignored because the section does not declare them
    pub dropped_keys: usize,
    /// The fetch failed and every row is a default
    pub failed: bool,
}

/// Result of one document write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub collection: String,
    pub id: String,
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn from_result<T, E: std::fmt::Display>(
        collection: &str,
        id: &str,
        result: &std::result::Result<T, E>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// Outcome of a bulk save, one entry per attempted write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub writes: Vec<WriteOutcome>,
    /// Rows left out because they were blank
    pub skipped: usize,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        self.writes.iter().all(WriteOutcome::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.writes.iter().filter(|w| !w.is_ok())
    }
}

/// When a deleted row disappears from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    Immediate,
    /// On the next bulk save
    Deferred,
}

// key of the label list inside the row order document
const ROW_ORDER_KEY: &str = "labels";

#[derive(Debug, Clone)]
pub struct RecordTable {
    config: SectionConfig,
    labels: Vec<String>,
    rows: Vec<Row>,
    pending_deletes: Vec<String>,
    // rows were added or deleted since the row order was last stored
    order_dirty: bool,
}

impl RecordTable {
    pub fn new(config: SectionConfig) -> Self {
        let labels = config.labels.clone();
        let rows = (0..labels.len()).map(|i| config.default_row(i)).collect();
        Self {
            config,
            labels,
            rows,
            pending_deletes: Vec::new(),
            order_dirty: false,
        }
    }

    pub fn config(&self) -> &SectionConfig {
        &self.config
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Whether a user may type into `column`
    pub fn is_editable(&self, column: &str) -> bool {
        if !self.config.is_editable(column) {
            return false;
        }
        // the label column is only typed when it is also a declared column
        match &self.config.label_column {
            Some(label_column) if label_column == column => {
                self.config.columns.iter().any(|c| c == column)
            }
            _ => self.config.has_column(column),
        }
    }

    /// Stored id of a row, if it has one yet
    pub fn document_id(&self, index: usize) -> Option<String> {
        let row = self.rows.get(index)?;
        let label = self.labels.get(index)?;
        match (&row.id, self.config.id_strategy) {
            (Some(id), _) => Some(id.clone()),
            (None, IdStrategy::Label) => Some(sanitize_id(label)),
            (None, IdStrategy::Generated) => None,
        }
    }

    /// Back to the configured labels and default rows
    pub fn reset(&mut self) {
        self.labels = self.config.labels.clone();
        self.rows = (0..self.labels.len()).map(|i| self.config.default_row(i)).collect();
        self.pending_deletes.clear();
        self.order_dirty = false;
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.labels.len() {
            return Err(Error::RowOutOfRange {
                collection: self.config.collection.clone(),
                index,
                len: self.labels.len(),
            }
            .into());
        }
        Ok(())
    }

    fn row_mut(&mut self, index: usize) -> &mut Row {
        if self.rows.len() <= index {
            self.rows.resize_with(index + 1, Row::new);
        }
        &mut self.rows[index]
    }

    pub async fn load<S: DocumentStore>(&mut self, store: &S) -> LoadOutcome {
        match self.fetch(store).await {
            Ok(outcome) => {
                info!(
                    collection = %self.config.collection,
                    found = outcome.found,
                    defaulted = outcome.defaulted,
                    "section loaded"
                );
                outcome
            }
            Err(e) => {
                error!(collection = %self.config.collection, error = %e, "fetch failed, showing defaults");
                self.reset();
                LoadOutcome {
                    defaulted: self.labels.len(),
                    failed: true,
                    ..LoadOutcome::default()
                }
            }
        }
    }

    async fn fetch<S: DocumentStore>(&mut self, store: &S) -> StoreResult<LoadOutcome> {
        let collection = self.config.collection.clone();
        let mut outcome = LoadOutcome::default();
        // a dynamic section that stored its row order shows exactly those rows
        let stored_order = if self.config.dynamic {
            store
                .get(&collection, ROW_ORDER_ID)
                .await?
                .and_then(|fields| order_labels(&fields))
        } else {
            None
        };
        let append_unlisted = self.config.dynamic && stored_order.is_none();
        let mut labels = stored_order.unwrap_or_else(|| self.config.labels.clone());
        let mut stored: Vec<Option<(Option<String>, Fields)>> = Vec::with_capacity(labels.len());

        match self.config.id_strategy {
            IdStrategy::Label => {
                for label in &labels {
                    let id = sanitize_id(label);
                    if is_sentinel(&id) {
                        stored.push(None);
                        continue;
                    }
                    stored.push(store.get(&collection, &id).await?.map(|f| (None, f)));
                }
                if append_unlisted {
                    let known: HashSet<String> = labels.iter().map(|l| sanitize_id(l)).collect();
                    for doc in store.list(&collection).await? {
                        if is_sentinel(&doc.id) || known.contains(&doc.id) {
                            continue;
                        }
                        labels.push(self.label_of(&doc));
                        stored.push(Some((None, doc.fields)));
                    }
                }
            }
            IdStrategy::Generated => {
                let mut docs: Vec<Option<Document>> = store
                    .list(&collection)
                    .await?
                    .into_iter()
                    .filter(|d| !is_sentinel(&d.id))
                    .map(Some)
                    .collect();

                for label in &labels {
                    let found = docs
                        .iter_mut()
                        .find(|d| matches!(d, Some(doc) if self.label_of(doc) == *label));
                    stored.push(found.and_then(Option::take).map(|d| (Some(d.id), d.fields)));
                }
                if append_unlisted {
                    for doc in docs.into_iter().flatten() {
                        labels.push(self.label_of(&doc));
                        stored.push(Some((Some(doc.id), doc.fields)));
                    }
                }
            }
        }

        let allowed = self.config.allowed_keys();
        let mut rows = Vec::with_capacity(labels.len());
        for (index, entry) in stored.into_iter().enumerate() {
            let row = match entry {
                Some((id, fields)) => {
                    let (mut row, dropped) = Row::from_fields(id, &fields, &allowed);
                    if !dropped.is_empty() {
                        debug!(collection = %collection, keys = ?dropped, "ignoring undeclared keys");
                        outcome.dropped_keys += dropped.len();
                    }
                    if let Some(label_column) = &self.config.label_column {
                        if !row.cells.contains_key(label_column) {
                            row.set(label_column, labels[index].as_str().into());
                        }
                    }
                    if let Some(rule) = &self.config.stock_rule {
                        rule.apply(&mut row);
                    }
                    outcome.found += 1;
                    row
                }
                None => {
                    outcome.defaulted += 1;
                    self.default_row_for(&labels[index])
                }
            };
            rows.push(row);
        }

        self.labels = labels;
        self.rows = rows;
        self.pending_deletes.clear();
        self.order_dirty = false;
        Ok(outcome)
    }

    fn label_of(&self, doc: &Document) -> String {
        self.config
            .label_column
            .as_ref()
            .and_then(|c| doc.fields.get(c))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| doc.id.clone())
    }

    fn default_row_for(&self, label: &str) -> Row {
        match self.config.labels.iter().position(|l| l == label) {
            Some(index) => self.config.default_row(index),
            None => self.blank_row(label),
        }
    }

    // row added at runtime: just the label
    fn blank_row(&self, label: &str) -> Row {
        let mut row = Row::new();
        if let Some(label_column) = &self.config.label_column {
            row.set(label_column, label.into());
        }
        row
    }

    /// Sets one cell and recomputes the derived stock column
    pub fn edit_cell(&mut self, index: usize, column: &str, value: CellValue) -> Result<()> {
        self.check_index(index)?;
        if !self.config.has_column(column) {
            return Err(Error::UnknownColumn {
                collection: self.config.collection.clone(),
                column: column.to_string(),
            }
            .into());
        }
        if !self.is_editable(column) {
            return Err(Error::ReadOnlyColumn {
                collection: self.config.collection.clone(),
                column: column.to_string(),
            }
            .into());
        }

        let rule = self.config.stock_rule.clone();
        let value = match &rule {
            Some(rule) if rule.is_numeric(column) => coerce_numeric(value),
            _ => value,
        };

        let row = self.row_mut(index);
        row.set(column, value);
        if let Some(rule) = rule.filter(|r| r.is_input(column)) {
            rule.apply(row);
        }
        Ok(())
    }

    /// Writes a signature image into a cell without persisting it.
    ///
    /// Only PNG data URLs are accepted; a signed cell cannot be cleared.
    pub fn set_signature(&mut self, index: usize, column: &str, data_url: String) -> Result<()> {
        self.check_index(index)?;
        if !data_url.starts_with(PNG_DATA_URL_PREFIX) {
            return Err(SignatureError::NotDataUrl.into());
        }
        if !self.config.columns.iter().any(|c| c == column) {
            return Err(Error::UnknownColumn {
                collection: self.config.collection.clone(),
                column: column.to_string(),
            }
            .into());
        }
        self.row_mut(index).set(column, CellValue::Text(data_url));
        Ok(())
    }

    /// Sets a signature and immediately upserts that one row
    pub async fn commit_signature<S: DocumentStore>(
        &mut self,
        store: &S,
        index: usize,
        column: &str,
        data_url: String,
    ) -> Result<String> {
        self.set_signature(index, column, data_url)?;
        self.save_row(store, index).await
    }

    /// Upserts one row; returns the document id it was written to
    pub async fn save_row<S: DocumentStore>(&mut self, store: &S, index: usize) -> Result<String> {
        self.check_index(index)?;
        let id = self.assign_id(index);
        let fields = self.row_mut(index).to_fields();
        store
            .put(&self.config.collection, &id, fields)
            .await
            .map_err(|source| ReportError::Write {
                collection: self.config.collection.clone(),
                id: id.clone(),
                source,
            })?;
        Ok(id)
    }

    // generated ids are kept on the row so the next save hits the same document
    fn assign_id(&mut self, index: usize) -> String {
        let label = self.labels[index].clone();
        let strategy = self.config.id_strategy;
        let row = self.row_mut(index);
        let id = resolve_document_id(row, &label, strategy);
        if strategy == IdStrategy::Generated {
            row.id = Some(id.clone());
        }
        id
    }

    /// Values other than the repeated label
    fn is_blank(&self, row: &Row) -> bool {
        row.cells
            .iter()
            .filter(|(k, _)| Some(*k) != self.config.label_column.as_ref())
            .all(|(_, v)| v.is_blank())
    }

    /// Upserts every row in order, one awaited write at a time.
    ///
    /// A failed write is recorded and the remaining rows are still written;
    /// rows already written stay written.
    pub async fn bulk_save<S: DocumentStore>(&mut self, store: &S) -> SaveReport {
        let collection = self.config.collection.clone();
        let mut report = SaveReport::default();

        for id in std::mem::take(&mut self.pending_deletes) {
            let result = store.delete(&collection, &id).await;
            if let Err(e) = &result {
                warn!(collection = %collection, id = %id, error = %e, "deferred delete failed");
            }
            report.writes.push(WriteOutcome::from_result(&collection, &id, &result));
        }

        self.rows.resize_with(self.labels.len(), Row::new);
        // skipped rows get no id, so a never-written row never names a document
        let mut ids: Vec<(usize, String)> = Vec::with_capacity(self.labels.len());
        for index in 0..self.labels.len() {
            if self.config.skip_empty_rows && self.is_blank(&self.rows[index]) {
                report.skipped += 1;
                continue;
            }
            ids.push((index, self.assign_id(index)));
        }
        for id in find_collisions(ids.iter().map(|(_, id)| id.as_str())) {
            warn!(collection = %collection, id = %id, "several rows resolve to one document id; the last one wins");
        }

        for (index, id) in &ids {
            let fields = self.rows[*index].to_fields();
            let result = store.put(&collection, id, fields).await;
            if let Err(e) = &result {
                warn!(collection = %collection, id = %id, error = %e, "row write failed");
            }
            report.writes.push(WriteOutcome::from_result(&collection, id, &result));
        }

        if self.order_dirty {
            let result = self.save_order(store).await;
            if let Err(e) = &result {
                warn!(collection = %collection, error = %e, "row order write failed");
            }
            report.writes.push(WriteOutcome::from_result(&collection, ROW_ORDER_ID, &result));
        }

        info!(
            collection = %collection,
            written = report.writes.iter().filter(|w| w.is_ok()).count(),
            failed = report.failures().count(),
            skipped = report.skipped,
            "bulk save finished"
        );
        report
    }

    /// Appends a row to a dynamic section
    pub fn add_row(&mut self, label: &str) -> Result<usize> {
        if !self.config.dynamic {
            return Err(Error::NotDynamic(self.config.collection.clone()).into());
        }
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Config("row label must not be empty".into()).into());
        }
        let id = sanitize_id(label);
        let clash = self.labels.iter().any(|l| l == label)
            || (self.config.id_strategy == IdStrategy::Label
                && (is_sentinel(&id) || self.labels.iter().any(|l| sanitize_id(l) == id)));
        if clash {
            return Err(Error::Config(format!("row '{}' already exists in {}", label, self.config.collection)).into());
        }

        let index = self.labels.len();
        self.rows.resize_with(index, Row::new);
        self.labels.push(label.to_string());
        let row = self.blank_row(label);
        self.rows.push(row);
        self.order_dirty = true;
        Ok(index)
    }

    /// Removes a row from a dynamic section
    pub async fn delete_row<S: DocumentStore>(
        &mut self,
        store: &S,
        index: usize,
        policy: DeletePolicy,
    ) -> Result<()> {
        if !self.config.dynamic {
            return Err(Error::NotDynamic(self.config.collection.clone()).into());
        }
        self.check_index(index)?;

        let id = self.document_id(index);
        self.labels.remove(index);
        if index < self.rows.len() {
            self.rows.remove(index);
        }
        self.order_dirty = true;

        match policy {
            DeletePolicy::Immediate => {
                if let Some(id) = id {
                    store
                        .delete(&self.config.collection, &id)
                        .await
                        .map_err(|source| ReportError::Write {
                            collection: self.config.collection.clone(),
                            id: id.clone(),
                            source,
                        })?;
                }
                self.save_order(store)
                    .await
                    .map_err(|source| ReportError::Write {
                        collection: self.config.collection.clone(),
                        id: ROW_ORDER_ID.to_string(),
                        source,
                    })?;
            }
            DeletePolicy::Deferred => self.pending_deletes.extend(id),
        }
        Ok(())
    }

    /// Stores the current row labels so added and deleted rows survive a reload
    async fn save_order<S: DocumentStore>(&mut self, store: &S) -> StoreResult<()> {
        let mut fields = Fields::new();
        fields.insert(
            ROW_ORDER_KEY.to_string(),
            Value::Array(self.labels.iter().cloned().map(Value::String).collect()),
        );
        store.put(&self.config.collection, ROW_ORDER_ID, fields).await?;
        self.order_dirty = false;
        Ok(())
    }
}

fn order_labels(fields: &Fields) -> Option<Vec<String>> {
    fields
        .get(ROW_ORDER_KEY)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use plant_report_common::stock::{StockRule, CLOSING_STOCK, CONSUMPTION, OPENING_STOCK};
    use serde_json::json;

    fn chemicals() -> SectionConfig {
        SectionConfig::new(
            "Chemicals",
            "chem",
            &["PM3601 (25Kg)", "Biocide AQ"],
            &[OPENING_STOCK, CONSUMPTION, CLOSING_STOCK],
        )
        .with_label_column("Product Name")
        .with_stock_rule(StockRule::default())
        .with_default_rows(vec![
            Row::new().with_cell(OPENING_STOCK, 100.0),
            Row::new().with_cell(OPENING_STOCK, 200.0),
        ])
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_seeds_defaults() {
        let table = RecordTable::new(chemicals());
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].get(CLOSING_STOCK), Some(&CellValue::Number(200.0)));
    }

    #[test]
    fn test_edit_recomputes_closing() {
        let mut table = RecordTable::new(chemicals());
        table.edit_cell(0, CONSUMPTION, CellValue::text("35")).unwrap();

        let row = &table.rows()[0];
        assert_eq!(row.get(CONSUMPTION), Some(&CellValue::Number(35.0)));
        assert_eq!(row.get(CLOSING_STOCK), Some(&CellValue::Number(65.0)));

        table.edit_cell(0, OPENING_STOCK, CellValue::text("80")).unwrap();
        assert_eq!(table.rows()[0].get(CLOSING_STOCK), Some(&CellValue::Number(45.0)));
    }

    #[test]
    fn test_edit_derived_column_rejected() {
        let mut table = RecordTable::new(chemicals());
        let err = table.edit_cell(0, CLOSING_STOCK, CellValue::text("1")).unwrap_err();
        assert!(matches!(err, ReportError::Common(Error::ReadOnlyColumn { .. })));
        assert!(!table.is_editable(CLOSING_STOCK));
        assert!(!table.is_editable("Product Name"));
    }

    #[test]
    fn test_edit_out_of_range_and_unknown_column() {
        let mut table = RecordTable::new(chemicals());
        let err = table.edit_cell(2, CONSUMPTION, CellValue::text("1")).unwrap_err();
        assert!(matches!(err, ReportError::Common(Error::RowOutOfRange { index: 2, len: 2, .. })));

        let err = table.edit_cell(0, "Colour", CellValue::text("red")).unwrap_err();
        assert!(matches!(err, ReportError::Common(Error::UnknownColumn { .. })));
    }

    #[test]
    fn test_unparseable_consumption_counts_as_zero() {
        let mut table = RecordTable::new(chemicals());
        table.edit_cell(1, CONSUMPTION, CellValue::text("a few")).unwrap();
        let row = &table.rows()[1];
        assert_eq!(row.get(CONSUMPTION), Some(&CellValue::text("a few")));
        assert_eq!(row.get(CLOSING_STOCK), Some(&CellValue::Number(200.0)));
    }

    #[tokio::test]
    async fn test_load_by_key_ignores_list_order() {
        let store = MemoryStore::new();
        // stored in reverse order, plus a sentinel document
        store.put("chem", "technicianInfo", fields(json!({"name": "Ali"}))).await.unwrap();
        store
            .put("chem", "Biocide_AQ", fields(json!({"Opening Stock (Kg)": 50, "Consumption (Kg)": 5})))
            .await
            .unwrap();
        store
            .put("chem", "PM3601__25Kg_", fields(json!({"Opening Stock (Kg)": 10, "legacy": true})))
            .await
            .unwrap();

        let mut table = RecordTable::new(chemicals());
        let outcome = table.load(&store).await;

        assert_eq!(outcome.found, 2);
        assert_eq!(outcome.dropped_keys, 1);
        assert!(!outcome.failed);
        assert_eq!(table.rows()[0].get(OPENING_STOCK), Some(&CellValue::Number(10.0)));
        assert_eq!(table.rows()[1].get(CLOSING_STOCK), Some(&CellValue::Number(45.0)));
        assert_eq!(table.rows()[1].get("Product Name"), Some(&CellValue::text("Biocide AQ")));
    }

    #[tokio::test]
    async fn test_load_missing_rows_use_defaults() {
        let store = MemoryStore::new();
        store
            .put("chem", "Biocide_AQ", fields(json!({"Opening Stock (Kg)": 50})))
            .await
            .unwrap();

        let mut table = RecordTable::new(chemicals());
        let outcome = table.load(&store).await;
        assert_eq!(outcome.found, 1);
        assert_eq!(outcome.defaulted, 1);
        assert_eq!(table.rows()[0].get(OPENING_STOCK), Some(&CellValue::Number(100.0)));
    }

    #[tokio::test]
    async fn test_commit_signature_writes_row() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("CW", "cw", &["Sunday", "Monday"], &["Action", "Signature"]);
        let mut table = RecordTable::new(config);

        let id = table
            .commit_signature(&store, 1, "Signature", "data:image/png;base64,AAAA".to_string())
            .await
            .unwrap();

        assert_eq!(id, "Monday");
        let doc = store.get("cw", "Monday").await.unwrap().unwrap();
        assert_eq!(doc["Signature"], json!("data:image/png;base64,AAAA"));
        assert_eq!(store.count("cw"), 1);
    }

    #[tokio::test]
    async fn test_generated_ids_are_reused() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("CHW", "chw", &["18/10/2026"], &["Day", "Conductivity"])
            .with_label_column("Day")
            .with_id_strategy(IdStrategy::Generated);
        let mut table = RecordTable::new(config.clone());
        assert_eq!(table.document_id(0), None);

        table.edit_cell(0, "Conductivity", CellValue::text("850")).unwrap();
        assert!(table.bulk_save(&store).await.is_success());
        let id = table.document_id(0).unwrap();
        assert!(table.bulk_save(&store).await.is_success());
        assert_eq!(store.count("chw"), 1);

        let mut reloaded = RecordTable::new(config);
        reloaded.load(&store).await;
        assert_eq!(reloaded.document_id(0), Some(id));
        assert_eq!(reloaded.rows()[0].get("Conductivity"), Some(&CellValue::text("850")));
    }

    #[tokio::test]
    async fn test_dynamic_rows_add_delete_and_skip_blank() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("CT", "ct", &["Hydrochloric Acid (25Kg)"], &["Jerry Cans"])
            .with_label_column("Product Name")
            .dynamic();
        let mut table = RecordTable::new(config.clone());

        let index = table.add_row("Citric Acid").unwrap();
        assert_eq!(index, 1);
        assert_eq!(table.row_label(1), Some("Citric Acid"));
        assert_eq!(table.row_index("Citric Acid"), Some(1));
        assert!(table.add_row("Citric Acid").is_err());
        table.edit_cell(index, "Jerry Cans", CellValue::text("4")).unwrap();

        let report = table.bulk_save(&store).await;
        assert_eq!(report.skipped, 1);
        let written: Vec<&str> = report.writes.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(written, vec!["Citric_Acid", ROW_ORDER_ID]);

        let mut reloaded = RecordTable::new(config.clone());
        reloaded.load(&store).await;
        assert_eq!(reloaded.labels(), &["Hydrochloric Acid (25Kg)".to_string(), "Citric Acid".to_string()]);

        reloaded.delete_row(&store, 1, DeletePolicy::Deferred).await.unwrap();
        assert_eq!(store.count("ct"), 2);
        assert!(reloaded.bulk_save(&store).await.is_success());
        assert_eq!(store.get("ct", "Citric_Acid").await.unwrap(), None);
        assert_eq!(store.count("ct"), 1);
    }

    #[tokio::test]
    async fn test_deleted_configured_row_stays_deleted() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("CT", "ct", &["PM 1500 (25Kg)", "BD 350 (30Kg)"], &["Jerry Cans"])
            .with_label_column("Product Name")
            .dynamic();
        let mut table = RecordTable::new(config.clone());
        table.edit_cell(0, "Jerry Cans", CellValue::text("2")).unwrap();
        table.edit_cell(1, "Jerry Cans", CellValue::text("3")).unwrap();
        assert!(table.bulk_save(&store).await.is_success());

        table.delete_row(&store, 0, DeletePolicy::Immediate).await.unwrap();
        let mut reloaded = RecordTable::new(config.clone());
        reloaded.load(&store).await;
        assert_eq!(reloaded.labels(), &["BD 350 (30Kg)".to_string()]);

        reloaded.delete_row(&store, 0, DeletePolicy::Deferred).await.unwrap();
        assert!(reloaded.bulk_save(&store).await.is_success());
        let mut emptied = RecordTable::new(config);
        let outcome = emptied.load(&store).await;
        assert!(emptied.is_empty());
        assert_eq!(outcome.found, 0);
    }

    #[tokio::test]
    async fn test_skipped_blank_row_gets_no_generated_id() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("CT", "ct", &["Citric Acid"], &["Jerry Cans"])
            .with_label_column("Product Name")
            .with_id_strategy(IdStrategy::Generated)
            .dynamic();
        let mut table = RecordTable::new(config);

        let report = table.bulk_save(&store).await;
        assert_eq!(report.skipped, 1);
        assert!(report.writes.is_empty());
        assert_eq!(table.document_id(0), None);

        table.delete_row(&store, 0, DeletePolicy::Deferred).await.unwrap();
        let report = table.bulk_save(&store).await;
        let written: Vec<&str> = report.writes.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(written, vec![ROW_ORDER_ID]);
    }

    #[tokio::test]
    async fn test_colliding_ids_last_write_wins() {
        let store = MemoryStore::new();
        let config = SectionConfig::new("Readings", "readings", &["PM 3601", "PM-3601"], &["Qty"]);
        let mut table = RecordTable::new(config);
        table.edit_cell(0, "Qty", CellValue::text("1")).unwrap();
        table.edit_cell(1, "Qty", CellValue::text("2")).unwrap();

        let report = table.bulk_save(&store).await;
        assert!(report.is_success());
        assert_eq!(report.writes.len(), 2);
        assert_eq!(store.count("readings"), 1);
        let doc = store.get("readings", "PM_3601").await.unwrap().unwrap();
        assert_eq!(doc["Qty"], json!("2"));
    }

    #[test]
    fn test_set_signature_requires_png_data_url() {
        let config = SectionConfig::new("CW", "cw", &["Sunday"], &["Action", "Signature"]);
        let mut table = RecordTable::new(config);
        table
            .set_signature(0, "Signature", format!("{}AAAA", PNG_DATA_URL_PREFIX))
            .unwrap();

        let err = table.set_signature(0, "Signature", String::new()).unwrap_err();
        assert!(matches!(err, ReportError::Signature(SignatureError::NotDataUrl)));
        assert_eq!(
            table.rows()[0].get("Signature"),
            Some(&CellValue::text(format!("{}AAAA", PNG_DATA_URL_PREFIX)))
        );
    }

    #[tokio::test]
    async fn test_fixed_section_rejects_row_changes() {
        let store = MemoryStore::new();
        let mut table = RecordTable::new(chemicals());
        assert!(matches!(table.add_row("New"), Err(ReportError::Common(Error::NotDynamic(_)))));
        assert!(table.delete_row(&store, 0, DeletePolicy::Immediate).await.is_err());
    }
}

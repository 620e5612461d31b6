//! Interactive cell entry
//!
//! Walks the editable cells of one section row by row and prompts for each
//! value. Blank input keeps the current value.

use crate::controller::SectionController;
use crate::error::{ReportError, Result};
use crate::store::DocumentStore;
use crate::table::RecordTable;
use dialoguer::Input;
use plant_report_common::CellValue;

/// What the user typed at a cell prompt
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction {
    Value(String),
    /// Leave the cell as it is
    Keep,
    /// Skip the rest of this row
    SkipRow,
    /// Stop entering
    Quit,
}

pub fn parse_entry(input: &str) -> EntryAction {
    match input.trim() {
        "" => EntryAction::Keep,
        "/s" => EntryAction::SkipRow,
        "/q" => EntryAction::Quit,
        value => EntryAction::Value(value.to_string()),
    }
}

/// Columns a user types into, in display order
pub fn editable_columns(table: &RecordTable) -> Vec<String> {
    table
        .config()
        .columns
        .iter()
        .filter(|c| table.is_editable(c))
        .cloned()
        .collect()
}

/// Runs the prompt loop; returns the number of cells changed
pub fn run_interactive_entry<S: DocumentStore>(
    controller: &mut SectionController<S>,
    collection: &str,
) -> Result<usize> {
    let table = controller.table(collection)?;
    let columns = editable_columns(table);
    let labels = table.labels().to_vec();
    let title = table.config().title.clone();

    if columns.is_empty() {
        println!("{} has no editable columns", title);
        return Ok(0);
    }

    println!("{} ({} rows)", title, labels.len());
    println!("---");
    println!("Enter: keep current value  /s: skip row  /q: finish");
    println!("---\n");

    let mut changed = 0;
    'rows: for (index, label) in labels.iter().enumerate() {
        println!("[{}/{}] {}", index + 1, labels.len(), label);

        for column in &columns {
            let current = controller
                .table(collection)?
                .row(index)
                .and_then(|r| r.get(column))
                .map(|v| v.to_string())
                .unwrap_or_default();

            match prompt_cell(column, &current)? {
                EntryAction::Value(value) => {
                    controller.edit_cell(collection, index, column, CellValue::text(value))?;
                    changed += 1;
                }
                EntryAction::Keep => {}
                EntryAction::SkipRow => break,
                EntryAction::Quit => break 'rows,
            }
        }

        if let Some(derived) = controller.table(collection)?.config().derived_column() {
            if let Some(value) = controller.table(collection)?.row(index).and_then(|r| r.get(derived)) {
                println!("  {} = {}", derived, value);
            }
        }
        println!();
    }

    Ok(changed)
}

fn prompt_cell(column: &str, current: &str) -> Result<EntryAction> {
    let prompt = if current.is_empty() {
        column.to_string()
    } else {
        format!("{} [{}]", column, current)
    };

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| ReportError::Prompt(e.to_string()))?;

    Ok(parse_entry(&input))
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plant-report")]
#[command(about = "Weekly water treatment plant report entry", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store directory (overrides config and PLANT_REPORT_STORE)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the report sections
    Sections,

    /// Show the rows of a section
    Show {
        /// Section collection, e.g. condenserChemicals1
        #[arg(required = true)]
        collection: String,
    },

    /// Set one cell and save the report
    Set {
        #[arg(required = true)]
        collection: String,

        /// Row label or 1-based row number
        #[arg(required = true)]
        row: String,

        #[arg(required = true)]
        column: String,

        #[arg(required = true)]
        value: String,
    },

    /// Enter a section's values interactively
    Enter {
        #[arg(required = true)]
        collection: String,
    },

    /// Sign a row or a section's technician slot from a stroke file
    Sign {
        #[arg(required = true)]
        collection: String,

        /// Row label or 1-based row number
        #[arg(long, conflicts_with = "technician", required_unless_present = "technician")]
        row: Option<String>,

        /// Sign the technician slot instead of a row
        #[arg(long)]
        technician: bool,

        /// JSON strokes: [[[x, y], ...], ...]
        #[arg(long, required = true)]
        strokes: PathBuf,
    },

    /// Set the technician name of a section
    Technician {
        #[arg(required = true)]
        collection: String,

        #[arg(required = true)]
        name: String,
    },

    /// Add or delete rows of a product list
    Row {
        #[command(subcommand)]
        action: RowAction,
    },

    /// Manage report notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Show or edit the report header
    Meta {
        /// Plant name
        #[arg(long)]
        plant: Option<String>,

        /// Any date of the report week (YYYY-MM-DD)
        #[arg(long)]
        week: Option<String>,
    },

    /// Save every section and side document
    Submit,

    /// Delete every stored document and start a new report
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show or edit settings
    Config {
        /// Show settings
        #[arg(long)]
        show: bool,

        /// Set the store directory
        #[arg(long)]
        set_store: Option<PathBuf>,

        /// Set the default plant name
        #[arg(long)]
        set_plant: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RowAction {
    /// Append a row
    Add {
        /// Section collection, e.g. coolingTowerChemicals1
        #[arg(required = true)]
        collection: String,

        #[arg(required = true)]
        label: String,
    },

    /// Delete a row
    Delete {
        #[arg(required = true)]
        collection: String,

        /// Row label or 1-based row number
        #[arg(required = true)]
        row: String,

        /// Remove the stored document with the next save instead of now
        #[arg(long)]
        deferred: bool,
    },
}

#[derive(Subcommand)]
pub enum NoteAction {
    /// Append a note
    Add {
        #[arg(required = true)]
        text: String,
    },

    /// Delete a note by its 1-based number
    Delete {
        #[arg(required = true)]
        number: usize,
    },

    /// List notes
    List,

    /// Sign the notes from a stroke file
    Sign {
        /// Name of the signer
        #[arg(long)]
        name: Option<String>,

        #[arg(long, required = true)]
        strokes: PathBuf,
    },
}

/// Resolves a row given as a label or a 1-based number
pub fn resolve_row(labels: &[String], row: &str) -> Option<usize> {
    if let Some(index) = labels.iter().position(|l| l == row) {
        return Some(index);
    }
    match row.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= labels.len() => Some(n - 1),
        _ => None,
    }
}

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use dialoguer::Confirm;
use plant_report::cli::{self, Cli, Commands, NoteAction, RowAction};
use plant_report::config::Config;
use plant_report::controller::SectionController;
use plant_report::table::DeletePolicy;
use plant_report::documents::{self, ReportMeta};
use plant_report::entry;
use plant_report::signature::{SignaturePad, SignatureTarget};
use plant_report::store::{DocumentStore, FileStore};
use plant_report_common::{CellValue, ReportLayout, SIGNATURE_COLUMN};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load()?;

    if let Commands::Config { show, set_store, set_plant } = &cli.command {
        if let Some(dir) = set_store {
            config.set_store_dir(dir.clone())?;
            println!("✔ Store directory set: {}", dir.display());
        }
        if let Some(name) = set_plant {
            config.set_plant_name(name.clone())?;
            println!("✔ Plant name set: {}", config.plant_name);
        }
        if *show || (set_store.is_none() && set_plant.is_none()) {
            println!("Settings:");
            println!("  Config file: {}", Config::config_path()?.display());
            println!("  Store: {}", config.store_dir()?.display());
            println!("  Plant: {}", config.plant_name);
            println!("  Report title: {}", config.report_title);
        }
        return Ok(());
    }

    let store_dir = match &cli.store {
        Some(dir) => dir.clone(),
        None => config.store_dir()?,
    };
    tracing::debug!(store = %store_dir.display(), "opening store");
    let store = FileStore::new(store_dir);

    let stored_meta = documents::load_meta(&store).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "report metadata unreadable");
        None
    });
    let meta = stored_meta
        .clone()
        .unwrap_or_else(|| ReportMeta::new(&config.plant_name, chrono::Local::now().date_naive()));

    let layout = ReportLayout::weekly(&meta.report_date_label());
    let mut controller = SectionController::new(store, layout)?;
    controller.load_all().await;
    if stored_meta.is_none() {
        controller.set_plant_name(&config.plant_name)?;
    }

    match cli.command {
        Commands::Sections => {
            println!("{}", config.report_title);
            println!("{}\n", controller.meta().week_label());
            for table in controller.tables() {
                println!(
                    "  {:<24} {} ({} rows)",
                    table.collection(),
                    table.config().title,
                    table.len()
                );
            }
        }

        Commands::Show { collection } => {
            print_section(&controller, &collection)?;
        }

        Commands::Set { collection, row, column, value } => {
            let index = row_index(&controller, &collection, &row)?;
            controller.edit_cell(&collection, index, &column, CellValue::text(value))?;
            submit(&mut controller).await?;
            print_section(&controller, &collection)?;
        }

        Commands::Enter { collection } => {
            let changed = entry::run_interactive_entry(&mut controller, &collection)?;
            println!("✔ {} cells changed", changed);
            if changed > 0 {
                submit(&mut controller).await?;
            }
        }

        Commands::Sign { collection, row, technician, strokes } => {
            let pad = read_strokes(&strokes)?;
            let target = if technician {
                SignatureTarget::Technician { collection }
            } else {
                let row = row.context("--row or --technician is required")?;
                let index = row_index(&controller, &collection, &row)?;
                SignatureTarget::Cell {
                    collection,
                    row: index,
                    column: SIGNATURE_COLUMN.to_string(),
                }
            };
            let target = controller.sign(target, pad).await?;
            println!("✔ Signed {}", target);
        }

        Commands::Technician { collection, name } => {
            controller.set_technician_name(&collection, &name)?;
            submit(&mut controller).await?;
            println!("✔ Technician for {}: {}", collection, name.trim());
        }

        Commands::Row { action } => match action {
            RowAction::Add { collection, label } => {
                let index = controller.add_row(&collection, &label)?;
                submit(&mut controller).await?;
                println!("✔ Added row {}: {}", index + 1, label.trim());
            }
            RowAction::Delete { collection, row, deferred } => {
                let index = row_index(&controller, &collection, &row)?;
                let label = controller
                    .table(&collection)?
                    .row_label(index)
                    .unwrap_or_default()
                    .to_string();
                let policy = if deferred { DeletePolicy::Deferred } else { DeletePolicy::Immediate };
                controller.delete_row(&collection, index, policy).await?;
                submit(&mut controller).await?;
                println!("✔ Deleted row: {}", label);
            }
        },

        Commands::Note { action } => match action {
            NoteAction::Add { text } => {
                if !controller.add_note(&text) {
                    bail!("note is empty");
                }
                submit(&mut controller).await?;
                print_notes(&controller);
            }
            NoteAction::Delete { number } => {
                let removed = number
                    .checked_sub(1)
                    .and_then(|index| controller.delete_note(index))
                    .with_context(|| format!("no note number {}", number))?;
                submit(&mut controller).await?;
                println!("✔ Deleted: {}", removed);
            }
            NoteAction::List => print_notes(&controller),
            NoteAction::Sign { name, strokes } => {
                let pad = read_strokes(&strokes)?;
                if let Some(name) = name {
                    controller.set_notes_name(&name);
                }
                controller.sign(SignatureTarget::Notes, pad).await?;
                println!("✔ Notes signed");
            }
        },

        Commands::Meta { plant, week } => {
            let changed = plant.is_some() || week.is_some();
            if let Some(plant) = plant {
                controller.set_plant_name(&plant)?;
            }
            if let Some(week) = week {
                let date = NaiveDate::parse_from_str(&week, "%Y-%m-%d")
                    .with_context(|| format!("invalid date: {}", week))?;
                controller.set_week_commencing(date);
            }
            if changed {
                submit(&mut controller).await?;
            }
            let meta = controller.meta();
            println!("Plant Name: {}", meta.plant_name);
            println!("{}", meta.week_label());
            println!("Report date: {}", meta.report_date_label());
        }

        Commands::Submit => {
            submit(&mut controller).await?;
        }

        Commands::Clear { yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Delete every stored document of this report?")
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Cancelled");
                return Ok(());
            }
            let removed = controller.clear_all().await?;
            println!("✔ Removed {} documents", removed);
        }

        Commands::Config { .. } => unreachable!("handled before the store is opened"),
    }

    Ok(())
}

async fn submit<S: DocumentStore>(controller: &mut SectionController<S>) -> anyhow::Result<()> {
    let report = controller.submit_all().await;
    for failure in report.failures() {
        println!(
            "✗ {}/{}: {}",
            failure.collection,
            failure.id,
            failure.error.as_deref().unwrap_or_default()
        );
    }
    let report = report.into_result()?;
    println!("✔ Saved {} documents", report.attempted());
    Ok(())
}

fn row_index<S: DocumentStore>(
    controller: &SectionController<S>,
    collection: &str,
    row: &str,
) -> anyhow::Result<usize> {
    let table = controller.table(collection)?;
    cli::resolve_row(table.labels(), row)
        .with_context(|| format!("no row '{}' in {}", row, collection))
}

fn read_strokes(path: &Path) -> anyhow::Result<SignaturePad> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(SignaturePad::from_json(&content)?)
}

fn print_section<S: DocumentStore>(
    controller: &SectionController<S>,
    collection: &str,
) -> anyhow::Result<()> {
    let table = controller.table(collection)?;
    let config = table.config();
    println!("{} ({})", config.title, config.collection);

    for (index, label) in table.labels().iter().enumerate() {
        let cells: Vec<String> = config
            .columns
            .iter()
            .map(|c| {
                let value = table
                    .row(index)
                    .and_then(|r| r.get(c))
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                format!("{}={}", c, value)
            })
            .collect();
        println!("  {:>2}. {:<40} {}", index + 1, label, cells.join("  "));
    }

    if let Some(info) = controller.technician(collection) {
        println!(
            "  Technician: {} {}",
            if info.name.is_empty() { "-" } else { info.name.as_str() },
            if info.is_signed() { "[signed]" } else { "" }
        );
    }
    Ok(())
}

fn print_notes<S: DocumentStore>(controller: &SectionController<S>) {
    let notes = controller.notes();
    if notes.notes.is_empty() {
        println!("No notes");
    }
    for (index, note) in notes.notes.iter().enumerate() {
        println!("  {}. {}", index + 1, note);
    }
    if !notes.name.is_empty() || !notes.signature.is_empty() {
        println!(
            "  Signed by: {} {}",
            notes.name,
            if notes.signature.is_empty() { "" } else { "[signed]" }
        );
    }
}

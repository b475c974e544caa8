//! History command implementation.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use leafid_core::{BackendFactory, Config, HistoryRef, Identification, PlantBackend, RemoveOutcome};
use tracing::debug;

use crate::exit_codes::UsageError;
use crate::utils::{format_confidence, format_timestamp, print_record};

async fn open(config: &Config) -> Result<std::sync::Arc<dyn PlantBackend>> {
    BackendFactory::create(config)
        .await
        .context("Failed to open history backend")
}

/// List records newest first, numbered by their position in the full
/// history so the numbers work with `history remove`.
pub async fn list(config: &Config, search: Option<String>, json: bool, quiet: bool) -> Result<()> {
    let backend = open(config).await?;
    let search = search.filter(|s| !s.trim().is_empty());

    let records = backend
        .list(search.as_deref())
        .await
        .context("Failed to load history")?;

    if json {
        let out = serde_json::to_string_pretty(&records).context("Failed to serialize history")?;
        println!("{out}");
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    if records.is_empty() {
        match &search {
            Some(term) => println!("{}", format!("No plants match '{term}'").yellow()),
            None => println!("{}", "No identifications yet".yellow()),
        }
        return Ok(());
    }

    let full = match &search {
        Some(_) => backend.list(None).await.context("Failed to load history")?,
        None => records.clone(),
    };

    for record in &records {
        let index = full.iter().position(|r| r.id == record.id);
        print_row(index, record);
    }

    println!();
    println!(
        "{}",
        format!("{} of {} record(s)", records.len(), full.len()).dimmed()
    );
    Ok(())
}

fn print_row(index: Option<usize>, record: &Identification) {
    let index = index.map_or_else(|| "-".to_string(), |i| i.to_string());
    println!(
        "{:>3}  {}  {} {}  {}",
        index.cyan(),
        format_timestamp(record.timestamp).dimmed(),
        record.plant_name.bold(),
        format!("({})", record.scientific_name).italic(),
        format_confidence(record.confidence)
    );
}

/// Show one record by id or list position.
pub async fn show(config: &Config, target: String, json: bool) -> Result<()> {
    let backend = open(config).await?;

    let record = match target.parse::<HistoryRef>()? {
        HistoryRef::Id(id) => backend.get(&id).await?,
        HistoryRef::Index(i) => backend.list(None).await?.into_iter().nth(i),
    }
    .ok_or_else(|| anyhow!("No identification found for '{target}'"))?;

    if json {
        let out = serde_json::to_string_pretty(&record).context("Failed to serialize record")?;
        println!("{out}");
    } else {
        println!();
        print_record(&record);
    }
    Ok(())
}

/// Remove one record. An unknown reference is reported, not an error.
pub async fn remove(config: &Config, target: String, quiet: bool) -> Result<()> {
    let backend = open(config).await?;
    let target: HistoryRef = target.parse()?;

    let outcome = backend
        .remove(target.clone())
        .await
        .context("Failed to remove identification")?;
    debug!(target = %target, outcome = ?outcome, "Remove finished");

    if !quiet {
        match outcome {
            RemoveOutcome::Removed => {
                println!("{}", "Removed from history".green());
            }
            RemoveOutcome::NotFound => {
                println!("{}", format!("Nothing to remove for {target}").yellow());
            }
        }
    }
    Ok(())
}

pub async fn clear(config: &Config, yes: bool, quiet: bool) -> Result<()> {
    if !yes {
        return Err(UsageError("Refusing to clear history without --yes".to_string()).into());
    }

    let backend = open(config).await?;
    backend.clear().await.context("Failed to clear history")?;

    if !quiet {
        println!("{}", "History cleared".green());
    }
    Ok(())
}

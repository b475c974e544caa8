//! Identify command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use leafid_core::{ApiKey, BackendFactory, Config, ImageIngest, ImageUpload, PlantBackend};
use tracing::{debug, info};

use crate::utils::print_record;

/// Execute the identify command.
///
/// The photo and key are checked before any backend is opened.
pub async fn execute(
    config: &Config,
    file: PathBuf,
    api_key: Option<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let upload = ImageUpload::from_path(&file)
        .await
        .with_context(|| format!("Failed to read image: {}", file.display()))?;
    info!(path = %file.display(), bytes = upload.data.len(), "Read image");

    let staged = ImageIngest::new(config.max_image_bytes)
        .stage(upload)
        .await
        .context("Image rejected")?;
    let (width, height) = staged.dimensions();
    debug!(mime = staged.mime_type(), width, height, "Image staged");

    let api_key = ApiKey::new(api_key.unwrap_or_default())?;

    let backend = BackendFactory::create(config)
        .await
        .context("Failed to open history backend")?;

    if !quiet && !json {
        eprintln!("{}", "Identifying plant...".dimmed());
    }
    let record = backend
        .identify(&staged, &api_key)
        .await
        .context("Identification failed")?;

    if json {
        let out = serde_json::to_string_pretty(&record).context("Failed to serialize result")?;
        println!("{out}");
    } else if !quiet {
        println!();
        println!("{}", "Plant identified successfully!".green().bold());
        println!();
        print_record(&record);
    }

    Ok(())
}

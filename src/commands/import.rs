use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use leadpulse::storage::{create_sqlite_repository, parse_leads_csv};

/// Replace the store's leads with the rows of a CSV export
pub async fn import(csv_path: &Path, db_path: PathBuf) -> Result<()> {
    println!("Importing leads");
    println!("===============");
    println!("  Source: {}", csv_path.display());
    println!("  Store: {}", db_path.display());
    println!();

    let file = File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;

    let report = parse_leads_csv(file, &mut rand::thread_rng())
        .with_context(|| format!("Failed to read leads from {}", csv_path.display()))?;

    tracing::info!(
        accepted = report.leads.len(),
        incomplete = report.skipped_incomplete,
        duplicates = report.skipped_duplicate,
        "parsed CSV export"
    );

    let repository = create_sqlite_repository(&db_path)
        .with_context(|| format!("Failed to open lead store at {}", db_path.display()))?;
    let written = repository
        .replace_all(&report.leads)
        .await
        .context("Failed to save imported leads")?;

    println!("Successfully imported {written} leads");
    if report.skipped_incomplete > 0 {
        println!("  Skipped (missing name or mobile): {}", report.skipped_incomplete);
    }
    if report.skipped_duplicate > 0 {
        println!("  Skipped (duplicate name): {}", report.skipped_duplicate);
    }
    Ok(())
}

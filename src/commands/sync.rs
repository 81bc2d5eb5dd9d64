use anyhow::{bail, Context, Result};
use std::path::Path;

use leadpulse::storage::{create_sqlite_repository, sync_stores};

/// Copy all leads from one SQLite store into another, replacing its contents
pub async fn sync(source: &Path, target: &Path) -> Result<()> {
    if source == target {
        bail!("Source and target are the same store: {}", source.display());
    }
    if !source.exists() {
        bail!("Source store does not exist: {}", source.display());
    }

    let source_repo = create_sqlite_repository(source)
        .with_context(|| format!("Failed to open source store {}", source.display()))?;
    let target_repo = create_sqlite_repository(target)
        .with_context(|| format!("Failed to open target store {}", target.display()))?;

    let copied = sync_stores(source_repo.as_ref(), target_repo.as_ref())
        .await
        .context("Sync failed")?;

    println!(
        "Synced {copied} leads from {} to {}",
        source.display(),
        target.display()
    );
    Ok(())
}

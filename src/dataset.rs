//! Builds a [`Dataset`] from a directory of raw text documents.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::utils::clean_line;
use crate::Dataset;

/// Reads every regular file in `raw_dir` into a [`Dataset`].
///
/// Documents are keyed by file name and inserted in file-name order, so the
/// same directory always yields the same dataset (and the same partitions).
/// Lines are cleaned with [`clean_line`]. Blank lines are dropped, but a
/// line made only of non-ASCII text is kept as an empty string.
pub async fn load_dataset(raw_dir: impl AsRef<Path>) -> Result<Dataset> {
    let raw_dir = raw_dir.as_ref();
    let mut listing = fs::read_dir(raw_dir)
        .await
        .with_context(|| format!("listing raw input directory {}", raw_dir.display()))?;
    let mut entries = Vec::new();
    while let Some(entry) = listing.next_entry().await? {
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut dataset = Dataset::new();
    for entry in entries {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes = fs::read(entry.path())
            .await
            .with_context(|| format!("reading document {}", entry.path().display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<String> = text.lines().filter_map(clean_line).collect();
        debug!(document = %name, lines = lines.len(), "loaded document");
        dataset.insert(name, lines);
    }
    Ok(dataset)
}

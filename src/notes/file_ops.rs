//! File operations for the notes system.
//!
//! Async listing and naming helpers shared by the link rewriter and the
//! batch mutator. Hidden entries (`.obsidian`, backup directories) are
//! never listed.

use std::path::{Path, PathBuf};
use tokio::io;

/// Slugify a title for use as a filename
/// (e.g. "x402 Payment Protocol" -> "x402-payment-protocol").
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join("-")
}

/// List all markdown files under `notes_dir` recursively, skipping hidden
/// files and directories. Returns absolute paths.
pub async fn list_notes(notes_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !tokio::fs::try_exists(notes_dir).await.unwrap_or(false) {
        return Ok(files);
    }

    let mut dirs_to_visit = vec![notes_dir.to_path_buf()];
    while let Some(dir) = dirs_to_visit.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(false);
            if hidden {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                dirs_to_visit.push(path);
            } else if path.extension().map(|e| e == "md").unwrap_or(false) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Relative path of `file_path` inside `notes_dir`, as a string.
pub fn relative_path(notes_dir: &Path, file_path: &Path) -> Option<String> {
    file_path
        .strip_prefix(notes_dir)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

/// Extension-less base name of a note, the identity wikilinks match on.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

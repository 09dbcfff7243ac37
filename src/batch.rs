//! Vault-wide tag rename.
//!
//! Snapshot first, then mutate in fixed-size batches with concurrent
//! per-note fan-out. A per-note failure is recorded and never aborts
//! sibling notes or later batches; the whole operation raises only when
//! it achieved zero successes and has at least one failure.

use chrono::Local;
use futures_util::future::join_all;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};
use crate::notes::tags::{self, TagRename};
use crate::notes::{file_ops, parse_note, stringify_note};
use crate::paths::VAULT_CONFIG_DIR;
use crate::types::{BatchFailure, BatchReport};

/// Vault-relative location of the saved-search document.
const SAVED_SEARCH_FILE: &str = "search.json";

/// Default number of notes mutated concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct RenameTagOptions {
    /// Normalize tags before comparing.
    pub normalize: bool,
    /// Notes per concurrent batch.
    pub batch_size: usize,
    /// Snapshot the whole vault before mutating anything.
    pub create_backup: bool,
}

impl Default for RenameTagOptions {
    fn default() -> Self {
        RenameTagOptions {
            normalize: true,
            batch_size: DEFAULT_BATCH_SIZE,
            create_backup: true,
        }
    }
}

/// One note successfully rewritten, with every rename performed in it.
#[derive(Debug, Serialize)]
pub struct NoteRenameOutcome {
    pub path: String,
    pub renames: Vec<TagRename>,
}

/// Rename `old_tag` (and its strict descendants, prefix-substituted) to
/// `new_tag` across every note in the vault.
pub async fn rename_tag(
    vault_root: &Path,
    old_tag: &str,
    new_tag: &str,
    opts: &RenameTagOptions,
) -> Result<BatchReport<NoteRenameOutcome>> {
    // Validated before any mutation.
    if !tags::validate_tag(old_tag) {
        return Err(VaultError::InvalidTag(old_tag.to_string()));
    }
    if !tags::validate_tag(new_tag) {
        return Err(VaultError::InvalidTag(new_tag.to_string()));
    }

    let files = file_ops::list_notes(vault_root).await?;
    let mut report = BatchReport::new();

    if opts.create_backup {
        // A snapshot failure aborts with zero live mutations performed.
        report.backup_dir = Some(snapshot_vault(vault_root, &files).await?);
    }

    let batch_size = opts.batch_size.max(1);
    for chunk in files.chunks(batch_size) {
        let outcomes = join_all(chunk.iter().map(|file| {
            let rel = file_ops::relative_path(vault_root, file)
                .unwrap_or_else(|| file.display().to_string());
            async move { (rel, rename_in_note(file, old_tag, new_tag, opts.normalize).await) }
        }))
        .await;

        for (rel, outcome) in outcomes {
            match outcome {
                Ok(Some(renames)) => report.successes.push(NoteRenameOutcome {
                    path: rel,
                    renames,
                }),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("[BATCH] Tag rename failed for {rel}: {e}");
                    report.failures.push(BatchFailure {
                        path: rel,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    rewrite_saved_searches(vault_root, old_tag, new_tag).await;

    log::info!(
        "[BATCH] Renamed tag '{old_tag}' -> '{new_tag}': {} file(s) changed, {} failure(s)",
        report.successes.len(),
        report.failures.len()
    );

    if report.successes.is_empty() && !report.failures.is_empty() {
        return Err(VaultError::Io(io::Error::other(format!(
            "tag rename achieved no successes; {} file(s) failed, first: {}: {}",
            report.failures.len(),
            report.failures[0].path,
            report.failures[0].error
        ))));
    }
    Ok(report)
}

/// Apply the hierarchical replace rule to one note's frontmatter and
/// inline tags. `Ok(None)` means the note had no matching tags.
async fn rename_in_note(
    path: &Path,
    old_tag: &str,
    new_tag: &str,
    normalize: bool,
) -> Result<Option<Vec<TagRename>>> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut note = parse_note(&content)?;

    let (fm_tags, mut renames) =
        tags::rename_in_frontmatter(&note.tags(), old_tag, new_tag, normalize);
    let (body, inline_renames) = tags::rename_inline(&note.body, old_tag, new_tag, normalize);

    if renames.is_empty() && inline_renames.is_empty() {
        return Ok(None);
    }

    if !renames.is_empty() {
        note.set_tags(fm_tags);
    }
    note.body = body;
    renames.extend(inline_renames);

    tokio::fs::write(path, stringify_note(&note)).await?;
    Ok(Some(renames))
}

/// Copy every note into a timestamped backup directory inside the vault,
/// mirroring relative paths.
async fn snapshot_vault(vault_root: &Path, files: &[PathBuf]) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let backup_dir = vault_root.join(format!(".backup-{stamp}"));
    tokio::fs::create_dir_all(&backup_dir).await?;

    for file in files {
        let Some(rel) = file_ops::relative_path(vault_root, file) else {
            continue;
        };
        let dest = backup_dir.join(&rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file, &dest).await?;
    }

    log::info!(
        "[BATCH] Snapshotted {} note(s) into {}",
        files.len(),
        backup_dir.display()
    );
    Ok(backup_dir)
}

/// Best-effort rewrite of `tag:` queries in the saved-search document.
/// Absence of the document is not an error; any failure is logged, never
/// raised.
async fn rewrite_saved_searches(vault_root: &Path, old_tag: &str, new_tag: &str) {
    let path = vault_root.join(VAULT_CONFIG_DIR).join(SAVED_SEARCH_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            log::warn!("[BATCH] Could not read saved searches: {e}");
            return;
        }
    };

    let mut document: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("[BATCH] Saved searches are not valid JSON, skipping rewrite: {e}");
            return;
        }
    };

    // The trailing group anchors the match at a tag boundary, so a query
    // on a sibling tag sharing the prefix (`workout` vs `work`) is left
    // alone.
    let pattern = format!(
        r"tag:(#?){}((?:/[A-Za-z0-9/]+)?)([^A-Za-z0-9/]|$)",
        regex::escape(old_tag)
    );
    let Ok(re) = regex::Regex::new(&pattern) else {
        return;
    };
    let replacement = format!("tag:${{1}}{new_tag}${{2}}${{3}}");

    let mut changed = false;
    rewrite_strings(&mut document, &mut |s| {
        let next = re.replace_all(s, replacement.as_str());
        if next != *s {
            changed = true;
            Some(next.into_owned())
        } else {
            None
        }
    });

    if !changed {
        return;
    }
    let serialized = match serde_json::to_string_pretty(&document) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[BATCH] Could not serialize saved searches: {e}");
            return;
        }
    };
    if let Err(e) = tokio::fs::write(&path, serialized).await {
        log::warn!("[BATCH] Could not write saved searches: {e}");
    }
}

/// Walk every string in a JSON document, replacing those the callback
/// rewrites.
fn rewrite_strings(value: &mut serde_json::Value, rewrite: &mut impl FnMut(&str) -> Option<String>) {
    match value {
        serde_json::Value::String(s) => {
            if let Some(next) = rewrite(s) {
                *s = next;
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                rewrite_strings(item, rewrite);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                rewrite_strings(item, rewrite);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn opts_no_backup() -> RenameTagOptions {
        RenameTagOptions {
            normalize: false,
            batch_size: 2,
            create_backup: false,
        }
    }

    #[tokio::test]
    async fn test_rename_validates_tags_first() {
        let dir = tempdir().unwrap();
        let err = rename_tag(dir.path(), "bad tag", "fine", &opts_no_backup()).await;
        assert!(matches!(err, Err(VaultError::InvalidTag(_))));
        let err = rename_tag(dir.path(), "fine", "also bad", &opts_no_backup()).await;
        assert!(matches!(err, Err(VaultError::InvalidTag(_))));
    }

    #[tokio::test]
    async fn test_hierarchical_rename_across_both_locations() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("a.md"),
            "---\ntags:\n  - work\n  - work/active\n---\nBody with #work/active inline.\n",
        )
        .unwrap();
        std::fs::write(root.join("b.md"), "No matching tags here.\n").unwrap();

        let report = rename_tag(root, "work", "projects", &opts_no_backup())
            .await
            .unwrap();

        assert_eq!(report.successes.len(), 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.successes[0].path, "a.md");
        assert_eq!(report.successes[0].renames.len(), 3);

        let content = std::fs::read_to_string(root.join("a.md")).unwrap();
        assert!(content.contains("- projects\n"));
        assert!(content.contains("- projects/active\n"));
        assert!(content.contains("#projects/active inline"));
        assert!(!content.contains("work"));
    }

    #[tokio::test]
    async fn test_unreadable_note_is_isolated_failure() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("one.md"), "#old here\n").unwrap();
        // Not valid UTF-8, so reading it as a note fails.
        std::fs::write(root.join("two.md"), [0xFF, 0xFE, 0x00]).unwrap();
        std::fs::write(root.join("three.md"), "#old again\n").unwrap();

        let report = rename_tag(root, "old", "new", &opts_no_backup())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "two.md");
        assert_eq!(report.successes.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_before_mutation() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/n.md"), "#old\n").unwrap();

        let opts = RenameTagOptions {
            create_backup: true,
            ..opts_no_backup()
        };
        let report = rename_tag(root, "old", "new", &opts).await.unwrap();

        let backup_dir = report.backup_dir.expect("backup dir");
        let snapshot = std::fs::read_to_string(backup_dir.join("sub/n.md")).unwrap();
        assert_eq!(snapshot, "#old\n");
        let live = std::fs::read_to_string(root.join("sub/n.md")).unwrap();
        assert_eq!(live, "#new\n");
    }

    #[tokio::test]
    async fn test_saved_search_rewrite() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join(VAULT_CONFIG_DIR)).unwrap();
        std::fs::write(
            root.join(VAULT_CONFIG_DIR).join(SAVED_SEARCH_FILE),
            r#"{"searches": [{"name": "active work", "query": "tag:#work/active"}]}"#,
        )
        .unwrap();
        std::fs::write(root.join("n.md"), "#work\n").unwrap();

        rename_tag(root, "work", "projects", &opts_no_backup())
            .await
            .unwrap();

        let saved = std::fs::read_to_string(root.join(VAULT_CONFIG_DIR).join(SAVED_SEARCH_FILE))
            .unwrap();
        assert!(saved.contains("tag:#projects/active"));
    }

    #[tokio::test]
    async fn test_saved_search_rewrite_leaves_sibling_tags_alone() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join(VAULT_CONFIG_DIR)).unwrap();
        std::fs::write(
            root.join(VAULT_CONFIG_DIR).join(SAVED_SEARCH_FILE),
            r#"{"searches": [{"query": "tag:#workout"}, {"query": "tag:#work and tag:#workout/log"}]}"#,
        )
        .unwrap();
        std::fs::write(root.join("n.md"), "#work\n").unwrap();

        rename_tag(root, "work", "projects", &opts_no_backup())
            .await
            .unwrap();

        let saved = std::fs::read_to_string(root.join(VAULT_CONFIG_DIR).join(SAVED_SEARCH_FILE))
            .unwrap();
        assert!(saved.contains("tag:#workout"));
        assert!(saved.contains("tag:#workout/log"));
        assert!(saved.contains("tag:#projects and"));
        assert!(!saved.contains("tag:#projectsout"));
    }

    #[tokio::test]
    async fn test_missing_saved_searches_is_fine() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("n.md"), "#a\n").unwrap();
        let report = rename_tag(dir.path(), "a", "b", &opts_no_backup()).await;
        assert!(report.is_ok());
    }
}

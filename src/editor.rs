//! Backup-before-write / restore-on-failure wrapper for single-note edits.
//!
//! Every mutation copies the original bytes to a timestamped sibling
//! backup first. On success the backup is deleted (delete keeps its
//! backup briefly for a recovery window); on failure the original bytes
//! are restored before the error propagates. If restoration itself fails,
//! the compound error names both causes and the preserved backup path.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VaultError};
use crate::notes::{parse_note, stringify_note};

/// How long a delete's backup is retained before the async purge.
const DELETE_BACKUP_RETENTION: Duration = Duration::from_secs(30);

/// A single-note mutation.
#[derive(Debug, Clone)]
pub enum EditOperation {
    /// Append to the note body, after the frontmatter block.
    Append(String),
    /// Prepend to the note body, after the frontmatter block.
    Prepend(String),
    /// Replace the whole file content.
    Replace(String),
    /// Delete the note. The backup doubles as a short-lived trash copy.
    Delete,
}

/// Apply an edit to an existing note. Returns the backup path for
/// `Delete` (recoverable until the purge runs), `None` otherwise.
pub async fn apply(path: &Path, op: EditOperation) -> Result<Option<PathBuf>> {
    match op {
        EditOperation::Delete => delete_note(path).await.map(Some),
        EditOperation::Replace(content) => {
            apply_with(path, move |_| Ok(content)).await?;
            Ok(None)
        }
        EditOperation::Append(text) => {
            apply_with(path, move |current| {
                let mut note = parse_note(&current)?;
                if !note.body.is_empty() && !note.body.ends_with('\n') {
                    note.body.push('\n');
                }
                note.body.push_str(&text);
                Ok(stringify_note(&note))
            })
            .await?;
            Ok(None)
        }
        EditOperation::Prepend(text) => {
            apply_with(path, move |current| {
                let mut note = parse_note(&current)?;
                let mut body = text;
                if !body.ends_with('\n') {
                    body.push('\n');
                }
                body.push_str(&note.body);
                note.body = body;
                Ok(stringify_note(&note))
            })
            .await?;
            Ok(None)
        }
    }
}

/// Backup, transform, write. The transform seam exists so tests can
/// inject a failure between backup creation and the final write.
pub(crate) async fn apply_with<F>(path: &Path, transform: F) -> Result<()>
where
    F: FnOnce(String) -> Result<String>,
{
    if !tokio::fs::try_exists(path).await? {
        return Err(VaultError::NoteNotFound(path.display().to_string()));
    }

    let current = tokio::fs::read_to_string(path).await?;
    let backup = backup_path(path);
    tokio::fs::copy(path, &backup).await?;

    let outcome = match transform(current) {
        Ok(next) => tokio::fs::write(path, next).await.map_err(VaultError::from),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(&backup).await {
                log::warn!(
                    "[EDITOR] Edit succeeded but backup {} was not deleted: {e}",
                    backup.display()
                );
            }
            Ok(())
        }
        Err(original) => Err(restore(path, backup, original).await),
    }
}

/// Delete with a short recovery window: the timestamped backup survives
/// the delete and is purged asynchronously.
async fn delete_note(path: &Path) -> Result<PathBuf> {
    if !tokio::fs::try_exists(path).await? {
        return Err(VaultError::NoteNotFound(path.display().to_string()));
    }

    let backup = backup_path(path);
    tokio::fs::copy(path, &backup).await?;

    if let Err(e) = tokio::fs::remove_file(path).await {
        return Err(restore(path, backup, e.into()).await);
    }

    let purge_target = backup.clone();
    tokio::spawn(async move {
        tokio::time::sleep(DELETE_BACKUP_RETENTION).await;
        if let Err(e) = tokio::fs::remove_file(&purge_target).await {
            log::warn!(
                "[EDITOR] Could not purge delete backup {}: {e}",
                purge_target.display()
            );
        }
    });

    Ok(backup)
}

/// Restore original bytes from the backup and clean it up. Produces the
/// error to propagate: the original failure, or the compound rollback
/// failure when restoration itself failed (backup kept in that case).
async fn restore(path: &Path, backup: PathBuf, original: VaultError) -> VaultError {
    match tokio::fs::copy(&backup, path).await {
        Ok(_) => {
            if let Err(e) = tokio::fs::remove_file(&backup).await {
                log::warn!(
                    "[EDITOR] Restored {} but could not delete backup {}: {e}",
                    path.display(),
                    backup.display()
                );
            }
            original
        }
        Err(restore_error) => {
            log::error!(
                "[EDITOR] Restoration of {} failed; backup preserved at {}",
                path.display(),
                backup.display()
            );
            VaultError::Rollback {
                original: Box::new(original),
                restore_error,
                backup_path: backup,
            }
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    PathBuf::from(format!("{}.{stamp}.bak", path.display()))
}

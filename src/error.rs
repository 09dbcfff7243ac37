//! Error taxonomy for vault operations.
//!
//! Containment and tag-validity errors are raised before any mutation
//! happens; filesystem errors wrap the underlying OS error; `Rollback` is
//! the compound case where an edit failed *and* restoring the backup
//! failed too.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Path is outside the vault: {path}")]
    PathOutsideVault { path: String },

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Note already exists: {0}")]
    NoteAlreadyExists(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Edit failed ({original}) and restoring the backup also failed ({restore_error}); \
         backup preserved at {} for manual recovery", backup_path.display()
    )]
    Rollback {
        original: Box<VaultError>,
        restore_error: std::io::Error,
        backup_path: PathBuf,
    },
}

pub type Result<T> = std::result::Result<T, VaultError>;

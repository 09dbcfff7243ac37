//! notevault — vault consistency engine for markdown note collections.
//!
//! Manages named root directories ("vaults") of markdown notes while
//! preserving referential integrity: path containment and safety checks,
//! the two-location hierarchical tag model (YAML frontmatter plus inline
//! `#tags`), cross-document link rewriting on move/delete, and the
//! backup-before-mutate / rollback-on-failure discipline for both
//! single-note edits and vault-wide batch tag renames.
//!
//! Transport, argument schemas, and tool dispatch live outside this
//! crate; handlers validate paths through [`paths`], mutate single notes
//! through [`editor`], rewrite links through [`links`], and run tag
//! renames through [`batch`]. Note content is parsed fresh per call and
//! never cached, and there is no cross-process locking: concurrent
//! external edits race with the backup/rollback sequence, last writer
//! wins.

pub mod batch;
pub mod editor;
pub mod error;
pub mod links;
pub mod notes;
pub mod paths;
pub mod types;
pub mod vault;

pub use batch::{rename_tag, RenameTagOptions};
pub use editor::EditOperation;
pub use error::{Result, VaultError};
pub use links::LinkUpdate;
pub use notes::{parse_note, stringify_note, Note, Value};
pub use types::{BatchFailure, BatchReport, OpOutcome};
pub use vault::VaultRegistry;

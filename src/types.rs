//! Result envelopes relayed verbatim by the dispatch layer.
//!
//! Every core operation answers with an `OpOutcome` (single-target
//! operations) or a `BatchReport` (vault-wide operations), so the thin
//! tool handlers never have to re-shape anything.

use serde::Serialize;
use std::path::PathBuf;

/// Outcome of a single-target operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpOutcome {
    pub success: bool,
    pub message: String,
    /// Vault-relative path of the file the operation touched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Content payload for read-style operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl OpOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        OpOutcome {
            success: true,
            message: message.into(),
            path: None,
            content: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OpOutcome {
            success: false,
            message: message.into(),
            path: None,
            content: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// One file that failed inside a batch operation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: String,
    pub error: String,
}

/// Per-file successes and failures from a vault-wide operation.
///
/// A batch only raises when it achieved zero successes and has at least
/// one failure; otherwise the report carries both sides.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport<T: Serialize> {
    pub successes: Vec<T>,
    pub failures: Vec<BatchFailure>,
    /// Snapshot directory created before mutation, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
}

impl<T: Serialize> BatchReport<T> {
    pub fn new() -> Self {
        BatchReport {
            successes: Vec::new(),
            failures: Vec::new(),
            backup_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_shape() {
        let outcome = OpOutcome::success("Note created")
            .with_path("ideas/new.md")
            .with_content("# New\n");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["path"], "ideas/new.md");

        let err = OpOutcome::error("Note not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        // Absent payloads are omitted, not null.
        assert!(json.get("path").is_none());
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_batch_report_omits_missing_backup_dir() {
        let report: BatchReport<String> = BatchReport::new();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("backup_dir").is_none());
    }
}

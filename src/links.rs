//! Cross-document link rewriting on note move/delete.
//!
//! Scans every note for `[[Name]]`, `[[Name|alias]]`, and `[text](Name.md)`
//! references and rewrites or marks them. Matching is by extension-less
//! base name only: two notes sharing a base name in different folders are
//! indistinguishable here (accepted limitation, not to be fixed silently).

use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

use crate::error::Result;
use crate::notes::file_ops;

/// What happened to the referenced note.
#[derive(Debug, Clone)]
pub enum LinkUpdate {
    /// Renamed within the same vault; references follow the new name.
    Rename { new_name: String },
    /// Deleted; references are struck through rather than removed, so the
    /// breakage stays visible instead of silent.
    Delete,
    /// Moved out to another vault; references in the origin vault are
    /// qualified with the destination vault.
    MoveOut {
        dest_vault: String,
        origin_vault: String,
    },
    /// Moved in from another vault; references in the destination vault
    /// are qualified with the source vault.
    MoveIn { source_vault: String },
}

/// Rewrite references to `old_name` across all notes under `vault_root`,
/// skipping `skip` (the moved note's own file). Returns the number of
/// files whose content actually changed, not the number scanned.
pub async fn update_references(
    vault_root: &Path,
    old_name: &str,
    update: &LinkUpdate,
    skip: Option<&Path>,
) -> Result<usize> {
    let files = file_ops::list_notes(vault_root).await?;
    let mut changed = 0;

    for file in files {
        if skip.is_some_and(|s| s == file) {
            continue;
        }
        let content = tokio::fs::read_to_string(&file).await?;
        let rewritten = rewrite_references(&content, old_name, update);
        if rewritten != content {
            tokio::fs::write(&file, rewritten).await?;
            changed += 1;
        }
    }

    if changed > 0 {
        log::info!(
            "[LINKS] Updated references to '{old_name}' in {changed} file(s)"
        );
    }
    Ok(changed)
}

/// Rewrite all references to `old_name` in a single body.
pub fn rewrite_references(content: &str, old_name: &str, update: &LinkUpdate) -> String {
    let name = regex::escape(old_name);
    // [[Name]] or [[Name|alias]]
    let wiki = Regex::new(&format!(r"\[\[{name}(\|[^\]]+)?\]\]")).expect("escaped name");
    // [text](Name.md)
    let md = Regex::new(&format!(r"\[([^\]]*)\]\({name}\.md\)")).expect("escaped name");

    let pass_one = wiki.replace_all(content, |caps: &regex::Captures| {
        let alias = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        match update {
            LinkUpdate::Rename { new_name } => format!("[[{new_name}{alias}]]"),
            LinkUpdate::Delete => format!("~~[[{old_name}{alias}]]~~"),
            LinkUpdate::MoveOut {
                dest_vault,
                origin_vault,
            } => format!(
                "[[{dest_vault}/{old_name}{alias}]] <!-- moved from {origin_vault} -->"
            ),
            LinkUpdate::MoveIn { source_vault } => format!(
                "[[{source_vault}/{old_name}{alias}]] <!-- moved from {source_vault} -->"
            ),
        }
    });

    let pass_two: Cow<'_, str> = md.replace_all(&pass_one, |caps: &regex::Captures| {
        let text = &caps[1];
        match update {
            LinkUpdate::Rename { new_name } => format!("[{text}]({new_name}.md)"),
            LinkUpdate::Delete => format!("~~[{text}]({old_name}.md)~~"),
            LinkUpdate::MoveOut {
                dest_vault,
                origin_vault,
            } => format!(
                "[{text}]({dest_vault}/{old_name}.md) <!-- moved from {origin_vault} -->"
            ),
            LinkUpdate::MoveIn { source_vault } => format!(
                "[{text}]({source_vault}/{old_name}.md) <!-- moved from {source_vault} -->"
            ),
        }
    });

    pass_two.into_owned()
}

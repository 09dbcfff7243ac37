//! Hierarchical tag model.
//!
//! Tags are `/`-separated alphanumeric segments and live in two places
//! per note: the `tags` array in frontmatter and positional `#tag` tokens
//! in the body. Inline scanning is a deliberate line-oriented heuristic:
//! fence state toggles on lines whose trimmed content starts with a fence
//! marker, comment state on lines containing `<!--` / `-->`, and tokens
//! inside either state are inert — reported as preserved, never touched.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::{Result, VaultError};

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([A-Za-z0-9]+(?:/[A-Za-z0-9]+)*)").unwrap());

/// Where a tag occurrence was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagLocation {
    Frontmatter,
    Content,
}

/// A reported tag occurrence. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TagChange {
    pub tag: String,
    pub location: TagLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One tag renamed during a batch operation.
#[derive(Debug, Clone, Serialize)]
pub struct TagRename {
    pub from: String,
    pub to: String,
    pub location: TagLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// Options for tag removal.
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    /// Normalize tags before comparing.
    pub normalize: bool,
    /// Keep strict descendants of a removed tag (`a/b` survives removing `a`).
    pub preserve_children: bool,
    /// Glob patterns (`*` wildcard) that also select tags for removal.
    pub patterns: Vec<String>,
}

/// Removed/preserved partition produced by a removal pass.
#[derive(Debug, Default, Serialize)]
pub struct RemovalReport {
    pub removed: Vec<TagChange>,
    pub preserved: Vec<TagChange>,
}

/// Extract raw (non-normalized) inline tags from a body, deduplicated in
/// order of first appearance. Fenced code and comments are skipped.
pub fn extract_tags(body: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tags = Vec::new();
    scan_lines(body, |_, line, inert| {
        if inert {
            return;
        }
        for cap in TAG_RE.captures_iter(line) {
            let tag = cap[1].to_string();
            if seen.insert(tag.clone()) {
                tags.push(tag);
            }
        }
    });
    tags
}

/// Strip a leading `#`; when `normalize` is set, break each segment's
/// lowercase-to-uppercase transitions with hyphens and lowercase the
/// result. Idempotent: the output contains no uppercase to break on.
pub fn normalize_tag(tag: &str, normalize: bool) -> String {
    let bare = tag.strip_prefix('#').unwrap_or(tag);
    if !normalize {
        return bare.to_string();
    }
    let segments: Vec<String> = bare
        .split('/')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut prev_lower = false;
            for c in segment.chars() {
                if prev_lower && c.is_uppercase() {
                    out.push('-');
                }
                prev_lower = c.is_lowercase();
                out.push(c);
            }
            out.to_lowercase()
        })
        .collect();
    segments.join("/")
}

/// A tag is valid when every `/`-separated segment is non-empty and
/// purely alphanumeric.
pub fn validate_tag(tag: &str) -> bool {
    let bare = tag.strip_prefix('#').unwrap_or(tag);
    !bare.is_empty()
        && bare
            .split('/')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric()))
}

/// Full-string glob match: `*` matches any run of characters (including
/// none), `/` is literal.
pub fn matches_pattern(pattern: &str, tag: &str) -> bool {
    let mut regex = String::from("^");
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            regex.push_str(".*");
        }
        regex.push_str(&regex::escape(part));
    }
    regex.push('$');
    Regex::new(&regex).map(|re| re.is_match(tag)).unwrap_or(false)
}

/// Hierarchy relations of a tag within a tag universe.
#[derive(Debug, Default, Serialize)]
pub struct RelatedTags {
    /// Every strict prefix of the hierarchy, shortest first.
    pub parents: Vec<String>,
    /// Every tag in the universe that is a strict descendant.
    pub children: Vec<String>,
}

pub fn related_tags(tag: &str, all_tags: &[String]) -> RelatedTags {
    let mut parents = Vec::new();
    let segments: Vec<&str> = tag.split('/').collect();
    for end in 1..segments.len() {
        parents.push(segments[..end].join("/"));
    }
    let child_prefix = format!("{tag}/");
    let children = all_tags
        .iter()
        .filter(|t| t.starts_with(&child_prefix))
        .cloned()
        .collect();
    RelatedTags { parents, children }
}

/// Validate every incoming tag, then merge into the existing frontmatter
/// array. Aborts on the first invalid tag with no partial mutation.
/// Result is the sorted, deduplicated union.
pub fn add_to_frontmatter(
    existing: &[String],
    incoming: &[String],
    normalize: bool,
) -> Result<Vec<String>> {
    for tag in incoming {
        if !validate_tag(tag) {
            return Err(VaultError::InvalidTag(tag.clone()));
        }
    }
    let mut merged: Vec<String> = existing.to_vec();
    merged.extend(incoming.iter().map(|t| normalize_tag(t, normalize)));
    merged.sort();
    merged.dedup();
    Ok(merged)
}

/// How a tag relates to the removal criteria.
#[derive(Clone, Copy)]
enum MatchKind {
    None,
    Direct,
    Descendant,
}

fn match_kind(tag: &str, targets: &[String], opts: &RemoveOptions) -> MatchKind {
    let subject = normalize_tag(tag, opts.normalize);
    for target in targets {
        let target = normalize_tag(target, opts.normalize);
        if subject == target {
            return MatchKind::Direct;
        }
        if subject.starts_with(&format!("{target}/")) {
            return MatchKind::Descendant;
        }
    }
    for pattern in &opts.patterns {
        if matches_pattern(pattern, &subject) {
            return MatchKind::Direct;
        }
    }
    MatchKind::None
}

/// Remove matching tags from a frontmatter array. Returns the surviving
/// array plus the removed/preserved partition.
pub fn remove_from_frontmatter(
    existing: &[String],
    targets: &[String],
    opts: &RemoveOptions,
) -> (Vec<String>, RemovalReport) {
    let mut survivors = Vec::new();
    let mut report = RemovalReport::default();

    for tag in existing {
        match match_kind(tag, targets, opts) {
            MatchKind::Direct => report.removed.push(TagChange {
                tag: tag.clone(),
                location: TagLocation::Frontmatter,
                line: None,
                context: None,
            }),
            MatchKind::Descendant if !opts.preserve_children => {
                report.removed.push(TagChange {
                    tag: tag.clone(),
                    location: TagLocation::Frontmatter,
                    line: None,
                    context: None,
                })
            }
            MatchKind::Descendant => {
                report.preserved.push(TagChange {
                    tag: tag.clone(),
                    location: TagLocation::Frontmatter,
                    line: None,
                    context: Some("child preserved".to_string()),
                });
                survivors.push(tag.clone());
            }
            MatchKind::None => survivors.push(tag.clone()),
        }
    }
    (survivors, report)
}

/// Remove matching inline tags from a body. Tokens inside fenced code or
/// comments are never touched and always reported as preserved. Runs of
/// blank lines left behind collapse to a single blank line.
pub fn remove_inline(
    body: &str,
    targets: &[String],
    opts: &RemoveOptions,
) -> (String, RemovalReport) {
    let mut report = RemovalReport::default();
    let mut out_lines: Vec<String> = Vec::new();

    scan_lines(body, |line_no, line, inert| {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for cap in TAG_RE.captures_iter(line) {
            let m = cap.get(1).expect("group 1 always present");
            let tag = m.as_str();
            let kind = match_kind(tag, targets, opts);
            if matches!(kind, MatchKind::None) {
                continue;
            }
            let change = TagChange {
                tag: tag.to_string(),
                location: TagLocation::Content,
                line: Some(line_no),
                context: Some(line.trim().to_string()),
            };
            if inert {
                report.preserved.push(TagChange {
                    context: Some("inside code block or comment".to_string()),
                    ..change
                });
            } else if matches!(kind, MatchKind::Direct)
                || (matches!(kind, MatchKind::Descendant) && !opts.preserve_children)
            {
                report.removed.push(change);
                // Span covers the '#' and one preceding space when present,
                // so removal does not leave doubled whitespace behind.
                let mut start = m.start() - 1;
                if start > 0 && line.as_bytes()[start - 1] == b' ' {
                    start -= 1;
                }
                spans.push((start, m.end()));
            } else {
                report.preserved.push(TagChange {
                    context: Some("child preserved".to_string()),
                    ..change
                });
            }
        }

        if spans.is_empty() {
            out_lines.push(line.to_string());
        } else {
            let mut rebuilt = String::with_capacity(line.len());
            let mut cursor = 0;
            for (start, end) in spans {
                rebuilt.push_str(&line[cursor..start]);
                cursor = end;
            }
            rebuilt.push_str(&line[cursor..]);
            out_lines.push(rebuilt.trim_end().to_string());
        }
    });

    // Collapse any run of blank lines down to at most one.
    let mut collapsed: Vec<String> = Vec::new();
    for line in out_lines {
        if line.trim().is_empty() && collapsed.last().is_some_and(|l| l.trim().is_empty()) {
            continue;
        }
        collapsed.push(line);
    }

    let mut result = collapsed.join("\n");
    if body.ends_with('\n') {
        result.push('\n');
    }
    (result, report)
}

/// Hierarchical replace rule: a tag matches when it equals `old` or is a
/// strict descendant; only the matched prefix is substituted.
pub fn replace_tag(tag: &str, old: &str, new: &str, normalize: bool) -> Option<String> {
    let subject = normalize_tag(tag, normalize);
    let old = normalize_tag(old, normalize);
    if subject == old {
        return Some(new.to_string());
    }
    subject
        .strip_prefix(&format!("{old}/"))
        .map(|rest| format!("{new}/{rest}"))
}

/// Apply the hierarchical replace rule to a frontmatter array. Returns
/// the new sorted deduplicated array plus the renames performed.
pub fn rename_in_frontmatter(
    existing: &[String],
    old: &str,
    new: &str,
    normalize: bool,
) -> (Vec<String>, Vec<TagRename>) {
    let mut renames = Vec::new();
    let mut result: Vec<String> = existing
        .iter()
        .map(|tag| match replace_tag(tag, old, new, normalize) {
            Some(replacement) => {
                renames.push(TagRename {
                    from: tag.clone(),
                    to: replacement.clone(),
                    location: TagLocation::Frontmatter,
                    line: None,
                });
                replacement
            }
            None => tag.clone(),
        })
        .collect();
    if !renames.is_empty() {
        result.sort();
        result.dedup();
    }
    (result, renames)
}

/// Apply the hierarchical replace rule to inline tags, skipping fenced
/// code and comments. Returns the rewritten body plus renames with line
/// numbers.
pub fn rename_inline(body: &str, old: &str, new: &str, normalize: bool) -> (String, Vec<TagRename>) {
    let mut renames = Vec::new();
    let mut out_lines: Vec<String> = Vec::new();

    scan_lines(body, |line_no, line, inert| {
        if inert {
            out_lines.push(line.to_string());
            return;
        }
        let mut rebuilt = String::with_capacity(line.len());
        let mut cursor = 0;
        for cap in TAG_RE.captures_iter(line) {
            let m = cap.get(1).expect("group 1 always present");
            if let Some(replacement) = replace_tag(m.as_str(), old, new, normalize) {
                rebuilt.push_str(&line[cursor..m.start()]);
                rebuilt.push_str(&replacement);
                cursor = m.end();
                renames.push(TagRename {
                    from: m.as_str().to_string(),
                    to: replacement,
                    location: TagLocation::Content,
                    line: Some(line_no),
                });
            }
        }
        rebuilt.push_str(&line[cursor..]);
        out_lines.push(rebuilt);
    });

    let mut result = out_lines.join("\n");
    if body.ends_with('\n') {
        result.push('\n');
    }
    (result, renames)
}

/// Line-oriented scan with the fence/comment heuristic. The callback gets
/// the 1-based line number, the line text, and whether the line is inert.
/// Fence-marker lines are themselves inert.
fn scan_lines(body: &str, mut visit: impl FnMut(usize, &str, bool)) {
    let mut in_fence = false;
    let mut in_comment = false;

    for (idx, line) in body.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            visit(idx + 1, line, true);
            continue;
        }
        let mut inert = in_fence || in_comment;
        if line.contains("<!--") {
            in_comment = true;
            inert = true;
        }
        if line.contains("-->") {
            in_comment = false;
            inert = true;
        }
        visit(idx + 1, line, inert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_skips_fences_and_comments() {
        let body = "#alpha text\n```\n#fenced\n```\n<!-- #commented -->\n#beta and #alpha again\n";
        assert_eq!(extract_tags(body), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_extract_hierarchical() {
        assert_eq!(extract_tags("work on #work/active now"), vec!["work/active"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["#myTag", "work/activeProjects", "simple", "a1B2/cD"] {
            let once = normalize_tag(raw, true);
            assert_eq!(normalize_tag(&once, true), once, "not idempotent for {raw}");
        }
        assert_eq!(normalize_tag("#myTag", true), "my-tag");
        assert_eq!(normalize_tag("work/activeProjects", true), "work/active-projects");
        assert_eq!(normalize_tag("#Kept", false), "Kept");
    }

    #[test]
    fn test_validate() {
        assert!(validate_tag("work/active"));
        assert!(validate_tag("#solo"));
        assert!(!validate_tag(""));
        assert!(!validate_tag("bad tag"));
        assert!(!validate_tag("a//b"));
        assert!(!validate_tag("trailing/"));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("status/*", "status/active"));
        assert!(!matches_pattern("status/*", "status"));
        assert!(matches_pattern("*", "anything/at/all"));
        assert!(matches_pattern("a*c", "abc"));
        assert!(!matches_pattern("a*c", "abd"));
        assert!(matches_pattern("exact", "exact"));
        assert!(!matches_pattern("exact", "exactly"));
    }

    #[test]
    fn test_related() {
        let all = vec![
            "work".to_string(),
            "work/active".to_string(),
            "work/active/urgent".to_string(),
            "home".to_string(),
        ];
        let related = related_tags("work/active", &all);
        assert_eq!(related.parents, vec!["work"]);
        assert_eq!(related.children, vec!["work/active/urgent"]);
    }

    #[test]
    fn test_add_validates_before_mutating() {
        let existing = vec!["base".to_string()];
        let err = add_to_frontmatter(
            &existing,
            &["ok".to_string(), "bad tag".to_string()],
            false,
        );
        assert!(matches!(err, Err(VaultError::InvalidTag(_))));

        let merged =
            add_to_frontmatter(&existing, &["zeta".to_string(), "base".to_string()], false)
                .unwrap();
        assert_eq!(merged, vec!["base", "zeta"]);
    }

    #[test]
    fn test_remove_preserve_children_semantics() {
        let existing: Vec<String> = ["a", "a/b", "c"].iter().map(|s| s.to_string()).collect();
        let targets = vec!["a".to_string()];

        let opts = RemoveOptions { preserve_children: false, ..Default::default() };
        let (left, report) = remove_from_frontmatter(&existing, &targets, &opts);
        assert_eq!(left, vec!["c"]);
        assert_eq!(report.removed.len(), 2);

        let opts = RemoveOptions { preserve_children: true, ..Default::default() };
        let (left, report) = remove_from_frontmatter(&existing, &targets, &opts);
        assert_eq!(left, vec!["a/b", "c"]);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.preserved.len(), 1);
    }

    #[test]
    fn test_remove_by_pattern() {
        let existing: Vec<String> =
            ["status/active", "status/done", "keep"].iter().map(|s| s.to_string()).collect();
        let opts = RemoveOptions {
            patterns: vec!["status/*".to_string()],
            ..Default::default()
        };
        let (left, report) = remove_from_frontmatter(&existing, &[], &opts);
        assert_eq!(left, vec!["keep"]);
        assert_eq!(report.removed.len(), 2);
    }

    #[test]
    fn test_remove_inline_preserves_fenced() {
        let body = "Start #drop here\n```\n#drop in code\n```\nEnd\n";
        let opts = RemoveOptions::default();
        let (result, report) = remove_inline(body, &["drop".to_string()], &opts);
        assert!(result.contains("#drop in code"));
        assert!(!result.contains("Start #drop"));
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.preserved.len(), 1);
        assert_eq!(report.removed[0].line, Some(1));
    }

    #[test]
    fn test_remove_inline_collapses_blank_runs() {
        let body = "keep\n\n#gone\n\nkeep too\n";
        let opts = RemoveOptions::default();
        let (result, _) = remove_inline(body, &["gone".to_string()], &opts);
        assert_eq!(result, "keep\n\nkeep too\n");
    }

    #[test]
    fn test_replace_tag_prefix_only() {
        assert_eq!(replace_tag("work", "work", "projects", false).as_deref(), Some("projects"));
        assert_eq!(
            replace_tag("work/active", "work", "projects", false).as_deref(),
            Some("projects/active")
        );
        assert_eq!(replace_tag("workout", "work", "projects", false), None);
        assert_eq!(replace_tag("other", "work", "projects", false), None);
    }

    #[test]
    fn test_rename_inline_reports_lines() {
        let body = "first #work item\nsecond #work/active item\n```\n#work ignored\n```\n";
        let (result, renames) = rename_inline(body, "work", "projects", false);
        assert!(result.contains("#projects item"));
        assert!(result.contains("#projects/active item"));
        assert!(result.contains("#work ignored"));
        assert_eq!(renames.len(), 2);
        assert_eq!(renames[0].line, Some(1));
        assert_eq!(renames[1].line, Some(2));
    }
}

//! Parse and generate YAML frontmatter for notes.
//!
//! Hand-rolled YAML for the block subset notes actually use (scalars,
//! inline and block lists, one nesting level of maps) — no serde_yaml.
//! The original frontmatter text is retained so that an unmutated note
//! stringifies back to its exact original bytes.

use crate::error::{Result, VaultError};

/// Closed variant for frontmatter values. Keeps tag-array manipulation
/// type-safe instead of passing an open dynamic type around.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A parsed note: ordered frontmatter mapping plus body text.
#[derive(Debug, Clone)]
pub struct Note {
    fields: Vec<(String, Value)>,
    pub body: String,
    pub has_frontmatter: bool,
    /// Original frontmatter block (delimiters included), kept until the
    /// mapping is mutated so round trips are byte-exact.
    raw_block: Option<String>,
}

impl Note {
    /// A note with no frontmatter, body only.
    pub fn body_only(body: impl Into<String>) -> Self {
        Note {
            fields: Vec::new(),
            body: body.into(),
            has_frontmatter: false,
            raw_block: None,
        }
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a field, replacing any existing value. Drops the raw block:
    /// the note is now mutated and will be re-serialized.
    pub fn set(&mut self, key: &str, value: Value) {
        self.raw_block = None;
        self.has_frontmatter = true;
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
    }

    /// Remove a field. An emptied mapping loses its frontmatter block
    /// entirely on stringify.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        // An absent key mutates nothing; the raw block stays valid.
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        self.raw_block = None;
        let (_, value) = self.fields.remove(idx);
        if self.fields.is_empty() {
            self.has_frontmatter = false;
        }
        Some(value)
    }

    /// Frontmatter tags as strings. A bare scalar `tags: foo` counts as a
    /// single-element list.
    pub fn tags(&self) -> Vec<String> {
        match self.get("tags") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::Scalar(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Replace the tags array. An empty set removes the field.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        if tags.is_empty() {
            self.remove("tags");
        } else {
            self.set(
                "tags",
                Value::List(tags.into_iter().map(Value::Scalar).collect()),
            );
        }
    }
}

/// Split a leading `---` block anchored at document start and parse it as
/// a structured mapping. Absence of the block yields a body-only note;
/// malformed structure inside the block is `InvalidFrontmatter`.
pub fn parse_note(text: &str) -> Result<Note> {
    let Some(after_open) = text.strip_prefix("---\n") else {
        return Ok(Note::body_only(text));
    };

    // Closing delimiter: a `---` line of its own.
    let close = after_open
        .find("\n---\n")
        .map(|i| (i, i + 5))
        .or_else(|| {
            after_open
                .strip_suffix("\n---")
                .map(|inner| (inner.len(), after_open.len()))
        });
    let Some((inner_end, body_start)) = close else {
        // Unterminated block: treat the whole text as body, like a note
        // that merely starts with a horizontal rule.
        return Ok(Note::body_only(text));
    };

    let inner = &after_open[..inner_end];
    let fields = parse_mapping(&mut collect_lines(inner), 0)?;
    let raw_block = text[..4 + body_start].to_string();
    let body = after_open[body_start..].to_string();

    Ok(Note {
        fields,
        body,
        has_frontmatter: true,
        raw_block: Some(raw_block),
    })
}

/// Inverse of [`parse_note`]. A note whose mapping is empty loses the
/// frontmatter block entirely.
pub fn stringify_note(note: &Note) -> String {
    if !note.has_frontmatter || note.fields.is_empty() {
        return note.body.clone();
    }
    if let Some(raw) = &note.raw_block {
        return format!("{raw}{}", note.body);
    }
    let mut out = String::from("---\n");
    for (key, value) in &note.fields {
        write_field(&mut out, key, value, 0);
    }
    out.push_str("---\n");
    out.push_str(&note.body);
    out
}

struct Line<'a> {
    indent: usize,
    content: &'a str,
}

fn collect_lines(inner: &str) -> std::collections::VecDeque<Line<'_>> {
    inner
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .map(|l| {
            let trimmed = l.trim_start_matches(' ');
            Line {
                indent: l.len() - trimmed.len(),
                content: trimmed.trim_end(),
            }
        })
        .collect()
}

fn parse_mapping(
    lines: &mut std::collections::VecDeque<Line<'_>>,
    indent: usize,
) -> Result<Vec<(String, Value)>> {
    let mut fields: Vec<(String, Value)> = Vec::new();

    while let Some(line) = lines.front() {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(VaultError::InvalidFrontmatter(format!(
                "unexpected indentation at: {}",
                line.content
            )));
        }
        let line = lines.pop_front().expect("peeked");
        let Some((key, rest)) = line.content.split_once(':') else {
            return Err(VaultError::InvalidFrontmatter(format!(
                "expected `key: value`, got: {}",
                line.content
            )));
        };
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(VaultError::InvalidFrontmatter(
                "empty mapping key".to_string(),
            ));
        }
        let rest = rest.trim();

        let value = if rest.is_empty() {
            parse_block_value(lines, indent)?
        } else if rest.starts_with('[') {
            parse_inline_list(rest)?
        } else {
            Value::Scalar(unquote(rest))
        };
        fields.push((key, value));
    }

    Ok(fields)
}

/// Value introduced by a bare `key:` line — an indented list, an indented
/// nested map, or nothing (empty scalar).
fn parse_block_value(
    lines: &mut std::collections::VecDeque<Line<'_>>,
    parent_indent: usize,
) -> Result<Value> {
    let Some(next) = lines.front() else {
        return Ok(Value::Scalar(String::new()));
    };
    if next.indent <= parent_indent {
        return Ok(Value::Scalar(String::new()));
    }

    let child_indent = next.indent;
    if next.content.starts_with("- ") || next.content == "-" {
        let mut items = Vec::new();
        while let Some(line) = lines.front() {
            if line.indent != child_indent || !(line.content.starts_with("- ") || line.content == "-")
            {
                break;
            }
            let line = lines.pop_front().expect("peeked");
            let item = line.content.trim_start_matches('-').trim();
            items.push(Value::Scalar(unquote(item)));
        }
        Ok(Value::List(items))
    } else {
        Ok(Value::Map(parse_mapping(lines, child_indent)?))
    }
}

/// Parse an inline YAML list like `[foo, bar, "baz qux"]`.
fn parse_inline_list(s: &str) -> Result<Value> {
    let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
        return Err(VaultError::InvalidFrontmatter(format!(
            "unterminated inline list: {s}"
        )));
    };
    let items = inner
        .split(',')
        .map(|item| unquote(item.trim()))
        .filter(|item| !item.is_empty())
        .map(Value::Scalar)
        .collect();
    Ok(Value::List(items))
}

/// Remove surrounding quotes from a scalar.
fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn write_field(out: &mut String, key: &str, value: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        Value::Scalar(s) => {
            if s.is_empty() {
                out.push_str(&format!("{pad}{key}:\n"));
            } else {
                out.push_str(&format!("{pad}{key}: {}\n", quote_if_needed(s)));
            }
        }
        Value::List(items) if items.is_empty() => {
            out.push_str(&format!("{pad}{key}: []\n"));
        }
        Value::List(items) => {
            out.push_str(&format!("{pad}{key}:\n"));
            for item in items {
                let text = item.as_str().unwrap_or_default();
                out.push_str(&format!("{pad}  - {}\n", quote_if_needed(text)));
            }
        }
        Value::Map(children) => {
            out.push_str(&format!("{pad}{key}:\n"));
            for (child_key, child_value) in children {
                write_field(out, child_key, child_value, indent + 2);
            }
        }
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.contains(':') || s.starts_with(' ') || s.ends_with(' ') || s.starts_with('#') {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_with_frontmatter() {
        let content = "---\ntitle: Test Note\ntags: [crypto, payments]\n---\n\n# Test Note\n";
        let note = parse_note(content).unwrap();
        assert!(note.has_frontmatter);
        assert_eq!(note.get("title").unwrap().as_str(), Some("Test Note"));
        assert_eq!(note.tags(), vec!["crypto", "payments"]);
        assert!(note.body.contains("# Test Note"));
    }

    #[test]
    fn test_parse_note_no_frontmatter() {
        let note = parse_note("# Just a heading\n\nBody.").unwrap();
        assert!(!note.has_frontmatter);
        assert_eq!(note.body, "# Just a heading\n\nBody.");
    }

    #[test]
    fn test_unmutated_round_trip_is_byte_exact() {
        let content =
            "---\ntitle: \"Quoted: title\"\ntags:\n  - work/active\n  - home\nextra:\n  nested: yes\n---\nBody line.\n";
        let note = parse_note(content).unwrap();
        assert_eq!(stringify_note(&note), content);
    }

    #[test]
    fn test_removing_absent_key_keeps_byte_exact_round_trip() {
        let content = "---\ntitle: T\ntags: [a]\n---\nBody\n";
        let mut note = parse_note(content).unwrap();
        assert!(note.remove("missing").is_none());
        assert_eq!(stringify_note(&note), content);
    }

    #[test]
    fn test_mutated_note_reserializes() {
        let content = "---\ntitle: T\ntags: [a]\n---\nBody\n";
        let mut note = parse_note(content).unwrap();
        note.set_tags(vec!["a".to_string(), "b".to_string()]);
        let out = stringify_note(&note);
        assert!(out.starts_with("---\n"));
        assert!(out.contains("- a\n"));
        assert!(out.contains("- b\n"));
        assert!(out.ends_with("Body\n"));
        // Round trip of the re-serialized form is stable.
        let reparsed = parse_note(&out).unwrap();
        assert_eq!(reparsed.tags(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_mapping_loses_block() {
        let content = "---\ntags: [only]\n---\nBody\n";
        let mut note = parse_note(content).unwrap();
        note.set_tags(Vec::new());
        assert_eq!(stringify_note(&note), "Body\n");
    }

    #[test]
    fn test_malformed_frontmatter() {
        let content = "---\nthis is not a mapping\n---\nBody\n";
        assert!(matches!(
            parse_note(content),
            Err(VaultError::InvalidFrontmatter(_))
        ));
    }

    #[test]
    fn test_unterminated_block_is_body() {
        let content = "---\ntitle: dangling\nno closing fence";
        let note = parse_note(content).unwrap();
        assert!(!note.has_frontmatter);
        assert_eq!(note.body, content);
    }

    #[test]
    fn test_nested_map_values() {
        let content = "---\nmeta:\n  author: jo\n  reviewed: no\n---\n";
        let note = parse_note(content).unwrap();
        match note.get("meta").unwrap() {
            Value::Map(children) => {
                assert_eq!(children[0].0, "author");
                assert_eq!(children[0].1.as_str(), Some("jo"));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_scalar_tags_field() {
        let note = parse_note("---\ntags: solo\n---\n").unwrap();
        assert_eq!(note.tags(), vec!["solo"]);
    }
}

//! Notes system — Obsidian-compatible markdown notes.
//!
//! A note is an optional YAML frontmatter block plus a markdown body.
//! Tags live in two places per note: a sorted, deduplicated array in
//! frontmatter and positional `#tag` tokens in the body. Everything here
//! parses fresh per call; nothing is cached across operations.

pub mod file_ops;
pub mod frontmatter;
pub mod tags;

pub use frontmatter::{parse_note, stringify_note, Note, Value};

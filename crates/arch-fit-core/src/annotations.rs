//! In-file annotations: `@arch`, `@intent:`, and `@override` blocks.
//!
//! Only comment lines are inspected. The `@arch` tag and file-level intents
//! must sit in the leading comment block; override blocks may appear anywhere.

use std::sync::OnceLock;

use regex::Regex;

fn arch_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@arch\s+([A-Za-z0-9_][\w.\-]*)").unwrap_or_else(|e| panic!("regex: {e}"))
    })
}

fn intent_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@intent:([\w\-./]+)").unwrap_or_else(|e| panic!("regex: {e}"))
    })
}

/// An `@override` block as written in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideAnnotation {
    /// Rule name before the first `:`.
    pub rule: String,
    /// Value after the first `:` (may itself contain `:`).
    pub value: String,
    /// `@reason` text, quotes stripped.
    pub reason: Option<String>,
    /// Raw `@expires` text.
    pub expires: Option<String>,
    /// `@ticket` text.
    pub ticket: Option<String>,
    /// Line of the `@override` tag (1-indexed).
    pub line: usize,
}

/// Everything the engine reads from a file's comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnnotations {
    /// Architecture id from `@arch`.
    pub arch_id: Option<String>,
    /// Line of the `@arch` tag.
    pub arch_line: usize,
    /// File-level intents.
    pub intents: Vec<String>,
    /// Override blocks in source order.
    pub overrides: Vec<OverrideAnnotation>,
}

/// Returns the text of a comment line with its markers removed, or `None` for code.
fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with("#[") || trimmed.starts_with("#![") {
        return None;
    }
    let stripped = ["///", "//!", "//", "/**", "/*", "#", "*/", "*"]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))?;
    Some(stripped.trim_end_matches("*/").trim())
}

fn is_preamble(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with("#!")
}

/// Extracts the `@arch` id from the leading comment block.
#[must_use]
pub fn extract_arch_tag(content: &str) -> Option<String> {
    parse_file_annotations(content).arch_id
}

/// Collects distinct `@intent:` markers from free text, such as a doc comment.
#[must_use]
pub fn extract_intents(text: &str) -> Vec<String> {
    let mut intents: Vec<String> = Vec::new();
    for cap in intent_marker().captures_iter(text) {
        if !intents.iter().any(|i| i == &cap[1]) {
            intents.push(cap[1].to_string());
        }
    }
    intents
}

/// Parses all annotations in `content`.
#[must_use]
pub fn parse_file_annotations(content: &str) -> FileAnnotations {
    let mut annotations = FileAnnotations::default();
    let mut in_leading_block = true;
    let mut in_block_comment = false;
    let mut in_docstring = false;
    let mut current: Option<OverrideAnnotation> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        let opens_docstring = trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''");
        let text = if in_docstring || opens_docstring {
            let closes = trimmed.ends_with("\"\"\"") || trimmed.ends_with("'''");
            in_docstring = if in_docstring {
                !closes
            } else {
                !(closes && trimmed.len() > 3)
            };
            Some(trimmed.trim_matches(['"', '\'']).trim())
        } else if in_block_comment {
            Some(comment_text(line).unwrap_or(trimmed))
        } else {
            comment_text(line)
        };
        if trimmed.starts_with("/*") && !trimmed.contains("*/") {
            in_block_comment = true;
        } else if in_block_comment && trimmed.contains("*/") {
            in_block_comment = false;
        }

        let Some(text) = text else {
            if !is_preamble(line) {
                in_leading_block = false;
            }
            annotations.overrides.extend(current.take());
            continue;
        };

        if in_leading_block {
            if annotations.arch_id.is_none() {
                if let Some(cap) = arch_tag().captures(text) {
                    annotations.arch_id = Some(cap[1].to_string());
                    annotations.arch_line = line_no;
                }
            }
            for cap in intent_marker().captures_iter(text) {
                let intent = cap[1].to_string();
                if !annotations.intents.contains(&intent) {
                    annotations.intents.push(intent);
                }
            }
        }

        if let Some(rest) = text.strip_prefix("@override") {
            annotations.overrides.extend(current.take());
            let target = rest.trim();
            let (rule, value) = target.split_once(':').unwrap_or((target, ""));
            current = Some(OverrideAnnotation {
                rule: rule.trim().to_string(),
                value: value.trim().to_string(),
                line: line_no,
                ..OverrideAnnotation::default()
            });
        } else if let Some(block) = current.as_mut() {
            if let Some(rest) = text.strip_prefix("@reason") {
                block.reason = non_empty(unquote(rest.trim()));
            } else if let Some(rest) = text.strip_prefix("@expires") {
                block.expires = non_empty(rest.trim());
            } else if let Some(rest) = text.strip_prefix("@ticket") {
                block.ticket = non_empty(rest.trim());
            }
        }
    }
    annotations.overrides.extend(current);
    annotations
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

//! Patch rules.
//!
//! Pure find/replace computation with the safety checks an edit must pass
//! before anything touches disk. The infrastructure patch engine adds the
//! locking, backups and atomic write around [`compute_patch`].

use crate::tool::value_objects::ToolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8192;

/// Lines of context shown around a change in [`preview`].
const PREVIEW_CONTEXT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Pattern not found (expected {expected}, found {found})")]
    NoMatch { expected: u32, found: usize },

    #[error("Pattern is ambiguous (expected {expected}, found {found})")]
    AmbiguousMatch { expected: u32, found: usize },

    #[error("Unsafe edit: {0}")]
    UnsafeEdit(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl PatchError {
    pub fn code(&self) -> &'static str {
        match self {
            PatchError::NoMatch { .. } => "NO_MATCH",
            PatchError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            PatchError::UnsafeEdit(_) => "UNSAFE_EDIT",
            PatchError::NotFound(_) => "NOT_FOUND",
            PatchError::Io(_) => "EXECUTION_FAILED",
        }
    }
}

impl From<PatchError> for ToolError {
    fn from(e: PatchError) -> Self {
        ToolError::new(e.code(), e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub find: String,
    pub replace: String,
    pub expected_occurrences: u32,
}

impl PatchRequest {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            expected_occurrences: 1,
        }
    }

    pub fn expecting(mut self, occurrences: u32) -> Self {
        self.expected_occurrences = occurrences;
        self
    }
}

/// Result of a successful computation, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchComputation {
    pub new_content: String,
    /// 1-based first line touched, in the original content
    pub start_line: usize,
    /// 1-based last line touched, in the original content
    pub end_line: usize,
    pub lines_removed: usize,
    pub lines_added: usize,
    /// New line count minus old line count
    pub line_delta: i64,
}

/// Whether `bytes` look like a binary file (NUL byte near the start, or not UTF-8).
pub fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    head.contains(&0) || std::str::from_utf8(bytes).is_err()
}

/// Decode file bytes as text, rejecting binary content.
pub fn decode_text(bytes: &[u8]) -> Result<&str, PatchError> {
    if bytes.contains(&0) {
        return Err(PatchError::UnsafeEdit("binary file".into()));
    }
    std::str::from_utf8(bytes).map_err(|_| PatchError::UnsafeEdit("file is not valid UTF-8".into()))
}

fn check_request(request: &PatchRequest) -> Result<(), PatchError> {
    if request.find.is_empty() {
        return Err(PatchError::UnsafeEdit("find pattern is empty".into()));
    }
    if request.find == request.replace {
        return Err(PatchError::UnsafeEdit("find and replace are identical".into()));
    }
    if request.expected_occurrences == 0 {
        return Err(PatchError::UnsafeEdit(
            "expected_occurrences must be at least 1".into(),
        ));
    }
    Ok(())
}

fn line_span(text: &str) -> usize {
    text.matches('\n').count() + 1
}

fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Apply a find/replace to `content` if it matches exactly as expected.
///
/// Never guesses: any count other than `expected_occurrences` is an error and
/// `content` is returned untouched by the caller.
pub fn compute_patch(content: &str, request: &PatchRequest) -> Result<PatchComputation, PatchError> {
    check_request(request)?;

    let positions: Vec<usize> = content
        .match_indices(request.find.as_str())
        .map(|(pos, _)| pos)
        .collect();
    let expected = request.expected_occurrences;
    let found = positions.len();

    if found == 0 || found < expected as usize {
        return Err(PatchError::NoMatch { expected, found });
    }
    if found > expected as usize {
        return Err(PatchError::AmbiguousMatch { expected, found });
    }

    let first = positions[0];
    let last = positions[found - 1];
    let start_line = content[..first].matches('\n').count() + 1;
    let end_line = content[..last + request.find.len()].matches('\n').count() + 1;

    let new_content = content.replacen(request.find.as_str(), &request.replace, found);
    let line_delta = line_count(&new_content) as i64 - line_count(content) as i64;

    Ok(PatchComputation {
        start_line,
        end_line,
        lines_removed: line_span(&request.find) * found,
        lines_added: line_span(&request.replace) * found,
        line_delta,
        new_content,
    })
}

/// Render a unified-style preview of the first change without applying it.
pub fn preview(path: &str, content: &str, request: &PatchRequest) -> Result<String, PatchError> {
    let computation = compute_patch(content, request)?;

    let old_lines: Vec<&str> = content.lines().collect();
    let first = computation.start_line - 1;
    let span = line_span(&request.find);
    let last = (first + span).min(old_lines.len());
    let ctx_start = first.saturating_sub(PREVIEW_CONTEXT);
    let ctx_end = (last + PREVIEW_CONTEXT).min(old_lines.len());

    // The affected lines with the first occurrence substituted.
    let affected = old_lines[first..last].join("\n");
    let replaced = affected.replacen(request.find.as_str(), &request.replace, 1);

    let mut out = format!("--- {}\n+++ {}\n", path, path);
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        ctx_start + 1,
        ctx_end - ctx_start,
        ctx_start + 1,
        (ctx_end - ctx_start) + replaced.lines().count() - (last - first)
    ));
    for line in &old_lines[ctx_start..first] {
        out.push_str(&format!(" {}\n", line));
    }
    for line in &old_lines[first..last] {
        out.push_str(&format!("-{}\n", line));
    }
    for line in replaced.lines() {
        out.push_str(&format!("+{}\n", line));
    }
    for line in &old_lines[last..ctx_end] {
        out.push_str(&format!(" {}\n", line));
    }
    if request.expected_occurrences > 1 {
        out.push_str(&format!(
            "... and {} more occurrence(s)\n",
            request.expected_occurrences - 1
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_match_equals_manual_replace() {
        let content = "def foo():\n    return 1\n";
        let result = compute_patch(content, &PatchRequest::new("foo", "bar")).unwrap();
        assert_eq!(result.new_content, content.replacen("foo", "bar", 1));
        assert_eq!(result.start_line, 1);
        assert_eq!(result.end_line, 1);
        assert_eq!(result.line_delta, 0);
    }

    #[test]
    fn test_no_match_and_ambiguous() {
        assert_eq!(
            compute_patch("abc", &PatchRequest::new("zzz", "y")),
            Err(PatchError::NoMatch { expected: 1, found: 0 })
        );
        assert_eq!(
            compute_patch("foo foo", &PatchRequest::new("foo", "bar")),
            Err(PatchError::AmbiguousMatch { expected: 1, found: 2 })
        );
        assert_eq!(
            compute_patch("foo", &PatchRequest::new("foo", "bar").expecting(2)),
            Err(PatchError::NoMatch { expected: 2, found: 1 })
        );
    }

    #[test]
    fn test_expected_occurrences_replaces_all_of_them() {
        let content = "a\nfoo\nb\nfoo\n";
        let result =
            compute_patch(content, &PatchRequest::new("foo", "bar\nbaz").expecting(2)).unwrap();
        assert_eq!(result.new_content, "a\nbar\nbaz\nb\nbar\nbaz\n");
        assert_eq!(result.start_line, 2);
        assert_eq!(result.end_line, 4);
        assert_eq!(result.lines_removed, 2);
        assert_eq!(result.lines_added, 4);
        assert_eq!(result.line_delta, 2);
    }

    #[test]
    fn test_unsafe_requests() {
        assert!(matches!(
            compute_patch("abc", &PatchRequest::new("", "x")),
            Err(PatchError::UnsafeEdit(_))
        ));
        assert!(matches!(
            compute_patch("abc", &PatchRequest::new("a", "a")),
            Err(PatchError::UnsafeEdit(_))
        ));
        assert!(matches!(
            compute_patch("abc", &PatchRequest::new("a", "b").expecting(0)),
            Err(PatchError::UnsafeEdit(_))
        ));
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_binary(b"\x00\x01\x02"));
        assert!(is_binary(&[0xff, 0xfe, 0x41]));
        assert!(!is_binary("plain text".as_bytes()));
        assert!(matches!(decode_text(b"ab\x00"), Err(PatchError::UnsafeEdit(_))));
        assert_eq!(decode_text(b"ok").unwrap(), "ok");
    }

    #[test]
    fn test_multiline_find_range() {
        let content = "one\ntwo\nthree\nfour\n";
        let result = compute_patch(content, &PatchRequest::new("two\nthree", "2")).unwrap();
        assert_eq!(result.start_line, 2);
        assert_eq!(result.end_line, 3);
        assert_eq!(result.line_delta, -1);
        assert_eq!(result.new_content, "one\n2\nfour\n");
    }

    #[test]
    fn test_preview_shows_change_with_context() {
        let content = "l1\nl2\nl3\nl4 foo\nl5\n";
        let text = preview("a.py", content, &PatchRequest::new("foo", "bar")).unwrap();
        assert!(text.starts_with("--- a.py\n+++ a.py\n"));
        assert!(text.contains("-l4 foo\n"));
        assert!(text.contains("+l4 bar\n"));
        assert!(text.contains(" l1\n"));
        assert!(text.contains(" l5\n"));
    }

    #[test]
    fn test_error_codes_map_to_tool_errors() {
        let error: ToolError = PatchError::AmbiguousMatch { expected: 1, found: 3 }.into();
        assert_eq!(error.code, "AMBIGUOUS_MATCH");
    }
}

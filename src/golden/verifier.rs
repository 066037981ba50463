use super::diff::{DiffLine, DiffTag, LineDiff};
use crate::manifest::{ReleaseMetadata, CORE_FIELDS};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::Write as _;

pub const DEFAULT_CONTEXT_LINES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<LineDiff>,
    /// No golden artifact existed; compared against empty input
    #[serde(default)]
    pub golden_missing: bool,
}

impl VerificationResult {
    fn matched() -> Self {
        Self {
            matched: true,
            diff: None,
            golden_missing: false,
        }
    }
}

/// Strips every trailing `\n` / `\r\n` terminator. Nothing else is
/// normalized.
pub fn normalize_trailing_newlines(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && bytes[end - 1] == b'\r' {
            end -= 1;
        }
    }
    &bytes[..end]
}

/// Text for the line diff. When either side is not UTF-8, both sides are
/// escaped (`\\` for a backslash, `\xNN` for an invalid byte) so distinct
/// bytes never collapse into the same line.
fn diff_text<'a>(golden: &'a [u8], current: &'a [u8]) -> (Cow<'a, str>, Cow<'a, str>) {
    match (std::str::from_utf8(golden), std::str::from_utf8(current)) {
        (Ok(golden), Ok(current)) => (Cow::Borrowed(golden), Cow::Borrowed(current)),
        _ => (
            Cow::Owned(escape_bytes(golden)),
            Cow::Owned(escape_bytes(current)),
        ),
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            if ch == '\\' {
                text.push_str("\\\\");
            } else {
                text.push(ch);
            }
        }
        for byte in chunk.invalid() {
            let _ = write!(text, "\\x{:02x}", byte);
        }
    }
    text
}

/// Byte-exact comparison of rendered output against a golden artifact.
#[derive(Debug, Clone)]
pub struct Verifier {
    context_lines: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn verify(&self, current: &[u8], golden: &[u8]) -> VerificationResult {
        let current = normalize_trailing_newlines(current);
        let golden = normalize_trailing_newlines(golden);

        if current == golden {
            return VerificationResult::matched();
        }

        let (golden, current) = diff_text(golden, current);
        let diff = LineDiff::compute(&golden, &current, self.context_lines);

        VerificationResult {
            matched: false,
            diff: Some(diff),
            golden_missing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedLine {
    pub line: DiffLine,
    pub fields: Vec<String>,
}

/// Changed lines split by whether a metadata change accounts for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffExplanation {
    pub explained: Vec<ExplainedLine>,
    pub unexplained: Vec<DiffLine>,
}

impl DiffExplanation {
    /// True when every changed line is due to a metadata change, i.e. the
    /// template itself did not regress.
    pub fn is_fully_explained(&self) -> bool {
        self.unexplained.is_empty()
    }
}

/// Attributes each changed line of `diff` to the metadata fields whose
/// value differs between `old` (golden) and `new` (current) and appears in
/// the line.
pub fn explain(diff: &LineDiff, old: &ReleaseMetadata, new: &ReleaseMetadata) -> DiffExplanation {
    let mut names: BTreeSet<&str> = CORE_FIELDS.iter().copied().collect();
    names.insert("class_name");
    names.extend(old.extra.keys().map(String::as_str));
    names.extend(new.extra.keys().map(String::as_str));

    let changed: Vec<(&str, String, String)> = names
        .into_iter()
        .filter_map(|name| {
            let before = old.field(name).unwrap_or_default();
            let after = new.field(name).unwrap_or_default();
            (before != after).then(|| (name, before, after))
        })
        .collect();

    let mut explanation = DiffExplanation::default();
    for line in diff.changed_lines() {
        let fields: Vec<String> = changed
            .iter()
            .filter(|(_, before, after)| {
                let value = match line.tag {
                    DiffTag::Removed => before,
                    _ => after,
                };
                !value.is_empty() && line.text.contains(value.as_str())
            })
            .map(|(name, _, _)| name.to_string())
            .collect();

        if fields.is_empty() {
            explanation.unexplained.push(line.clone());
        } else {
            explanation.explained.push(ExplainedLine {
                line: line.clone(),
                fields,
            });
        }
    }
    explanation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_matches() {
        let result = Verifier::new().verify(b"class Jx\nend\n", b"class Jx\nend\n");
        assert!(result.matched);
        assert!(result.diff.is_none());
    }

    #[test]
    fn test_trailing_newlines_normalized() {
        let verifier = Verifier::new();
        assert!(verifier.verify(b"end\n", b"end").matched);
        assert!(verifier.verify(b"end\r\n", b"end\n\n").matched);
    }

    #[test]
    fn test_other_whitespace_is_significant() {
        let verifier = Verifier::new();
        assert!(!verifier.verify(b"end \n", b"end\n").matched);
        assert!(!verifier.verify(b"a\r\nb\n", b"a\nb\n").matched);
        assert!(!verifier.verify(b"\nend", b"end").matched);
    }

    #[test]
    fn test_mismatch_reports_diff() {
        let result = Verifier::new().verify(b"version \"1.0.2\"\n", b"version \"1.0.1\"\n");
        assert!(!result.matched);
        let diff = result.diff.unwrap();
        assert_eq!(diff.changed_lines().count(), 2);
    }

    #[test]
    fn test_invalid_utf8_mismatch_has_a_diff() {
        let result = Verifier::new().verify(b"sha256 \xff\n", b"sha256 \xfe\n");
        assert!(!result.matched);

        let diff = result.diff.unwrap();
        let changed: Vec<_> = diff.changed_lines().map(|l| l.text.as_str()).collect();
        assert_eq!(changed, vec!["sha256 \\xfe", "sha256 \\xff"]);
    }

    #[test]
    fn test_escaped_bytes_do_not_collide_with_text() {
        let result = Verifier::new().verify(b"a \\xff\n", b"a \xff\n");
        assert!(!result.matched);
        assert_eq!(result.diff.unwrap().changed_lines().count(), 2);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_trailing_newlines(b"x\r\n\n"), b"x");
        assert_eq!(normalize_trailing_newlines(b"\n"), b"");
        assert_eq!(normalize_trailing_newlines(b"x\r"), b"x\r");
    }

    #[test]
    fn test_explain_version_bump() {
        let old = ReleaseMetadata::new("jx", "1.0.1", "https://x/v{{version}}/jx.tgz", "aaa111");
        let new = ReleaseMetadata::new("jx", "1.0.2", "https://x/v{{version}}/jx.tgz", "bbb222");

        let golden = "version \"1.0.1\"\nurl \"https://x/v1.0.1/jx.tgz\"\nsha256 \"aaa111\"\n";
        let current = "version \"1.0.2\"\nurl \"https://x/v1.0.2/jx.tgz\"\nsha256 \"bbb222\"\n";
        let diff = LineDiff::compute(golden, current, 2);

        let explanation = explain(&diff, &old, &new);
        assert!(explanation.is_fully_explained());
        assert_eq!(explanation.explained.len(), 6);
        assert!(explanation.explained[0].fields.contains(&"version".to_string()));
    }

    #[test]
    fn test_explain_flags_template_regression() {
        let old = ReleaseMetadata::new("jx", "1.0.1", "u", "aaa");
        let new = ReleaseMetadata::new("jx", "1.0.2", "u", "aaa");
        let diff = LineDiff::compute("version 1.0.1\nbin.install name\n", "version 1.0.2\nbin.install \"jx\"\n", 2);

        let explanation = explain(&diff, &old, &new);
        assert!(!explanation.is_fully_explained());
        assert_eq!(explanation.unexplained.len(), 2);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of evidence a scanner can extract from a project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    HasMarkerFile,
    HasExtension,
    HasShebang,
    ContentMatch,
    /// Language forced by a `linguist-language` attribute; replaces the
    /// extension signal for that file.
    HasLanguage,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::HasMarkerFile => "marker",
            SignalKind::HasExtension => "extension",
            SignalKind::HasShebang => "shebang",
            SignalKind::ContentMatch => "content",
            SignalKind::HasLanguage => "language",
        }
    }
}

/// One piece of evidence. `path` is relative to the scan root.
///
/// The derived ordering (kind, value, path) is the canonical order the
/// classifier normalizes to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectSignal {
    pub kind: SignalKind,
    pub value: String,
    pub path: PathBuf,
}

impl ProjectSignal {
    pub fn new(kind: SignalKind, value: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            value: value.into(),
            path: path.into(),
        }
    }

    pub fn marker(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(SignalKind::HasMarkerFile, name, path)
    }

    pub fn extension(ext: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(SignalKind::HasExtension, ext, path)
    }

    pub fn shebang(interpreter: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(SignalKind::HasShebang, interpreter, path)
    }

    pub fn content(rule_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(SignalKind::ContentMatch, rule_id, path)
    }

    pub fn language(language: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(SignalKind::HasLanguage, language, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ProjectSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.kind.name(),
            self.value,
            self.path.display()
        )
    }
}

/// Sorts and deduplicates signals so downstream results never depend on the
/// order the file system produced them in.
pub fn normalize(signals: &[ProjectSignal]) -> Vec<ProjectSignal> {
    let mut normalized = signals.to_vec();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Extracts the interpreter name from a `#!` line.
///
/// `#!/usr/bin/env -S node --harmony` yields `node`, `#!/usr/bin/python3.11`
/// yields `python`. Version suffixes are dropped so one predicate covers every
/// release of an interpreter.
pub fn parse_shebang(head: &[u8]) -> Option<String> {
    let rest = head.strip_prefix(b"#!")?;
    let line_end = rest.iter().position(|b| *b == b'\n').unwrap_or(rest.len());
    let line = std::str::from_utf8(&rest[..line_end]).ok()?.trim();

    let mut tokens = line.split_whitespace();
    let program = tokens.next()?;
    let program = program.rsplit('/').next().unwrap_or(program);

    let interpreter = if program == "env" {
        tokens.find(|t| !t.starts_with('-') && !t.contains('='))?
    } else {
        program
    };
    let interpreter = interpreter.rsplit('/').next().unwrap_or(interpreter);

    let trimmed = interpreter.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shebang_env() {
        assert_eq!(
            parse_shebang(b"#!/usr/bin/env node\nconsole.log(1)"),
            Some("node".to_string())
        );
        assert_eq!(
            parse_shebang(b"#!/usr/bin/env -S node --harmony\n"),
            Some("node".to_string())
        );
    }

    #[test]
    fn test_parse_shebang_direct_path_drops_version() {
        assert_eq!(
            parse_shebang(b"#!/usr/bin/python3.11\n"),
            Some("python".to_string())
        );
        assert_eq!(parse_shebang(b"#! /bin/bash\n"), Some("bash".to_string()));
    }

    #[test]
    fn test_parse_shebang_rejects_plain_files() {
        assert_eq!(parse_shebang(b"console.log('hi')"), None);
        assert_eq!(parse_shebang(b"#!"), None);
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let signals = vec![
            ProjectSignal::extension("js", "b.js"),
            ProjectSignal::marker("package.json", "package.json"),
            ProjectSignal::extension("js", "a.js"),
            ProjectSignal::marker("package.json", "package.json"),
        ];

        let normalized = normalize(&signals);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].kind, SignalKind::HasMarkerFile);
        assert_eq!(normalized[1].path, PathBuf::from("a.js"));
    }

    #[test]
    fn test_display() {
        let signal = ProjectSignal::shebang("node", "bin/server");
        assert_eq!(signal.to_string(), "shebang:node (bin/server)");
    }
}

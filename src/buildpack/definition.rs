use crate::scan::{ProjectSignal, SignalKind};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// A test a single signal either satisfies or not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignalPredicate {
    /// A file with this exact name anywhere in the tree
    MarkerFile(String),
    /// A marker file at this root-relative path (`env/Chart.yaml`). Directory
    /// components may be glob patterns (`charts/*/Chart.yaml`); `*` never
    /// crosses a `/`. Alternatives are separated by `|` and must share the
    /// same literal file name.
    MarkerPath(String),
    /// A file with this extension (compared case-insensitively)
    Extension(String),
    /// A script whose shebang names this interpreter
    Shebang(String),
    /// A content rule with this id matched
    ContentMatch(String),
    /// A file whose `linguist-language` attribute names this language
    /// (compared case-insensitively)
    Language(String),
}

impl SignalPredicate {
    pub fn matches(&self, signal: &ProjectSignal) -> bool {
        match (self, signal.kind) {
            (SignalPredicate::MarkerFile(name), SignalKind::HasMarkerFile) => signal.value == *name,
            (SignalPredicate::MarkerPath(path), SignalKind::HasMarkerFile) => {
                marker_path_matches(path, &signal.path)
            }
            (SignalPredicate::Extension(ext), SignalKind::HasExtension) => {
                signal.value.eq_ignore_ascii_case(ext)
            }
            (SignalPredicate::Shebang(interp), SignalKind::HasShebang) => signal.value == *interp,
            (SignalPredicate::ContentMatch(id), SignalKind::ContentMatch) => signal.value == *id,
            (SignalPredicate::Language(lang), SignalKind::HasLanguage) => {
                signal.value.eq_ignore_ascii_case(lang)
            }
            _ => false,
        }
    }

    /// File name a scanner must treat as a marker for this predicate to fire.
    pub fn marker_name(&self) -> Option<&str> {
        match self {
            SignalPredicate::MarkerFile(name) => Some(name),
            SignalPredicate::MarkerPath(path) => path
                .split('|')
                .next()
                .and_then(|first| Path::new(first).file_name())
                .and_then(|n| n.to_str()),
            _ => None,
        }
    }

    fn kind(&self) -> PredicateKind {
        match self {
            SignalPredicate::MarkerFile(_) => PredicateKind::MarkerFile,
            SignalPredicate::MarkerPath(_) => PredicateKind::MarkerPath,
            SignalPredicate::Extension(_) => PredicateKind::Extension,
            SignalPredicate::Shebang(_) => PredicateKind::Shebang,
            SignalPredicate::ContentMatch(_) => PredicateKind::ContentMatch,
            SignalPredicate::Language(_) => PredicateKind::Language,
        }
    }

    fn value(&self) -> &str {
        match self {
            SignalPredicate::MarkerFile(v)
            | SignalPredicate::MarkerPath(v)
            | SignalPredicate::Extension(v)
            | SignalPredicate::Shebang(v)
            | SignalPredicate::ContentMatch(v)
            | SignalPredicate::Language(v) => v,
        }
    }
}

fn marker_path_matches(patterns: &str, path: &Path) -> bool {
    patterns
        .split('|')
        .any(|pattern| marker_pattern_matches(pattern, path))
}

fn marker_pattern_matches(pattern: &str, path: &Path) -> bool {
    if !pattern.contains(['*', '?', '[']) {
        return path == Path::new(pattern);
    }
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_path_with(path, options),
        Err(err) => {
            warn!(pattern, error = %err, "Invalid marker path pattern");
            false
        }
    }
}

impl fmt::Display for SignalPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind().name(), self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PredicateKind {
    MarkerFile,
    MarkerPath,
    Extension,
    Shebang,
    ContentMatch,
    Language,
}

impl PredicateKind {
    fn name(&self) -> &'static str {
        match self {
            PredicateKind::MarkerFile => "marker_file",
            PredicateKind::MarkerPath => "marker_path",
            PredicateKind::Extension => "extension",
            PredicateKind::Shebang => "shebang",
            PredicateKind::ContentMatch => "content_match",
            PredicateKind::Language => "language",
        }
    }
}

/// On-disk shape of a weighted predicate: `{type, value, weight, mandatory}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeightedPredicateSpec {
    #[serde(rename = "type")]
    kind: PredicateKind,
    value: String,
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default)]
    mandatory: bool,
}

fn default_weight() -> u32 {
    1
}

/// A predicate plus its score contribution. Mandatory predicates gate
/// eligibility as well as contributing their weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WeightedPredicateSpec", into = "WeightedPredicateSpec")]
pub struct WeightedPredicate {
    pub predicate: SignalPredicate,
    pub weight: u32,
    pub mandatory: bool,
}

impl From<WeightedPredicateSpec> for WeightedPredicate {
    fn from(spec: WeightedPredicateSpec) -> Self {
        let predicate = match spec.kind {
            PredicateKind::MarkerFile => SignalPredicate::MarkerFile(spec.value),
            PredicateKind::MarkerPath => SignalPredicate::MarkerPath(spec.value),
            PredicateKind::Extension => SignalPredicate::Extension(spec.value),
            PredicateKind::Shebang => SignalPredicate::Shebang(spec.value),
            PredicateKind::ContentMatch => SignalPredicate::ContentMatch(spec.value),
            PredicateKind::Language => SignalPredicate::Language(spec.value),
        };
        Self {
            predicate,
            weight: spec.weight,
            mandatory: spec.mandatory,
        }
    }
}

impl From<WeightedPredicate> for WeightedPredicateSpec {
    fn from(wp: WeightedPredicate) -> Self {
        Self {
            kind: wp.predicate.kind(),
            value: wp.predicate.value().to_string(),
            weight: wp.weight,
            mandatory: wp.mandatory,
        }
    }
}

/// A named ecosystem the classifier can select.
///
/// Lower `priority` wins score ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: u32,
    pub signals: Vec<WeightedPredicate>,
}

impl BuildpackDefinition {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority,
            signals: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mandatory(mut self, predicate: SignalPredicate, weight: u32) -> Self {
        self.signals.push(WeightedPredicate {
            predicate,
            weight,
            mandatory: true,
        });
        self
    }

    pub fn optional(mut self, predicate: SignalPredicate, weight: u32) -> Self {
        self.signals.push(WeightedPredicate {
            predicate,
            weight,
            mandatory: false,
        });
        self
    }

    pub fn mandatory_predicates(&self) -> impl Iterator<Item = &SignalPredicate> {
        self.signals
            .iter()
            .filter(|wp| wp.mandatory)
            .map(|wp| &wp.predicate)
    }

    pub fn marker_names(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().filter_map(|wp| wp.predicate.marker_name())
    }
}

use super::template::tag_regex;
use crate::error::RenderError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Fields every release carries. Extra header fields may not reuse these
/// names.
pub const CORE_FIELDS: &[&str] = &[
    "binary_name",
    "version",
    "download_url",
    "checksum",
    "checksum_algorithm",
];

/// Placeholders an artifact URL template may use.
const URL_FIELDS: &[&str] = &["binary_name", "version"];

fn semver_regex() -> &'static Regex {
    static SEMVER: OnceLock<Regex> = OnceLock::new();
    SEMVER.get_or_init(|| {
        Regex::new(
            r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
        )
        .expect("valid regex")
    })
}

pub fn is_semver(version: &str) -> bool {
    semver_regex().is_match(version)
}

/// Shells a formula can install completions for. Rendered in declaration
/// order: bash, zsh, fish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }

    /// Homebrew directory the completion script is written to
    pub fn completion_dir(&self) -> &'static str {
        match self {
            Shell::Bash => "bash_completion",
            Shell::Zsh => "zsh_completion",
            Shell::Fish => "fish_completion",
        }
    }

    pub fn completion_file(&self, binary_name: &str) -> String {
        match self {
            Shell::Bash => binary_name.to_string(),
            Shell::Zsh => format!("_{}", binary_name),
            Shell::Fish => format!("{}.fish", binary_name),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            "fish" => Ok(Shell::Fish),
            other => Err(format!(
                "unsupported shell '{}' (expected bash, zsh or fish)",
                other
            )),
        }
    }
}

fn default_checksum_algorithm() -> String {
    "sha256".to_string()
}

/// Everything a release contributes to a rendered manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub binary_name: String,
    pub version: String,
    /// URL with `{{version}}` / `{{binary_name}}` placeholders
    pub artifact_url_template: String,
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,
    pub checksum_value: String,
    #[serde(default)]
    pub completion_shells: BTreeSet<Shell>,
    /// Free-form header fields such as `description` or `homepage`
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ReleaseMetadata {
    pub fn new(
        binary_name: impl Into<String>,
        version: impl Into<String>,
        artifact_url_template: impl Into<String>,
        checksum_value: impl Into<String>,
    ) -> Self {
        Self {
            binary_name: binary_name.into(),
            version: version.into(),
            artifact_url_template: artifact_url_template.into(),
            checksum_algorithm: default_checksum_algorithm(),
            checksum_value: checksum_value.into(),
            completion_shells: BTreeSet::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_checksum_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.checksum_algorithm = algorithm.into();
        self
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.completion_shells.insert(shell);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Artifact URL with `{{version}}` and `{{binary_name}}` substituted,
    /// using the same tag syntax as templates (`{{ version }}` included).
    /// Any other tag is left as written; [`validate`](Self::validate)
    /// rejects such URLs.
    pub fn download_url(&self) -> String {
        tag_regex()
            .replace_all(&self.artifact_url_template, |caps: &Captures| {
                match (&caps[1], &caps[2]) {
                    ("", "binary_name") => self.binary_name.clone(),
                    ("", "version") => self.version.clone(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// First placeholder in the URL template that `download_url` cannot
    /// resolve.
    fn unresolved_url_tag(&self) -> Option<String> {
        let unknown = tag_regex()
            .captures_iter(&self.artifact_url_template)
            .find(|caps| !caps[1].is_empty() || !URL_FIELDS.contains(&&caps[2]))
            .map(|caps| caps[0].to_string());
        if unknown.is_some() {
            return unknown;
        }
        let url = self.download_url();
        url.find("{{")
            .map(|start| url[start..].chars().take_while(|c| *c != '/').collect())
    }

    /// Ruby class name for the formula: `jx` becomes `Jx`, `jx-cli` becomes
    /// `JxCli`. An explicit `class_name` extra wins.
    pub fn class_name(&self) -> String {
        if let Some(name) = self.extra.get("class_name") {
            return name.clone();
        }
        self.binary_name
            .split(|c: char| c == '-' || c == '_' || c == '.')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Resolves a template field by name.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "binary_name" => Some(self.binary_name.clone()),
            "version" => Some(self.version.clone()),
            "download_url" => Some(self.download_url()),
            "checksum" => Some(self.checksum_value.clone()),
            "checksum_algorithm" => Some(self.checksum_algorithm.clone()),
            "class_name" => Some(self.class_name()),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.binary_name.trim().is_empty() {
            return Err(RenderError::InvalidMetadata(
                "binary name must not be empty".to_string(),
            ));
        }
        if !is_semver(&self.version) {
            return Err(RenderError::InvalidMetadata(format!(
                "version '{}' is not a semantic version",
                self.version
            )));
        }
        if self.checksum_value.trim().is_empty() {
            return Err(RenderError::InvalidMetadata(
                "checksum must not be empty".to_string(),
            ));
        }
        if self.checksum_algorithm.trim().is_empty() {
            return Err(RenderError::InvalidMetadata(
                "checksum algorithm must not be empty".to_string(),
            ));
        }
        if let Some(tag) = self.unresolved_url_tag() {
            return Err(RenderError::InvalidMetadata(format!(
                "artifact URL template uses '{}'; only {{{{version}}}} and {{{{binary_name}}}} are substituted",
                tag
            )));
        }
        if let Some(key) = self.extra.keys().find(|k| CORE_FIELDS.contains(&k.as_str())) {
            return Err(RenderError::InvalidMetadata(format!(
                "extra field '{}' shadows a core release field",
                key
            )));
        }
        Ok(())
    }
}

use super::definition::{BuildpackDefinition, SignalPredicate};
use crate::error::RegistryError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use SignalPredicate::{ContentMatch, Extension, Language, MarkerFile, MarkerPath, Shebang};

const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "__pycache__",
    ".venv",
    ".idea",
    ".vscode",
];

/// A regular expression evaluated against the head of every file named
/// `file_name`. A hit produces a `ContentMatch(id)` signal.
#[derive(Debug, Clone)]
pub struct ContentRule {
    pub id: String,
    pub file_name: String,
    pub pattern: Regex,
}

impl ContentRule {
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, RegistryError> {
        let id = id.into();
        let pattern = Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
            id: id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            file_name: file_name.into(),
            pattern,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentRuleSpec {
    id: String,
    file_name: String,
    pattern: String,
}

/// Registry file layout (YAML or TOML).
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    /// Start from the built-in packs; file entries with the same name replace them
    #[serde(default)]
    extends_defaults: bool,
    #[serde(default)]
    buildpacks: Vec<BuildpackDefinition>,
    #[serde(default)]
    content_rules: Vec<ContentRuleSpec>,
    #[serde(default)]
    excluded_dirs: Vec<String>,
}

/// Caller-supplied set of buildpack definitions plus the content rules and
/// directory exclusions the scanner needs to produce matching signals.
#[derive(Debug, Clone)]
pub struct BuildpackRegistry {
    buildpacks: Vec<Arc<BuildpackDefinition>>,
    content_rules: Vec<ContentRule>,
    excluded_dirs: Vec<String>,
}

impl BuildpackRegistry {
    pub fn new() -> Self {
        Self {
            buildpacks: Vec::new(),
            content_rules: Vec::new(),
            excluded_dirs: Vec::new(),
        }
    }

    /// The Jenkins X pack set, in the order `jx import` tries them.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for def in default_buildpacks() {
            registry.upsert(def);
        }
        for rule in default_content_rules() {
            registry.content_rules.push(rule);
        }
        registry.excluded_dirs = DEFAULT_EXCLUDED_DIRS.iter().map(|d| d.to_string()).collect();
        registry
    }

    /// Adds a definition, rejecting duplicate names.
    pub fn register(&mut self, def: BuildpackDefinition) -> Result<(), RegistryError> {
        if self.get(&def.name).is_some() {
            return Err(RegistryError::DuplicateBuildpack(def.name));
        }
        self.buildpacks.push(Arc::new(def));
        Ok(())
    }

    /// Adds a definition, replacing any existing one with the same name.
    pub fn upsert(&mut self, def: BuildpackDefinition) {
        let def = Arc::new(def);
        match self.buildpacks.iter_mut().find(|b| b.name == def.name) {
            Some(slot) => *slot = def,
            None => self.buildpacks.push(def),
        }
    }

    pub fn add_content_rule(&mut self, rule: ContentRule) {
        self.content_rules.retain(|r| r.id != rule.id);
        self.content_rules.push(rule);
    }

    pub fn add_excluded_dir(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.excluded_dirs.contains(&name) {
            self.excluded_dirs.push(name);
        }
    }

    pub fn buildpacks(&self) -> &[Arc<BuildpackDefinition>] {
        &self.buildpacks
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BuildpackDefinition>> {
        self.buildpacks.iter().find(|b| b.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.buildpacks.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.buildpacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildpacks.is_empty()
    }

    pub fn content_rules(&self) -> &[ContentRule] {
        &self.content_rules
    }

    pub fn content_rules_for<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = &'a ContentRule> {
        self.content_rules
            .iter()
            .filter(move |r| r.file_name == file_name)
    }

    pub fn excluded_dirs(&self) -> &[String] {
        &self.excluded_dirs
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    /// Every file name some predicate treats as a marker.
    pub fn marker_names(&self) -> BTreeSet<&str> {
        self.buildpacks
            .iter()
            .flat_map(|b| b.marker_names())
            .collect()
    }

    pub fn is_marker(&self, file_name: &str) -> bool {
        self.buildpacks
            .iter()
            .any(|b| b.marker_names().any(|m| m == file_name))
    }

    /// Closest registered name by Jaro-Winkler similarity, for "did you mean"
    /// hints on unknown `--pack` values.
    pub fn closest_name(&self, name: &str) -> Option<&str> {
        self.buildpacks
            .iter()
            .map(|b| (strsim::jaro_winkler(name, &b.name), b.name.as_str()))
            .filter(|(score, _)| *score >= 0.7)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n)
    }

    /// Loads a registry file, choosing the parser by extension
    /// (`.toml`, otherwise YAML).
    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let registry = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        debug!(
            path = %path.display(),
            buildpacks = registry.len(),
            "Loaded buildpack registry"
        );
        Ok(registry)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            serde_yaml::from_str(content).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: RegistryFile) -> Result<Self, RegistryError> {
        let mut registry = if file.extends_defaults {
            Self::with_defaults()
        } else {
            Self::new()
        };

        let mut seen = BTreeSet::new();
        for def in file.buildpacks {
            if !seen.insert(def.name.clone()) {
                return Err(RegistryError::DuplicateBuildpack(def.name));
            }
            registry.upsert(def);
        }
        for spec in file.content_rules {
            registry.add_content_rule(ContentRule::new(spec.id, spec.file_name, &spec.pattern)?);
        }
        for dir in file.excluded_dirs {
            registry.add_excluded_dir(dir);
        }

        Ok(registry)
    }
}

impl Default for BuildpackRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn marker_path(path: &str) -> SignalPredicate {
    MarkerPath(path.to_string())
}

fn ext(ext: &str) -> SignalPredicate {
    Extension(ext.to_string())
}

fn lang(language: &str) -> SignalPredicate {
    Language(language.to_string())
}

fn default_buildpacks() -> Vec<BuildpackDefinition> {
    vec![
        BuildpackDefinition::new("spring-boot", 5)
            .describe("Spring Boot application built with Maven")
            .mandatory(marker_path("pom.xml"), 10)
            .mandatory(ContentMatch("spring-boot".to_string()), 5)
            .optional(ext("java"), 3),
        BuildpackDefinition::new("maven", 10)
            .describe("Java project built with Maven")
            .mandatory(marker_path("pom.xml"), 10)
            .optional(ext("java"), 3)
            .optional(lang("java"), 3)
            .optional(ext("kt"), 1),
        BuildpackDefinition::new("gradle", 12)
            .describe("JVM project built with Gradle")
            .mandatory(marker_path("build.gradle"), 10)
            .optional(MarkerFile("settings.gradle".to_string()), 2)
            .optional(ext("java"), 3)
            .optional(ext("kt"), 3),
        BuildpackDefinition::new("jenkins", 14)
            .describe("Custom Jenkins server image")
            .mandatory(marker_path("plugins.txt"), 10),
        BuildpackDefinition::new("cwp", 15)
            .describe("CloudBees Jenkins custom war packager")
            .mandatory(marker_path("packager-config.yml"), 10),
        BuildpackDefinition::new("environment", 16)
            .describe("Jenkins X environment repository")
            .mandatory(marker_path("env/Chart.yaml"), 10),
        BuildpackDefinition::new("typescript", 25)
            .describe("Server-side TypeScript")
            .mandatory(marker_path("package.json"), 10)
            .mandatory(marker_path("tsconfig.json"), 3)
            .optional(ext("ts"), 3)
            .optional(lang("typescript"), 3)
            .optional(ContentMatch("node-server".to_string()), 3),
        BuildpackDefinition::new("javascript", 30)
            .describe("Server-side JavaScript runtime")
            .mandatory(marker_path("package.json"), 10)
            .optional(ext("js"), 3)
            .optional(lang("javascript"), 3)
            .optional(Shebang("node".to_string()), 4)
            .optional(ContentMatch("node-server".to_string()), 3)
            .optional(ContentMatch("node-start".to_string()), 2),
        BuildpackDefinition::new("go", 30)
            .describe("Go module")
            .mandatory(marker_path("go.mod"), 10)
            .optional(ext("go"), 3)
            .optional(lang("go"), 3),
        BuildpackDefinition::new("python", 30)
            .describe("Python application")
            .mandatory(ext("py"), 5)
            .optional(lang("python"), 3)
            .optional(marker_path("requirements.txt"), 5)
            .optional(marker_path("setup.py"), 5)
            .optional(marker_path("pyproject.toml"), 5)
            .optional(Shebang("python".to_string()), 2),
        BuildpackDefinition::new("rust", 30)
            .describe("Rust crate built with Cargo")
            .mandatory(marker_path("Cargo.toml"), 10)
            .optional(ext("rs"), 3)
            .optional(lang("rust"), 3),
        BuildpackDefinition::new("ruby", 30)
            .describe("Ruby application")
            .mandatory(marker_path("Gemfile"), 10)
            .optional(ext("rb"), 3)
            .optional(lang("ruby"), 3)
            .optional(Shebang("ruby".to_string()), 2),
        BuildpackDefinition::new("php", 30)
            .describe("PHP application")
            .mandatory(marker_path("composer.json"), 10)
            .optional(ext("php"), 3)
            .optional(lang("php"), 3),
        BuildpackDefinition::new("csharp", 30)
            .describe(".NET project")
            .mandatory(ext("csproj"), 10)
            .optional(ext("cs"), 3),
        BuildpackDefinition::new("docker-helm", 90)
            .describe("Dockerfile with a Helm chart")
            .mandatory(marker_path("Dockerfile"), 4)
            .mandatory(marker_path(HELM_CHART), 3),
        BuildpackDefinition::new("docker", 91)
            .describe("Plain Dockerfile")
            .mandatory(marker_path("Dockerfile"), 4),
        BuildpackDefinition::new("helm", 92)
            .describe("Helm chart")
            .mandatory(marker_path(HELM_CHART), 3),
        BuildpackDefinition::new("custom-jenkins", 99)
            .describe("Project with its own Jenkinsfile")
            .mandatory(marker_path("Jenkinsfile"), 1),
    ]
}

/// Chart layouts recognised as a project's own Helm chart.
const HELM_CHART: &str = "charts/*/Chart.yaml|*/Chart.yaml";

fn default_content_rules() -> Vec<ContentRule> {
    // Patterns are literals known to compile.
    [
        ("spring-boot", "pom.xml", r"spring-boot"),
        (
            "node-server",
            "package.json",
            r#""(express|koa|fastify|hapi|@nestjs/core|@hapi/hapi)"\s*:"#,
        ),
        ("node-start", "package.json", r#""start"\s*:\s*"node\s"#),
    ]
    .into_iter()
    .filter_map(|(id, file, pattern)| ContentRule::new(id, file, pattern).ok())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = BuildpackRegistry::with_defaults();
        assert!(registry.get("javascript").is_some());
        assert!(registry.get("maven").is_some());
        assert!(registry.get("environment").is_some());
        assert_eq!(registry.content_rules().len(), 3);
        assert!(registry.is_excluded_dir("node_modules"));
    }

    #[test]
    fn test_marker_names() {
        let registry = BuildpackRegistry::with_defaults();
        let markers = registry.marker_names();
        assert!(markers.contains("package.json"));
        assert!(markers.contains("Chart.yaml"));
        assert!(markers.contains("Jenkinsfile"));
        assert!(!markers.contains("index.js"));
        assert!(registry.is_marker("go.mod"));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = BuildpackRegistry::with_defaults();
        let err = registry
            .register(BuildpackDefinition::new("go", 1))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateBuildpack(name) if name == "go"));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut registry = BuildpackRegistry::with_defaults();
        let before = registry.len();
        registry.upsert(BuildpackDefinition::new("go", 1));
        assert_eq!(registry.len(), before);
        assert_eq!(registry.get("go").unwrap().priority, 1);
    }

    #[test]
    fn test_closest_name() {
        let registry = BuildpackRegistry::with_defaults();
        assert_eq!(registry.closest_name("javascrpt"), Some("javascript"));
        assert_eq!(registry.closest_name("zzzzzz"), None);
    }

    #[test]
    fn test_content_rules_for() {
        let registry = BuildpackRegistry::with_defaults();
        let ids: Vec<&str> = registry
            .content_rules_for("package.json")
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["node-server", "node-start"]);
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
buildpacks:
  - name: deno
    priority: 20
    signals:
      - { type: marker_path, value: deno.json, weight: 10, mandatory: true }
      - { type: content_match, value: deno-serve, weight: 2 }
content_rules:
  - id: deno-serve
    file_name: main.ts
    pattern: "Deno\\.serve"
excluded_dirs: [".deno"]
"#;
        let registry = BuildpackRegistry::from_yaml_str(yaml).unwrap();
        assert_eq!(registry.names(), vec!["deno"]);
        assert_eq!(registry.content_rules()[0].id, "deno-serve");
        assert!(registry.is_excluded_dir(".deno"));
        assert!(registry.get("javascript").is_none());
    }

    #[test]
    fn test_from_toml_str_extends_defaults() {
        let toml = r#"
extends_defaults = true

[[buildpacks]]
name = "go"
priority = 3
signals = [{ type = "marker_path", value = "go.mod", weight = 20, mandatory = true }]
"#;
        let registry = BuildpackRegistry::from_toml_str(toml).unwrap();
        assert!(registry.get("javascript").is_some());
        let go = registry.get("go").unwrap();
        assert_eq!(go.priority, 3);
        assert_eq!(go.signals[0].weight, 20);
    }

    #[test]
    fn test_invalid_pattern() {
        let yaml = r#"
content_rules:
  - id: broken
    file_name: pom.xml
    pattern: "spring-(boot"
"#;
        let err = BuildpackRegistry::from_yaml_str(yaml).err().unwrap();
        assert!(matches!(err, RegistryError::InvalidPattern { id, .. } if id == "broken"));
    }

    #[test]
    fn test_duplicate_in_file() {
        let yaml = r#"
buildpacks:
  - { name: a, priority: 1, signals: [] }
  - { name: a, priority: 2, signals: [] }
"#;
        assert!(matches!(
            BuildpackRegistry::from_yaml_str(yaml),
            Err(RegistryError::DuplicateBuildpack(_))
        ));
    }
}

use super::definition::BuildpackDefinition;
use super::registry::BuildpackRegistry;
use crate::scan::{normalize, ProjectSignal};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// A scored, eligible definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub score: u32,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub buildpack: Option<BuildpackDefinition>,
    pub score: u32,
    pub matched_signals: Vec<ProjectSignal>,
    pub ambiguous: bool,
    /// Definitions sharing the winning score, by priority then name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

impl ClassificationResult {
    fn unknown() -> Self {
        Self {
            buildpack: None,
            score: 0,
            matched_signals: Vec::new(),
            ambiguous: false,
            candidates: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.buildpack.is_none() && !self.ambiguous
    }

    pub fn buildpack_name(&self) -> Option<&str> {
        self.buildpack.as_ref().map(|b| b.name.as_str())
    }

    /// The single word printed by `classify`.
    pub fn label(&self) -> &str {
        match self.buildpack_name() {
            Some(name) => name,
            None if self.ambiguous => "ambiguous",
            None => "unknown",
        }
    }
}

struct Scored<'a> {
    def: &'a BuildpackDefinition,
    score: u32,
}

fn rank(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.def.priority.cmp(&b.def.priority))
        .then_with(|| a.def.name.cmp(&b.def.name))
}

/// Scores `def` against normalized signals. `None` when a mandatory
/// predicate is unsatisfied.
fn score(def: &BuildpackDefinition, signals: &[ProjectSignal]) -> Option<u32> {
    let mut total = 0u32;
    for wp in &def.signals {
        let satisfied = signals.iter().any(|s| wp.predicate.matches(s));
        if satisfied {
            total = total.saturating_add(wp.weight);
        } else if wp.mandatory {
            return None;
        }
    }
    Some(total)
}

fn matched_signals(def: &BuildpackDefinition, signals: &[ProjectSignal]) -> Vec<ProjectSignal> {
    signals
        .iter()
        .filter(|s| def.signals.iter().any(|wp| wp.predicate.matches(s)))
        .cloned()
        .collect()
}

fn selected(def: &BuildpackDefinition, score: u32, signals: &[ProjectSignal]) -> ClassificationResult {
    ClassificationResult {
        buildpack: Some(def.clone()),
        score,
        matched_signals: matched_signals(def, signals),
        ambiguous: false,
        candidates: vec![Candidate {
            name: def.name.clone(),
            score,
            priority: def.priority,
        }],
    }
}

/// Selects the best-matching buildpack for a set of signals.
///
/// Highest score among eligible definitions wins; equal scores fall back to
/// the lower priority. If both tie the result is ambiguous and no buildpack
/// is chosen.
pub fn classify(signals: &[ProjectSignal], registry: &BuildpackRegistry) -> ClassificationResult {
    let signals = normalize(signals);
    classify_normalized(&signals, registry)
}

fn classify_normalized(signals: &[ProjectSignal], registry: &BuildpackRegistry) -> ClassificationResult {
    let mut eligible: Vec<Scored<'_>> = registry
        .buildpacks()
        .iter()
        .filter_map(|def| {
            score(def, signals).map(|score| Scored {
                def: def.as_ref(),
                score,
            })
        })
        .collect();

    if eligible.is_empty() {
        info!(signals = signals.len(), "No buildpack matched");
        return ClassificationResult::unknown();
    }

    eligible.sort_by(rank);
    for s in &eligible {
        debug!(buildpack = %s.def.name, score = s.score, priority = s.def.priority, "Eligible buildpack");
    }

    let top = &eligible[0];
    let candidates: Vec<Candidate> = eligible
        .iter()
        .take_while(|s| s.score == top.score)
        .map(|s| Candidate {
            name: s.def.name.clone(),
            score: s.score,
            priority: s.def.priority,
        })
        .collect();

    let tied = eligible
        .iter()
        .filter(|s| s.score == top.score && s.def.priority == top.def.priority)
        .count();

    if tied > 1 {
        let names: Vec<&str> = candidates
            .iter()
            .filter(|c| c.priority == top.def.priority)
            .map(|c| c.name.as_str())
            .collect();
        warn!(
            score = top.score,
            priority = top.def.priority,
            candidates = ?names,
            "Ambiguous classification"
        );
        return ClassificationResult {
            buildpack: None,
            score: top.score,
            matched_signals: Vec::new(),
            ambiguous: true,
            candidates,
        };
    }

    info!(buildpack = %top.def.name, score = top.score, "Classified project");
    ClassificationResult {
        candidates,
        ..selected(top.def, top.score, signals)
    }
}

/// Like [`classify`], but a registered `preferred` pack is chosen outright.
///
/// An unregistered name is reported with the closest registered one and
/// detection proceeds as usual.
pub fn classify_with_preference(
    signals: &[ProjectSignal],
    registry: &BuildpackRegistry,
    preferred: Option<&str>,
) -> ClassificationResult {
    let signals = normalize(signals);

    if let Some(name) = preferred {
        match registry.get(name) {
            Some(def) => {
                let score = score(def, &signals).unwrap_or(0);
                info!(buildpack = %name, score, "Using requested buildpack");
                return selected(def, score, &signals);
            }
            None => match registry.closest_name(name) {
                Some(closest) => warn!(
                    requested = %name,
                    closest = %closest,
                    "Unknown buildpack requested, did you mean '{}'?", closest
                ),
                None => warn!(requested = %name, "Unknown buildpack requested"),
            },
        }
    }

    classify_normalized(&signals, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildpack::SignalPredicate;

    fn node_signals() -> Vec<ProjectSignal> {
        vec![
            ProjectSignal::marker("package.json", "package.json"),
            ProjectSignal::extension("js", "server.js"),
            ProjectSignal::shebang("node", "bin/www"),
        ]
    }

    #[test]
    fn test_node_project_is_javascript() {
        let registry = BuildpackRegistry::with_defaults();
        let result = classify(&node_signals(), &registry);
        assert_eq!(result.buildpack_name(), Some("javascript"));
        assert_eq!(result.score, 17);
        assert!(!result.ambiguous);
        assert_eq!(result.matched_signals.len(), 3);
    }

    #[test]
    fn test_mandatory_gates_eligibility() {
        let registry = BuildpackRegistry::with_defaults();
        // Plenty of .js files but no package.json.
        let signals: Vec<ProjectSignal> = (0..20)
            .map(|i| ProjectSignal::extension("js", format!("src/f{}.js", i)))
            .collect();
        let result = classify(&signals, &registry);
        assert!(result.is_unknown());
        assert_eq!(result.label(), "unknown");
    }

    #[test]
    fn test_empty_signals_unknown() {
        let registry = BuildpackRegistry::with_defaults();
        let result = classify(&[], &registry);
        assert!(result.is_unknown());
        assert_eq!(result.score, 0);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let registry = BuildpackRegistry::with_defaults();
        let mut signals = node_signals();
        signals.push(ProjectSignal::marker("Dockerfile", "Dockerfile"));
        let forward = classify(&signals, &registry);
        signals.reverse();
        let backward = classify(&signals, &registry);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_duplicates_do_not_inflate_score() {
        let registry = BuildpackRegistry::with_defaults();
        let mut signals = node_signals();
        signals.extend(node_signals());
        assert_eq!(classify(&signals, &registry).score, 17);
    }

    #[test]
    fn test_spring_boot_beats_maven() {
        let registry = BuildpackRegistry::with_defaults();
        let signals = vec![
            ProjectSignal::marker("pom.xml", "pom.xml"),
            ProjectSignal::content("spring-boot", "pom.xml"),
            ProjectSignal::extension("java", "src/main/java/App.java"),
        ];
        let result = classify(&signals, &registry);
        assert_eq!(result.buildpack_name(), Some("spring-boot"));

        let plain = vec![
            ProjectSignal::marker("pom.xml", "pom.xml"),
            ProjectSignal::extension("java", "src/main/java/App.java"),
        ];
        assert_eq!(classify(&plain, &registry).buildpack_name(), Some("maven"));
    }

    #[test]
    fn test_priority_breaks_score_tie() {
        let mut registry = BuildpackRegistry::new();
        registry.upsert(
            BuildpackDefinition::new("low", 10)
                .mandatory(SignalPredicate::MarkerFile("a".to_string()), 5),
        );
        registry.upsert(
            BuildpackDefinition::new("high", 1)
                .mandatory(SignalPredicate::MarkerFile("a".to_string()), 5),
        );
        let result = classify(&[ProjectSignal::marker("a", "a")], &registry);
        assert_eq!(result.buildpack_name(), Some("high"));
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].name, "high");
    }

    #[test]
    fn test_full_tie_is_ambiguous() {
        let mut registry = BuildpackRegistry::new();
        for name in ["zeta", "alpha"] {
            registry.upsert(
                BuildpackDefinition::new(name, 7)
                    .mandatory(SignalPredicate::Extension("x".to_string()), 2),
            );
        }
        let result = classify(&[ProjectSignal::extension("x", "f.x")], &registry);
        assert!(result.ambiguous);
        assert!(result.buildpack.is_none());
        assert!(!result.is_unknown());
        assert_eq!(result.label(), "ambiguous");
        let names: Vec<&str> = result.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_preference_overrides_detection() {
        let registry = BuildpackRegistry::with_defaults();
        let result = classify_with_preference(&node_signals(), &registry, Some("docker"));
        assert_eq!(result.buildpack_name(), Some("docker"));
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_unknown_preference_falls_back() {
        let registry = BuildpackRegistry::with_defaults();
        let result = classify_with_preference(&node_signals(), &registry, Some("javascrpt"));
        assert_eq!(result.buildpack_name(), Some("javascript"));
    }
}

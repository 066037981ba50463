use super::verifier::{VerificationResult, Verifier};
use crate::error::GoldenError;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    Unverified,
    Matched,
    Mismatched,
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixtureState::Unverified => "unverified",
            FixtureState::Matched => "matched",
            FixtureState::Mismatched => "mismatched",
        };
        f.write_str(s)
    }
}

/// A (current output, golden artifact) pair.
///
/// `verify` moves an unverified fixture to matched or mismatched and never
/// writes. `regenerate` copies current over golden and resets to unverified.
#[derive(Debug, Clone)]
pub struct GoldenFixture {
    pub id: String,
    pub current: PathBuf,
    pub golden: PathBuf,
    state: FixtureState,
}

impl GoldenFixture {
    pub fn new(id: impl Into<String>, current: impl Into<PathBuf>, golden: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            current: current.into(),
            golden: golden.into(),
            state: FixtureState::Unverified,
        }
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    fn invalid(&self, action: &'static str) -> GoldenError {
        GoldenError::InvalidTransition {
            fixture: self.id.clone(),
            action,
            state: self.state.to_string(),
        }
    }

    pub fn verify(&mut self, verifier: &Verifier) -> Result<VerificationResult, GoldenError> {
        if self.state != FixtureState::Unverified {
            return Err(self.invalid("verify"));
        }

        let current = read(&self.current)?;
        let (golden, golden_missing) = match std::fs::read(&self.golden) {
            Ok(bytes) => (bytes, false),
            Err(err) if err.kind() == io::ErrorKind::NotFound => (Vec::new(), true),
            Err(source) => {
                return Err(GoldenError::Io {
                    path: self.golden.clone(),
                    source,
                })
            }
        };

        let mut result = verifier.verify(&current, &golden);
        if golden_missing {
            result.matched = false;
            result.golden_missing = true;
        }

        self.state = if result.matched {
            FixtureState::Matched
        } else {
            FixtureState::Mismatched
        };
        debug!(fixture = %self.id, state = %self.state, "Verified fixture");
        Ok(result)
    }

    /// Overwrites the golden artifact with the current output.
    pub fn regenerate(&mut self) -> Result<(), GoldenError> {
        if self.state == FixtureState::Matched {
            return Err(self.invalid("regenerate"));
        }

        let current = read(&self.current)?;
        if let Some(parent) = self.golden.parent() {
            std::fs::create_dir_all(parent).map_err(|source| GoldenError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.golden, current).map_err(|source| GoldenError::Io {
            path: self.golden.clone(),
            source,
        })?;

        info!(fixture = %self.id, golden = %self.golden.display(), "Regenerated golden artifact");
        self.state = FixtureState::Unverified;
        Ok(())
    }
}

fn read(path: &Path) -> Result<Vec<u8>, GoldenError> {
    std::fs::read(path).map_err(|source| GoldenError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome for one fixture in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureReport {
    pub id: String,
    pub state: FixtureState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FixtureReport {
    pub fn matched(&self) -> bool {
        self.result.as_ref().map(|r| r.matched).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub fixtures: Vec<FixtureReport>,
}

impl BatchReport {
    pub fn all_matched(&self) -> bool {
        self.fixtures.iter().all(FixtureReport::matched)
    }

    pub fn matched_count(&self) -> usize {
        self.fixtures.iter().filter(|f| f.matched()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FixtureReport> {
        self.fixtures.iter().filter(|f| !f.matched())
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

/// Verifies every fixture; a failure never stops the batch.
pub fn verify_all(fixtures: &mut [GoldenFixture], verifier: &Verifier) -> BatchReport {
    let mut report = BatchReport::default();

    for fixture in fixtures.iter_mut() {
        let entry = match fixture.verify(verifier) {
            Ok(result) => FixtureReport {
                id: fixture.id.clone(),
                state: fixture.state(),
                result: Some(result),
                error: None,
            },
            Err(err) => {
                warn!(fixture = %fixture.id, error = %err, "Fixture could not be verified");
                FixtureReport {
                    id: fixture.id.clone(),
                    state: fixture.state(),
                    result: None,
                    error: Some(err.to_string()),
                }
            }
        };
        report.fixtures.push(entry);
    }

    info!(
        fixtures = report.len(),
        matched = report.matched_count(),
        "Golden verification finished"
    );
    report
}

/// Regenerates every fixture that has current output. Goldens without a
/// current counterpart are left alone. Returns the number written.
pub fn regenerate_all(fixtures: &mut [GoldenFixture]) -> Result<usize, GoldenError> {
    let mut written = 0;
    for fixture in fixtures.iter_mut() {
        if !fixture.current.exists() {
            warn!(fixture = %fixture.id, "No current output, leaving golden untouched");
            continue;
        }
        fixture.regenerate()?;
        written += 1;
    }
    Ok(written)
}

fn relative_files(dir: &Path) -> Result<BTreeSet<PathBuf>, GoldenError> {
    let mut files = BTreeSet::new();
    for entry in WalkBuilder::new(dir).standard_filters(false).build() {
        let entry = entry.map_err(|err| GoldenError::Io {
            path: dir.to_path_buf(),
            source: err
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")),
        })?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            if let Ok(rel) = entry.path().strip_prefix(dir) {
                files.insert(rel.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Pairs files under `current_dir` and `golden_dir` by relative path.
///
/// A missing golden directory yields fixtures with missing goldens; golden
/// files with no current counterpart become fixtures whose current output
/// is missing.
pub fn discover(current_dir: &Path, golden_dir: &Path) -> Result<Vec<GoldenFixture>, GoldenError> {
    std::fs::metadata(current_dir).map_err(|source| GoldenError::Io {
        path: current_dir.to_path_buf(),
        source,
    })?;

    let mut names = relative_files(current_dir)?;
    if golden_dir.exists() {
        names.extend(relative_files(golden_dir)?);
    }

    let fixtures: Vec<GoldenFixture> = names
        .into_iter()
        .map(|rel| {
            let id = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            GoldenFixture::new(id, current_dir.join(&rel), golden_dir.join(&rel))
        })
        .collect();

    debug!(
        current = %current_dir.display(),
        golden = %golden_dir.display(),
        fixtures = fixtures.len(),
        "Discovered golden fixtures"
    );
    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pair(dir: &TempDir, current: &str, golden: Option<&str>) -> GoldenFixture {
        let current_path = dir.path().join("current/jx.rb");
        let golden_path = dir.path().join("golden/jx.rb");
        fs::create_dir_all(current_path.parent().unwrap()).unwrap();
        fs::write(&current_path, current).unwrap();
        if let Some(golden) = golden {
            fs::create_dir_all(golden_path.parent().unwrap()).unwrap();
            fs::write(&golden_path, golden).unwrap();
        }
        GoldenFixture::new("jx.rb", current_path, golden_path)
    }

    #[test]
    fn test_verify_matched() {
        let dir = TempDir::new().unwrap();
        let mut fixture = pair(&dir, "end\n", Some("end"));
        let result = fixture.verify(&Verifier::new()).unwrap();
        assert!(result.matched);
        assert_eq!(fixture.state(), FixtureState::Matched);
    }

    #[test]
    fn test_verify_twice_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut fixture = pair(&dir, "a\n", Some("b\n"));
        fixture.verify(&Verifier::new()).unwrap();
        assert_eq!(fixture.state(), FixtureState::Mismatched);

        let err = fixture.verify(&Verifier::new()).unwrap_err();
        assert!(matches!(err, GoldenError::InvalidTransition { action: "verify", .. }));
    }

    #[test]
    fn test_regenerate_then_verify_matches() {
        let dir = TempDir::new().unwrap();
        let mut fixture = pair(&dir, "version \"1.0.2\"\n", Some("version \"1.0.1\"\n"));

        assert!(!fixture.verify(&Verifier::new()).unwrap().matched);
        fixture.regenerate().unwrap();
        assert_eq!(fixture.state(), FixtureState::Unverified);
        assert_eq!(
            fs::read_to_string(&fixture.golden).unwrap(),
            "version \"1.0.2\"\n"
        );
        assert!(fixture.verify(&Verifier::new()).unwrap().matched);
    }

    #[test]
    fn test_regenerate_from_matched_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut fixture = pair(&dir, "x\n", Some("x\n"));
        fixture.verify(&Verifier::new()).unwrap();
        assert!(matches!(
            fixture.regenerate(),
            Err(GoldenError::InvalidTransition { action: "regenerate", .. })
        ));
    }

    #[test]
    fn test_verify_never_writes() {
        let dir = TempDir::new().unwrap();
        let mut fixture = pair(&dir, "new\n", None);
        let result = fixture.verify(&Verifier::new()).unwrap();
        assert!(!result.matched);
        assert!(result.golden_missing);
        assert!(!fixture.golden.exists());
    }

    #[test]
    fn test_verify_all_does_not_fail_fast() {
        let dir = TempDir::new().unwrap();
        let mut fixtures = vec![
            GoldenFixture::new("missing", dir.path().join("nope"), dir.path().join("nope.golden")),
            pair(&dir, "same\n", Some("same\n")),
        ];

        let report = verify_all(&mut fixtures, &Verifier::new());
        assert_eq!(report.len(), 2);
        assert!(!report.all_matched());
        assert_eq!(report.matched_count(), 1);
        assert!(report.fixtures[0].error.is_some());
        assert!(report.fixtures[1].matched());
    }

    #[test]
    fn test_discover_pairs_by_relative_path() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("current");
        let golden = dir.path().join("golden");
        fs::create_dir_all(current.join("brew")).unwrap();
        fs::create_dir_all(golden.join("brew")).unwrap();
        fs::write(current.join("brew/jx.rb"), "a").unwrap();
        fs::write(golden.join("brew/jx.rb"), "a").unwrap();
        fs::write(current.join("scoop.json"), "{}").unwrap();
        fs::write(golden.join("orphan.rb"), "old").unwrap();

        let mut fixtures = discover(&current, &golden).unwrap();
        let ids: Vec<&str> = fixtures.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["brew/jx.rb", "orphan.rb", "scoop.json"]);

        let report = verify_all(&mut fixtures, &Verifier::new());
        assert_eq!(report.matched_count(), 1);
        let orphan = &report.fixtures[1];
        assert!(orphan.error.is_some());
        let scoop = &report.fixtures[2];
        assert!(scoop.result.as_ref().unwrap().golden_missing);
    }

    #[test]
    fn test_regenerate_all_skips_orphans() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("current");
        let golden = dir.path().join("golden");
        fs::create_dir_all(&current).unwrap();
        fs::create_dir_all(&golden).unwrap();
        fs::write(current.join("jx.rb"), "new").unwrap();
        fs::write(golden.join("orphan.rb"), "old").unwrap();

        let mut fixtures = discover(&current, &golden).unwrap();
        assert_eq!(regenerate_all(&mut fixtures).unwrap(), 1);
        assert_eq!(fs::read_to_string(golden.join("jx.rb")).unwrap(), "new");
        assert_eq!(fs::read_to_string(golden.join("orphan.rb")).unwrap(), "old");
    }
}

use super::signal::{normalize, parse_shebang, ProjectSignal};
use crate::buildpack::BuildpackRegistry;
use crate::error::{ScanError, TimeoutError};
use crate::pipeline::Deadline;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

const LINGUIST_EXCLUSIONS: &[&str] = &[
    "linguist-vendored",
    "linguist-generated",
    "linguist-documentation",
];

const LINGUIST_LANGUAGE: &str = "linguist-language";

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Deepest level visited; root children are depth 1. `None` is unlimited.
    pub max_depth: Option<usize>,
    pub max_files: usize,
    /// Bytes read per file for shebang detection
    pub head_bytes: usize,
    /// Bytes read from files a content rule targets
    pub content_bytes: usize,
    pub read_content: bool,
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_files: 10_000,
            head_bytes: 512,
            content_bytes: 64 * 1024,
            read_content: true,
            parallel: false,
        }
    }
}

/// A file whose signals could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanOmission {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub signals: Vec<ProjectSignal>,
    pub omissions: Vec<ScanOmission>,
    pub files_scanned: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

impl ScanReport {
    pub fn is_degraded(&self) -> bool {
        !self.omissions.is_empty()
    }
}

#[derive(Default)]
struct Collected {
    signals: Vec<ProjectSignal>,
    omissions: Vec<ScanOmission>,
}

impl Collected {
    fn extend(&mut self, other: Collected) {
        self.signals.extend(other.signals);
        self.omissions.extend(other.omissions);
    }
}

/// `.gitattributes` of one directory, reduced to what the scanner uses.
struct DirAttributes {
    excluded: Gitignore,
    languages: Vec<(Gitignore, String)>,
}

impl DirAttributes {
    fn read(dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(dir.join(".gitattributes")).ok()?;
        let parsed = parse_gitattributes(&content);

        let mut builder = GitignoreBuilder::new(dir);
        for pattern in &parsed.excluded {
            if let Err(err) = builder.add_line(None, pattern) {
                warn!(pattern, error = %err, "Skipping invalid .gitattributes pattern");
            }
        }
        let excluded = builder.build().unwrap_or_else(|err| {
            warn!(dir = %dir.display(), error = %err, "Failed to build .gitattributes rules");
            Gitignore::empty()
        });

        let languages = parsed
            .languages
            .iter()
            .filter_map(|(pattern, language)| {
                let mut builder = GitignoreBuilder::new(dir);
                builder.add_line(None, pattern).ok()?;
                Some((builder.build().ok()?, language.to_lowercase()))
            })
            .collect();

        debug!(dir = %dir.display(), "Loaded .gitattributes");
        Some(Self {
            excluded,
            languages,
        })
    }

    /// Later lines override earlier ones.
    fn language(&self, path: &Path) -> Option<&str> {
        self.languages
            .iter()
            .rev()
            .find(|(matcher, _)| matcher.matched(path, false).is_ignore())
            .map(|(_, language)| language.as_str())
    }
}

/// `.gitattributes` files under the scan root, read on first use.
struct AttributeCache {
    root: PathBuf,
    dirs: Mutex<HashMap<PathBuf, Option<Arc<DirAttributes>>>>,
}

impl AttributeCache {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            dirs: Mutex::new(HashMap::new()),
        }
    }

    fn load(&self, dir: &Path) -> Option<Arc<DirAttributes>> {
        self.dirs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(dir.to_path_buf())
            .or_insert_with(|| DirAttributes::read(dir).map(Arc::new))
            .clone()
    }

    /// Attribute sets governing `path`, nearest directory first.
    fn governing(&self, path: &Path) -> Vec<Arc<DirAttributes>> {
        path.ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root))
            .filter_map(|dir| self.load(dir))
            .collect()
    }

    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.governing(path)
            .iter()
            .any(|attrs| attrs.excluded.matched(path, is_dir).is_ignore())
    }

    fn language(&self, path: &Path) -> Option<String> {
        self.governing(path)
            .iter()
            .find_map(|attrs| attrs.language(path).map(str::to_string))
    }
}

/// Per-scan state shared by every walker thread.
struct ScanState {
    root: PathBuf,
    attributes: Arc<AttributeCache>,
    collected: Arc<Mutex<Collected>>,
    files: AtomicUsize,
    truncated: AtomicBool,
    timed_out: Mutex<Option<TimeoutError>>,
}

impl ScanState {
    fn new(root: PathBuf) -> Self {
        Self {
            attributes: Arc::new(AttributeCache::new(root.clone())),
            collected: Arc::new(Mutex::new(Collected::default())),
            files: AtomicUsize::new(0),
            truncated: AtomicBool::new(false),
            timed_out: Mutex::new(None),
            root,
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        relative_to(&self.root, path)
    }

    fn collect(&self, out: Collected) {
        self.collected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(out);
    }

    fn record_error(&self, err: &ignore::Error) {
        if is_loop(err) {
            debug!(error = %err, "Symlink cycle, not descending");
            return;
        }
        let path = error_path(err)
            .map(|p| self.relative(p))
            .unwrap_or_default();
        let mut collected = self.collected.lock().unwrap_or_else(|e| e.into_inner());
        omit(&mut collected, path, error_reason(err));
    }

    fn time_out(&self, err: TimeoutError) {
        self.timed_out
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_or_insert(err);
    }
}

/// Walks a project tree and extracts low-level signals.
///
/// Every call to [`scan`](Self::scan) re-walks the tree; no state carries over
/// between calls.
pub struct SignalScanner {
    root: PathBuf,
    registry: Arc<BuildpackRegistry>,
    config: ScanConfig,
    deadline: Option<Deadline>,
}

impl SignalScanner {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<BuildpackRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
            config: ScanConfig::default(),
            deadline: None,
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn scan(&self) -> Result<ScanReport, ScanError> {
        let start = Instant::now();
        let root = self.validate_root()?;

        info!(
            root = %root.display(),
            max_depth = ?self.config.max_depth,
            max_files = self.config.max_files,
            parallel = self.config.parallel,
            "Starting signal scan"
        );

        let state = ScanState::new(root.clone());
        let walker = self.walker(&state);

        if self.config.parallel {
            let state = &state;
            run_guarded(|| {
                walker
                    .build_parallel()
                    .run(|| Box::new(move |result| self.visit(state, result)))
            })?;
        } else {
            for result in walker.build() {
                if matches!(self.visit(&state, result), WalkState::Quit) {
                    break;
                }
            }
        }

        if let Some(err) = *state.timed_out.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(err.into());
        }

        let collected = std::mem::take(
            &mut *state
                .collected
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        let mut omissions = collected.omissions;
        omissions.sort();
        omissions.dedup();

        let report = ScanReport {
            root,
            signals: normalize(&collected.signals),
            omissions,
            files_scanned: state.files.load(Ordering::SeqCst).min(self.config.max_files),
            truncated: state.truncated.load(Ordering::SeqCst),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            signals = report.signals.len(),
            omissions = report.omissions.len(),
            files_scanned = report.files_scanned,
            truncated = report.truncated,
            scan_time_ms = report.elapsed_ms,
            "Signal scan completed"
        );

        Ok(report)
    }

    fn validate_root(&self) -> Result<PathBuf, ScanError> {
        let root_error = |e| ScanError::from_io(self.root.clone(), e);

        let meta = std::fs::metadata(&self.root).map_err(root_error)?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory {
                path: self.root.clone(),
            });
        }
        std::fs::read_dir(&self.root).map_err(root_error)?;
        std::fs::canonicalize(&self.root).map_err(root_error)
    }

    /// `.git` and the registry's excluded directories, at any depth.
    fn overrides(&self, root: &Path) -> Override {
        let mut builder = OverrideBuilder::new(root);
        let dirs = std::iter::once(".git")
            .chain(self.registry.excluded_dirs().iter().map(String::as_str));
        for dir in dirs {
            if let Err(err) = builder.add(&format!("!{}/", dir)) {
                warn!(dir, error = %err, "Skipping invalid excluded directory");
            }
        }
        builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to build directory exclusions");
            Override::empty()
        })
    }

    fn walker(&self, state: &ScanState) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&state.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .require_git(false)
            .parents(false)
            .follow_links(true)
            .max_depth(self.config.max_depth)
            .overrides(self.overrides(&state.root))
            .sort_by_file_name(|a, b| a.cmp(b));

        let root = state.root.clone();
        let attributes = Arc::clone(&state.attributes);
        let collected = Arc::clone(&state.collected);
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let path = entry.path();

            if entry.path_is_symlink() {
                let reason = match std::fs::canonicalize(path) {
                    Ok(target) if target.starts_with(&root) => None,
                    Ok(target) => {
                        debug!(path = %path.display(), target = %target.display(), "Symlink leaves scan root");
                        Some("symlink target outside scan root".to_string())
                    }
                    Err(err) => Some(format!("unresolvable symlink: {}", err)),
                };
                if let Some(reason) = reason {
                    let mut collected = collected.lock().unwrap_or_else(|e| e.into_inner());
                    omit(&mut collected, relative_to(&root, path), reason);
                    return false;
                }
            }

            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if attributes.is_excluded(path, is_dir) {
                debug!(path = %path.display(), "Skipping linguist-excluded path");
                return false;
            }
            true
        });

        builder
    }

    fn visit(&self, state: &ScanState, result: Result<DirEntry, ignore::Error>) -> WalkState {
        if let Some(deadline) = &self.deadline {
            if let Err(err) = deadline.check() {
                state.time_out(err);
                return WalkState::Quit;
            }
        }
        if state.truncated.load(Ordering::SeqCst) {
            return WalkState::Quit;
        }

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                state.record_error(&err);
                return WalkState::Continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            return WalkState::Continue;
        }

        if state.files.fetch_add(1, Ordering::SeqCst) >= self.config.max_files {
            if !state.truncated.swap(true, Ordering::SeqCst) {
                warn!(max_files = self.config.max_files, "Reached file limit, stopping scan");
            }
            return WalkState::Quit;
        }

        let mut out = Collected::default();
        self.visit_file(state, entry.path(), &mut out);
        state.collect(out);
        WalkState::Continue
    }

    fn visit_file(&self, state: &ScanState, path: &Path, out: &mut Collected) {
        let rel = state.relative(path);
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return,
        };

        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                omit(out, rel, err.to_string());
                return;
            }
        };

        if self.registry.is_marker(&name) {
            out.signals.push(ProjectSignal::marker(name.as_str(), &rel));
        }
        if meta.len() == 0 {
            return;
        }

        match state.attributes.language(path) {
            Some(language) => out.signals.push(ProjectSignal::language(language, &rel)),
            None => {
                if let Some(ext) = Path::new(&name).extension().and_then(|e| e.to_str()) {
                    out.signals
                        .push(ProjectSignal::extension(ext.to_lowercase(), &rel));
                }
            }
        }

        if !self.config.read_content {
            return;
        }

        let has_rules = self.registry.content_rules_for(&name).next().is_some();
        let limit = if has_rules {
            self.config.head_bytes.max(self.config.content_bytes)
        } else {
            self.config.head_bytes
        };

        let content = match read_head(path, limit) {
            Ok(c) => c,
            Err(err) => {
                omit(out, rel, err.to_string());
                return;
            }
        };

        let head = &content[..content.len().min(self.config.head_bytes)];
        if let Some(interpreter) = parse_shebang(head) {
            out.signals.push(ProjectSignal::shebang(interpreter, &rel));
        }

        if has_rules {
            let text = String::from_utf8_lossy(&content);
            for rule in self.registry.content_rules_for(&name) {
                if rule.pattern.is_match(&text) {
                    out.signals.push(ProjectSignal::content(&rule.id, &rel));
                }
            }
        }
    }
}

fn read_head(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit.min(8 * 1024));
    File::open(path)?
        .take(limit as u64)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn omit(out: &mut Collected, path: PathBuf, reason: String) {
    warn!(path = %path.display(), reason = %reason, "Skipping unreadable path");
    out.omissions.push(ScanOmission { path, reason });
}

/// Runs a parallel walk, turning a panicked worker into an error instead of
/// tearing down the caller.
fn run_guarded<F: FnOnce()>(walk: F) -> Result<(), ScanError> {
    panic::catch_unwind(AssertUnwindSafe(walk)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(error = %message, "Scan worker panicked");
        ScanError::WorkerPanicked(message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

/// Innermost message, without the path prefix the walker adds.
fn error_reason(err: &ignore::Error) -> String {
    match err {
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => error_reason(err),
        other => other.to_string(),
    }
}

/// Linguist attributes the scanner honors, by pattern.
#[derive(Debug, Default, PartialEq, Eq)]
struct GitAttributes<'a> {
    /// Vendored, generated or documentation paths
    excluded: Vec<&'a str>,
    /// `linguist-language` overrides, in file order
    languages: Vec<(&'a str, &'a str)>,
}

fn parse_gitattributes(content: &str) -> GitAttributes<'_> {
    let mut attrs = GitAttributes::default();
    let lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    for line in lines {
        let mut parts = line.split_whitespace();
        let Some(pattern) = parts.next() else {
            continue;
        };
        let mut excluded = false;
        for attr in parts {
            let (name, value) = attr.split_once('=').unwrap_or((attr, "true"));
            if LINGUIST_EXCLUSIONS.contains(&name) && value != "false" {
                excluded = true;
            } else if name == LINGUIST_LANGUAGE && value != "true" && !value.is_empty() {
                attrs.languages.push((pattern, value));
            }
        }
        if excluded {
            attrs.excluded.push(pattern);
        }
    }
    attrs
}

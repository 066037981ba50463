//! Command handlers. Each returns the process exit code.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::commands::{
    ChecksumArgs, ClassifyArgs, ConfigArgs, RegenerateArgs, RenderArgs, ScanArgs, VerifyArgs,
};
use super::output::OutputFormatter;
use crate::buildpack::BuildpackRegistry;
use crate::config::PackscoutConfig;
use crate::golden::{self, GoldenFixture, Verifier};
use crate::manifest::{checksum, ManifestTemplate, ReleaseMetadata};
use crate::pipeline::{Deadline, Pipeline};
use crate::scan::SignalScanner;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_AMBIGUOUS: i32 = 2;

const BUILTIN_TEMPLATES: &[&str] = &["builtin", "homebrew-formula"];

fn exit_code(command: &str, result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            error!(command, error = %err, "Command failed");
            eprintln!("Error: {:#}", err);
            EXIT_FAILURE
        }
    }
}

fn load_config() -> Result<PackscoutConfig> {
    let config = PackscoutConfig::default();
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);
    Ok(config)
}

fn load_registry(config: &PackscoutConfig, path: Option<&Path>) -> Result<BuildpackRegistry> {
    match path {
        Some(path) => BuildpackRegistry::from_path(path)
            .with_context(|| format!("Failed to load registry {}", path.display())),
        None => config.load_registry().context("Failed to load buildpack registry"),
    }
}

fn project_root(path: Option<&PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

/// A single file pair, or every file under two directories.
fn fixtures(current: &Path, golden: &Path) -> Result<Vec<GoldenFixture>> {
    if current.is_file() {
        let id = current
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| current.display().to_string());
        return Ok(vec![GoldenFixture::new(id, current, golden)]);
    }
    golden::discover(current, golden)
        .with_context(|| format!("Failed to pair {} with {}", current.display(), golden.display()))
}

pub fn handle_render(args: &RenderArgs) -> i32 {
    exit_code("render", run_render(args))
}

fn run_render(args: &RenderArgs) -> Result<i32> {
    let config = load_config()?;

    let template = if BUILTIN_TEMPLATES.contains(&args.template.as_str()) {
        ManifestTemplate::homebrew_formula()
    } else {
        ManifestTemplate::from_path(Path::new(&args.template))
            .with_context(|| format!("Failed to read template {}", args.template))?
    };

    let checksum_value = match (&args.checksum, &args.artifact) {
        (Some(value), _) => value.clone(),
        (None, Some(artifact)) => checksum::sha256_file(artifact)
            .with_context(|| format!("Failed to hash artifact {}", artifact.display()))?,
        (None, None) => anyhow::bail!("either --checksum or --artifact is required"),
    };

    let mut metadata = ReleaseMetadata::new(
        &args.binary,
        &args.release_version,
        &args.url_template,
        checksum_value,
    )
    .with_checksum_algorithm(&args.checksum_algorithm);
    for shell in &args.shells {
        metadata = metadata.with_shell((*shell).into());
    }
    for (key, value) in &args.fields {
        metadata = metadata.with_field(key, value);
    }

    let pipeline_config = config
        .pipeline_config()
        .with_strict_render(args.strict || config.strict_render);
    let pipeline =
        Pipeline::new(Arc::new(BuildpackRegistry::new())).with_config(pipeline_config);
    let rendered = pipeline.render(&template, &metadata)?;

    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(out, rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!(path = %out.display(), "Manifest written");
        }
        None => print!("{}", rendered.text),
    }
    Ok(EXIT_OK)
}

pub fn handle_verify(args: &VerifyArgs) -> i32 {
    exit_code("verify", run_verify(args))
}

fn run_verify(args: &VerifyArgs) -> Result<i32> {
    let mut fixtures = fixtures(&args.current, &args.golden)?;
    let verifier = Verifier::new().with_context_lines(args.context);
    let batch = golden::verify_all(&mut fixtures, &verifier);

    let formatter = OutputFormatter::new(args.format.into());
    println!("{}", formatter.format_batch(&batch)?);

    if batch.all_matched() {
        Ok(EXIT_OK)
    } else {
        warn!(
            failed = batch.len() - batch.matched_count(),
            "Golden verification failed"
        );
        Ok(EXIT_FAILURE)
    }
}

pub fn handle_regenerate(args: &RegenerateArgs) -> i32 {
    exit_code("regenerate", run_regenerate(args))
}

fn run_regenerate(args: &RegenerateArgs) -> Result<i32> {
    let mut fixtures = fixtures(&args.current, &args.golden)?;
    let written = golden::regenerate_all(&mut fixtures).context("Failed to regenerate goldens")?;
    println!("Regenerated {} golden artifact(s)", written);
    Ok(EXIT_OK)
}

pub fn handle_classify(args: &ClassifyArgs) -> i32 {
    exit_code("classify", run_classify(args))
}

fn run_classify(args: &ClassifyArgs) -> Result<i32> {
    let config = load_config()?;
    let registry = load_registry(&config, args.registry.as_deref())?;
    let root = project_root(args.path.as_ref())?;

    let pipeline = Pipeline::new(Arc::new(registry)).with_config(config.pipeline_config());
    let detection = pipeline
        .detect(&root, args.pack.as_deref())
        .with_context(|| format!("Failed to classify {}", root.display()))?;

    let formatter = OutputFormatter::new(args.format.into());
    print!("{}", formatter.format_detection(&detection)?);

    if detection.classification.ambiguous {
        Ok(EXIT_AMBIGUOUS)
    } else {
        Ok(EXIT_OK)
    }
}

pub fn handle_scan(args: &ScanArgs) -> i32 {
    exit_code("scan", run_scan(args))
}

fn run_scan(args: &ScanArgs) -> Result<i32> {
    let config = load_config()?;
    let registry = load_registry(&config, args.registry.as_deref())?;
    let root = project_root(args.path.as_ref())?;

    let mut scan_config = config.scan_config();
    scan_config.parallel |= args.parallel;

    let report = SignalScanner::new(&root, Arc::new(registry))
        .with_config(scan_config)
        .with_deadline(Deadline::after(config.timeout()))
        .scan()
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    let formatter = OutputFormatter::new(args.format.into());
    print!("{}", formatter.format_scan(&report)?);
    Ok(EXIT_OK)
}

pub fn handle_checksum(args: &ChecksumArgs) -> i32 {
    exit_code(
        "checksum",
        checksum::sha256_file(&args.file)
            .with_context(|| format!("Failed to hash {}", args.file.display()))
            .map(|digest| {
                println!("{}", digest);
                EXIT_OK
            }),
    )
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    exit_code("config", run_config(args))
}

fn run_config(args: &ConfigArgs) -> Result<i32> {
    let config = load_config()?;
    let formatter = OutputFormatter::new(args.format.into());
    print!("{}", formatter.format_config(&config)?);
    Ok(EXIT_OK)
}

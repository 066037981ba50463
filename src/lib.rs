//! packscout - buildpack detection and release manifest rendering
//!
//! This library classifies a source tree into a buildpack from cheap file
//! signals, and renders release manifests (such as a Homebrew formula) from
//! templates with golden snapshot verification of the result.
//!
//! # Core Concepts
//!
//! - **Signals**: marker files, file extensions, shebang interpreters and
//!   content-rule hits collected by the [`SignalScanner`]
//! - **Buildpacks**: registry entries with weighted, optionally mandatory
//!   signal predicates; the classifier picks the best-scoring eligible one
//! - **Manifests**: templates rendered against [`ReleaseMetadata`] and
//!   compared byte-for-byte with golden artifacts
//!
//! # Example Usage
//!
//! ```no_run
//! use packscout::{BuildpackRegistry, ManifestTemplate, Pipeline, ReleaseMetadata, Shell};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let pipeline = Pipeline::new(Arc::new(BuildpackRegistry::with_defaults()));
//!
//! let detection = pipeline.detect(Path::new("."), None)?;
//! println!("buildpack: {}", detection.classification.label());
//!
//! let metadata = ReleaseMetadata::new(
//!     "jx",
//!     "1.0.2",
//!     "https://example.com/{{binary_name}}-{{version}}.tar.gz",
//!     "4c1f0e...",
//! )
//! .with_field("description", "CLI tool")
//! .with_field("homepage", "https://jenkins-x.io")
//! .with_shell(Shell::Bash);
//!
//! let rendered = pipeline.render(&ManifestTemplate::homebrew_formula(), &metadata)?;
//! print!("{}", rendered.text);
//! # Ok::<(), packscout::PipelineError>(())
//! ```
//!
//! # Project Structure
//!
//! - [`scan`]: project tree walking and signal extraction
//! - [`buildpack`]: definitions, registry and classifier
//! - [`manifest`]: templates, release metadata and the render engine
//! - [`golden`]: golden snapshot verification and diffs
//! - [`pipeline`]: scan → classify and render under one timeout

pub mod buildpack;
pub mod cli;
pub mod config;
pub mod error;
pub mod golden;
pub mod manifest;
pub mod pipeline;
pub mod scan;
pub mod util;

// Re-export key types for convenient access
pub use buildpack::{
    classify, classify_with_preference, BuildpackDefinition, BuildpackRegistry,
    ClassificationResult, SignalPredicate,
};
pub use config::{ConfigError, PackscoutConfig};
pub use error::{GoldenError, PipelineError, RegistryError, RenderError, ScanError, TimeoutError};
pub use golden::{GoldenFixture, VerificationResult, Verifier};
pub use manifest::{ManifestTemplate, ReleaseMetadata, RenderedManifest, Shell, TemplateEngine};
pub use pipeline::{Detection, Pipeline, PipelineConfig};
pub use scan::{ProjectSignal, ScanReport, SignalKind, SignalScanner};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_packscout() {
        assert_eq!(NAME, "packscout");
    }
}

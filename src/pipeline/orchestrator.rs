use super::config::PipelineConfig;
use super::deadline::Deadline;
use crate::buildpack::{classify_with_preference, BuildpackRegistry, ClassificationResult};
use crate::error::PipelineError;
use crate::manifest::{
    EngineOptions, ManifestTemplate, ReleaseMetadata, RenderedManifest, TemplateEngine,
};
use crate::scan::{ScanReport, SignalScanner};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Scan report plus the buildpack chosen from it.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub report: ScanReport,
    pub classification: ClassificationResult,
}

/// Runs scan → classify and render under one overall deadline. When the
/// deadline passes the run fails with a timeout and nothing partial is
/// returned.
pub struct Pipeline {
    registry: Arc<BuildpackRegistry>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(registry: Arc<BuildpackRegistry>) -> Self {
        Self {
            registry,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<BuildpackRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn deadline(&self) -> Option<Deadline> {
        self.config.timeout.map(Deadline::after)
    }

    fn check(deadline: &Option<Deadline>) -> Result<(), PipelineError> {
        if let Some(deadline) = deadline {
            deadline.check()?;
        }
        Ok(())
    }

    pub fn detect(&self, root: &Path, preferred: Option<&str>) -> Result<Detection, PipelineError> {
        let start = Instant::now();
        let deadline = self.deadline();
        info!(root = %root.display(), timeout = ?self.config.timeout, "Starting detection");

        let mut scanner = SignalScanner::new(root, Arc::clone(&self.registry))
            .with_config(self.config.scan.clone());
        if let Some(deadline) = deadline {
            scanner = scanner.with_deadline(deadline);
        }

        let report = scanner.scan()?;
        Self::check(&deadline)?;

        let classification = classify_with_preference(&report.signals, &self.registry, preferred);
        Self::check(&deadline)?;

        debug!(
            buildpack = classification.label(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detection complete"
        );
        Ok(Detection {
            report,
            classification,
        })
    }

    pub fn render(
        &self,
        template: &ManifestTemplate,
        metadata: &ReleaseMetadata,
    ) -> Result<RenderedManifest, PipelineError> {
        let deadline = self.deadline();
        Self::check(&deadline)?;

        let engine = TemplateEngine::with_options(EngineOptions {
            strict: self.config.strict_render,
        });
        let rendered = engine.render(template, metadata)?;
        Self::check(&deadline)?;

        Ok(rendered)
    }
}

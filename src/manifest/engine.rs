use super::metadata::{ReleaseMetadata, Shell};
use super::template::{ManifestTemplate, Segment, SHELL_SCOPE_FIELDS};
use crate::error::RenderError;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject metadata fields and completion shells the template never uses
    pub strict: bool,
}

/// Output of a single render. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedManifest {
    pub text: String,
    pub source_template_id: String,
    pub metadata_version: String,
}

impl RenderedManifest {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    options: EngineOptions,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn strict() -> Self {
        Self::with_options(EngineOptions { strict: true })
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Renders `template` for one release.
    ///
    /// Fails before producing any output when the metadata is invalid, a
    /// referenced field is missing, or (in strict mode) the metadata carries
    /// something the template never uses.
    pub fn render(
        &self,
        template: &ManifestTemplate,
        metadata: &ReleaseMetadata,
    ) -> Result<RenderedManifest, RenderError> {
        metadata.validate()?;
        let segments = template.segments()?;

        check_fields(&segments, metadata, &template.id, false)?;
        if self.options.strict {
            self.check_unused(template, &segments, metadata)?;
        }

        let mut text = String::with_capacity(template.source.len() + 256);
        render_segments(&segments, metadata, None, &mut text);

        info!(
            template = %template.id,
            binary = %metadata.binary_name,
            version = %metadata.version,
            bytes = text.len(),
            "Rendered manifest"
        );

        Ok(RenderedManifest {
            text,
            source_template_id: template.id.clone(),
            metadata_version: metadata.version.clone(),
        })
    }

    fn check_unused(
        &self,
        template: &ManifestTemplate,
        segments: &[Segment],
        metadata: &ReleaseMetadata,
    ) -> Result<(), RenderError> {
        let referenced = template.referenced_fields()?;

        if let Some(key) = metadata.extra.keys().find(|k| !referenced.contains(*k)) {
            return Err(RenderError::UnknownField {
                template: template.id.clone(),
                field: key.clone(),
            });
        }

        let has_section = segments
            .iter()
            .any(|s| matches!(s, Segment::Completions(_)));
        if !metadata.completion_shells.is_empty() && !has_section {
            return Err(RenderError::UnknownField {
                template: template.id.clone(),
                field: "completion_shells".to_string(),
            });
        }

        Ok(())
    }
}

/// Every referenced field must resolve, whether or not any shell is declared.
fn check_fields(
    segments: &[Segment],
    metadata: &ReleaseMetadata,
    template_id: &str,
    in_section: bool,
) -> Result<(), RenderError> {
    for segment in segments {
        match segment {
            Segment::Text(_) => {}
            Segment::Field(name) => {
                let scoped = in_section && SHELL_SCOPE_FIELDS.contains(&name.as_str());
                if !scoped && metadata.field(name).is_none() {
                    debug!(template = template_id, field = %name, "Missing template field");
                    return Err(RenderError::MissingField {
                        template: template_id.to_string(),
                        field: name.clone(),
                    });
                }
            }
            Segment::Completions(body) => check_fields(body, metadata, template_id, true)?,
        }
    }
    Ok(())
}

fn shell_field(shell: Shell, name: &str, metadata: &ReleaseMetadata) -> Option<String> {
    match name {
        "shell" => Some(shell.name().to_string()),
        "completion_dir" => Some(shell.completion_dir().to_string()),
        "completion_file" => Some(shell.completion_file(&metadata.binary_name)),
        _ => None,
    }
}

fn render_segments(
    segments: &[Segment],
    metadata: &ReleaseMetadata,
    shell: Option<Shell>,
    out: &mut String,
) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Field(name) => {
                let value = shell
                    .and_then(|s| shell_field(s, name, metadata))
                    .or_else(|| metadata.field(name));
                // Resolution was checked up front.
                if let Some(value) = value {
                    out.push_str(&value);
                }
            }
            Segment::Completions(body) => {
                for shell in &metadata.completion_shells {
                    render_segments(body, metadata, Some(*shell), out);
                }
            }
        }
    }
}

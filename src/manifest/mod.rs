//! Release manifest rendering.
//!
//! A [`ManifestTemplate`] is rendered against one [`ReleaseMetadata`] record
//! by the [`TemplateEngine`]. The install body is opaque text; only
//! `{{field}}` placeholders and the `{{#completions}}` section are
//! interpreted.

pub mod checksum;
mod engine;
mod metadata;
mod template;

pub use engine::{EngineOptions, RenderedManifest, TemplateEngine};
pub use metadata::{is_semver, ReleaseMetadata, Shell, CORE_FIELDS};
pub use template::{ManifestTemplate, COMPLETIONS_SECTION, SHELL_SCOPE_FIELDS};

use crate::error::RenderError;
use regex::Regex;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

const HOMEBREW_FORMULA: &str = include_str!("../../templates/homebrew-formula.rb.tmpl");

/// The only section a template may declare.
pub const COMPLETIONS_SECTION: &str = "completions";

/// Names in scope only inside the completions section.
pub const SHELL_SCOPE_FIELDS: &[&str] = &["shell", "completion_dir", "completion_file"];

pub(crate) fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"\{\{\s*([#/]?)\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Text(String),
    Field(String),
    Completions(Vec<Segment>),
}

/// A manifest template: opaque text with `{{field}}` placeholders and at most
/// one `{{#completions}}...{{/completions}}` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplate {
    pub id: String,
    pub source: String,
}

impl ManifestTemplate {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }

    /// Built-in Homebrew formula installing the binary and its shell
    /// completions.
    pub fn homebrew_formula() -> Self {
        Self::new("homebrew-formula", HOMEBREW_FORMULA)
    }

    /// Loads a template file. `homebrew-formula.rb.tmpl` gets the id
    /// `homebrew-formula`.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = file_name.strip_suffix(".tmpl").unwrap_or(&file_name);
        let id = stem.split_once('.').map(|(id, _)| id).unwrap_or(stem);
        Ok(Self::new(id, source))
    }

    /// Every field name the template references, section scope included.
    pub fn referenced_fields(&self) -> Result<BTreeSet<String>, RenderError> {
        let mut fields = BTreeSet::new();
        collect_fields(&self.segments()?, &mut fields);
        Ok(fields)
    }

    pub fn has_completions(&self) -> Result<bool, RenderError> {
        Ok(self
            .segments()?
            .iter()
            .any(|s| matches!(s, Segment::Completions(_))))
    }

    pub(crate) fn segments(&self) -> Result<Vec<Segment>, RenderError> {
        Parser::new(self).parse()
    }

    fn invalid(&self, offset: usize, message: impl std::fmt::Display) -> RenderError {
        let line = self.source[..offset].matches('\n').count() + 1;
        RenderError::InvalidTemplate {
            template: self.id.clone(),
            message: format!("line {}: {}", line, message),
        }
    }
}

fn collect_fields(segments: &[Segment], fields: &mut BTreeSet<String>) {
    for segment in segments {
        match segment {
            Segment::Text(_) => {}
            Segment::Field(name) => {
                fields.insert(name.clone());
            }
            Segment::Completions(body) => collect_fields(body, fields),
        }
    }
}

struct Parser<'a> {
    template: &'a ManifestTemplate,
    top: Vec<Segment>,
    section: Option<(usize, Vec<Segment>)>,
    seen_section: bool,
}

impl<'a> Parser<'a> {
    fn new(template: &'a ManifestTemplate) -> Self {
        Self {
            template,
            top: Vec::new(),
            section: None,
            seen_section: false,
        }
    }

    fn current(&mut self) -> &mut Vec<Segment> {
        match &mut self.section {
            Some((_, body)) => body,
            None => &mut self.top,
        }
    }

    fn push_text(&mut self, offset: usize, text: &str) -> Result<(), RenderError> {
        if let Some(pos) = text.find("{{") {
            return Err(self.template.invalid(offset + pos, "malformed placeholder"));
        }
        if !text.is_empty() {
            self.current().push(Segment::Text(text.to_string()));
        }
        Ok(())
    }

    fn parse(mut self) -> Result<Vec<Segment>, RenderError> {
        let template = self.template;
        let source = template.source.as_str();
        let mut cursor = 0;

        for caps in tag_regex().captures_iter(source) {
            let (Some(whole), Some(sigil), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let name = name.as_str();

            if sigil.as_str().is_empty() {
                self.push_text(cursor, &source[cursor..whole.start()])?;
                self.current().push(Segment::Field(name.to_string()));
                cursor = whole.end();
                continue;
            }

            // Section tags alone on their line take the whole line with them.
            let line_start = source[..whole.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let rest_of_line = source[whole.end()..]
                .find('\n')
                .map(|i| whole.end() + i + 1)
                .unwrap_or(source.len());
            let standalone = line_start >= cursor
                && source[line_start..whole.start()].trim().is_empty()
                && source[whole.end()..rest_of_line].trim().is_empty();
            let (text_end, next_cursor) = if standalone {
                (line_start, rest_of_line)
            } else {
                (whole.start(), whole.end())
            };
            self.push_text(cursor, &source[cursor..text_end])?;
            cursor = next_cursor;

            if name != COMPLETIONS_SECTION {
                return Err(self
                    .template
                    .invalid(whole.start(), format!("unknown section '{}'", name)));
            }

            match (sigil.as_str(), self.section.take()) {
                ("#", None) if self.seen_section => {
                    return Err(self
                        .template
                        .invalid(whole.start(), "only one completions section is allowed"));
                }
                ("#", None) => {
                    self.seen_section = true;
                    self.section = Some((whole.start(), Vec::new()));
                }
                ("#", Some(_)) => {
                    return Err(self
                        .template
                        .invalid(whole.start(), "completions sections cannot be nested"));
                }
                (_, Some((_, body))) => {
                    self.top.push(Segment::Completions(body));
                }
                (_, None) => {
                    return Err(self
                        .template
                        .invalid(whole.start(), "closing tag without an open section"));
                }
            }
        }

        self.push_text(cursor, &source[cursor..])?;

        if let Some((opened_at, _)) = self.section {
            return Err(self
                .template
                .invalid(opened_at, "completions section is never closed"));
        }

        Ok(self.top)
    }
}

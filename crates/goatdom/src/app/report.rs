//! Human-readable renderings of authored instructions and tree outlines.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::expansion::ExpansionState;
use crate::app::instructions::KeyWarning;
use crate::app::tree::TreeModel;
use crate::domain::model::RetrievalInstruction;

const PREVIEW_WIDTH: usize = 60;

/// Supported report formats.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// Markdown document with one section per instruction.
    #[default]
    Markdown,
    /// Plain text listing.
    Plain,
}

impl ReportFormat {
    /// Stable identifier, also the name of the built-in template.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Plain => "plain",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "plain" | "text" | "txt" => Ok(ReportFormat::Plain),
            other => Err(ReportFormatParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`ReportFormat`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ReportFormatParseError {
    #[error("unknown report format '{0}'")]
    UnknownFormat(String),
}

/// Renders instruction lists through built-in templates.
pub struct Reporter {
    env: Environment<'static>,
}

impl Reporter {
    /// Create a reporter with the built-in templates loaded.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(ReportFormat::Markdown.as_str(), MARKDOWN_TEMPLATE)
            .map_err(|err| anyhow!("failed to register markdown template: {err}"))?;
        env.add_template(ReportFormat::Plain.as_str(), PLAIN_TEMPLATE)
            .map_err(|err| anyhow!("failed to register plain template: {err}"))?;
        Ok(Self { env })
    }

    pub fn render(
        &self,
        url: &str,
        instructions: &[RetrievalInstruction],
        warnings: &[KeyWarning],
        format: ReportFormat,
    ) -> Result<String> {
        let context = build_context(url, instructions, warnings)?;
        let name = format.as_str();
        self.env
            .get_template(name)
            .map_err(|err| anyhow!("template '{name}' not found: {err}"))?
            .render(&context)
            .map_err(|err| anyhow!("failed to render template '{name}': {err}"))
    }
}

/// Indented outline of the rows `state` makes visible.
///
/// Each row reads `<tag> #id  preview`, prefixed with `+` for a collapsed branch and `-` for
/// an expanded one.
pub fn render_outline(tree: &TreeModel, state: &ExpansionState) -> String {
    let mut out = String::new();
    for (node, depth) in state.visible(tree) {
        let marker = if node.is_leaf() {
            ' '
        } else if state.is_expanded(node.id) {
            '-'
        } else {
            '+'
        };
        let _ = write!(
            out,
            "{:indent$}{marker} <{}> #{}",
            "",
            node.tag_type,
            node.id,
            indent = depth * 2
        );
        let preview = short_preview(&node.raw_preview);
        if !preview.is_empty() {
            let _ = write!(out, "  {preview}");
        }
        out.push('\n');
    }
    out
}

fn short_preview(raw: &str) -> String {
    let line = raw.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_WIDTH {
        let cut: String = line.chars().take(PREVIEW_WIDTH - 3).collect();
        format!("{cut}...")
    } else {
        line.to_owned()
    }
}

fn build_context(
    url: &str,
    instructions: &[RetrievalInstruction],
    warnings: &[KeyWarning],
) -> Result<TemplateContext> {
    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format report timestamp")?;

    let instructions = instructions
        .iter()
        .map(|instruction| TemplateInstruction {
            key: instruction.output.key.clone(),
            location: instruction.output.location.clone(),
            node_query: instruction.node_query.clone(),
            tag: instruction
                .preview
                .as_ref()
                .map(|preview| preview.tag_type.clone()),
            preview: instruction
                .preview
                .as_ref()
                .map(|preview| short_preview(&preview.raw_preview))
                .filter(|preview| !preview.is_empty()),
            flags: if instruction.flags.is_empty() {
                None
            } else {
                serde_json::to_string(&instruction.flags).ok()
            },
        })
        .collect();

    let warnings = warnings.iter().map(KeyWarning::to_string).collect();

    Ok(TemplateContext {
        generated_at,
        url: url.to_owned(),
        instructions,
        warnings,
    })
}

#[derive(Serialize)]
struct TemplateContext {
    generated_at: String,
    url: String,
    instructions: Vec<TemplateInstruction>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct TemplateInstruction {
    key: String,
    location: String,
    node_query: String,
    tag: Option<String>,
    preview: Option<String>,
    flags: Option<String>,
}

const MARKDOWN_TEMPLATE: &str = r#"# Retrieval Instructions

- URL: {{ url }}
- Generated at: {{ generated_at }}
- Instructions: {{ instructions | length }}

{% if warnings %}
## Warnings
{% for warning in warnings %}
- {{ warning }}
{% endfor %}

{% endif %}
{% for item in instructions %}
## {{ loop.index }}. `{{ item.key }}`
- Query: `{{ item.node_query }}`
- Location: `{{ item.location }}`
{% if item.tag %}- Tag: `{{ item.tag }}`
{% endif %}
{% if item.flags %}- Flags: `{{ item.flags }}`
{% endif %}
{% if item.preview %}

```html
{{ item.preview }}
```
{% endif %}

{% endfor %}
"#;

const PLAIN_TEMPLATE: &str = r#"Retrieval instructions for {{ url }} generated at {{ generated_at }}
{% for warning in warnings %}
warning: {{ warning }}
{% endfor %}

{% for item in instructions %}
{{ loop.index }}. {{ item.key }} <- {{ item.node_query }} @ {{ item.location }}{% if item.tag %} ({{ item.tag }}){% endif %}

{% if item.flags %}   flags: {{ item.flags }}
{% endif %}
{% endfor %}
"#;

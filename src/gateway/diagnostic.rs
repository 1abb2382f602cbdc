//! Development-mode diagnostic page.
//!
//! # Responsibilities
//! - Compile the page template once at startup
//! - Render the page for a failed round trip
//!
//! # Design Decisions
//! - Templates use `{{.Field}}` actions; text values are HTML-escaped
//! - Syntax errors surface at compile time, unknown fields at render time
//! - The compiled template is immutable and shared by every request
//! - The local UTC offset is read once, before the runtime starts worker
//!   threads; `time` refuses to read it from a multi-threaded process

use std::fmt::Write as _;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::{RenderError, TemplateError};

/// Seconds between automatic reloads of the diagnostic page.
pub const RELOAD_SECONDS: u64 = 5;

const ERROR_PAGE_NAME: &str = "error502";

const ERROR_PAGE: &str = r#"
<html>
<head>
<title>502: {{.Backend}} is not responding</title>
<script>
window.setTimeout(function() { location.reload() }, {{.ReloadMillis}})
</script>
</head>

<body>
<h1>502</h1>
<p>{{.Backend}} is not responding. The error was:</p>

<pre>{{.Error}}</pre>

<p>If you just started {{.Backend}} it can take 60-300 seconds before it has finished booting. This page will automatically reload every {{.ReloadSeconds}} seconds.</p>
<footer>Generated by badgateway-proxy running in development mode at {{.Time}}.</footer>
</body>
</html>
"#;

static SHARED: OnceCell<Arc<DiagnosticRenderer>> = OnceCell::new();
static LOCAL_OFFSET: OnceCell<UtcOffset> = OnceCell::new();

/// Offset used for page timestamps, cached on first call.
///
/// Call from `main` while the process is still single-threaded. Falls back to
/// UTC if the offset can't be determined at that point.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// A value looked up by a template action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    Int(u64),
    Text(&'a str),
}

/// Data a template can be rendered against.
pub trait TemplateData {
    fn field(&self, name: &str) -> Option<Value<'_>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A compiled page template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile `source`.
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_owned()));
            }
            let action_offset = offset + start;
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or_else(|| TemplateError::Unclosed {
                name: name.to_owned(),
                offset: action_offset,
            })?;

            let action = after_open[..end].trim();
            if action.is_empty() {
                return Err(TemplateError::EmptyAction {
                    name: name.to_owned(),
                    offset: action_offset,
                });
            }
            match action.strip_prefix('.') {
                Some(field) if is_identifier(field) => segments.push(Segment::Field(field.to_owned())),
                _ => {
                    return Err(TemplateError::UnsupportedAction {
                        name: name.to_owned(),
                        action: action.to_owned(),
                        offset: action_offset,
                    })
                }
            }

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_owned()));
        }

        Ok(Self {
            name: name.to_owned(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render against `data`, escaping text values for HTML.
    pub fn render(&self, data: &dyn TemplateData) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => match data.field(field) {
                    Some(Value::Int(n)) => write!(out, "{}", n)?,
                    Some(Value::Text(text)) => escape_html(&mut out, text),
                    None => {
                        return Err(RenderError::UnknownField {
                            template: self.name.clone(),
                            field: field.clone(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_html(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
}

/// Inputs for one rendering of the diagnostic page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext<'a> {
    /// Wall-clock time, `HH:MM:SS`.
    pub time: String,
    pub error: &'a str,
    pub reload_seconds: u64,
    pub backend: &'a str,
}

impl<'a> DiagnosticContext<'a> {
    /// Context stamped with the current time at [`local_offset`].
    pub fn now(backend: &'a str, error: &'a str) -> Result<Self, RenderError> {
        Self::at(backend, error, OffsetDateTime::now_utc().to_offset(local_offset()))
    }

    pub fn at(backend: &'a str, error: &'a str, time: OffsetDateTime) -> Result<Self, RenderError> {
        Ok(Self {
            time: format_clock(time)?,
            error,
            reload_seconds: RELOAD_SECONDS,
            backend,
        })
    }
}

impl TemplateData for DiagnosticContext<'_> {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        match name {
            "Time" => Some(Value::Text(&self.time)),
            "Error" => Some(Value::Text(self.error)),
            "ReloadSeconds" => Some(Value::Int(self.reload_seconds)),
            "ReloadMillis" => Some(Value::Int(self.reload_seconds.saturating_mul(1000))),
            "Backend" => Some(Value::Text(self.backend)),
            _ => None,
        }
    }
}

/// Format a timestamp as `HH:MM:SS`.
pub fn format_clock(at: OffsetDateTime) -> Result<String, RenderError> {
    Ok(at.format(format_description!("[hour]:[minute]:[second]"))?)
}

/// Renders the development-mode 502 page.
#[derive(Debug)]
pub struct DiagnosticRenderer {
    template: Template,
}

impl DiagnosticRenderer {
    /// Renderer for the built-in error page.
    pub fn new() -> Result<Self, TemplateError> {
        Template::parse(ERROR_PAGE_NAME, ERROR_PAGE).map(Self::with_template)
    }

    /// Renderer for an already compiled `template`.
    pub fn with_template(template: Template) -> Self {
        Self { template }
    }

    /// Process-wide renderer for the built-in page, compiled on first use.
    ///
    /// Call during startup so a broken template stops the process before it
    /// serves traffic.
    pub fn shared() -> Result<Arc<Self>, TemplateError> {
        SHARED.get_or_try_init(|| Self::new().map(Arc::new)).cloned()
    }

    pub fn render(&self, context: &DiagnosticContext<'_>) -> Result<String, RenderError> {
        self.template.render(context)
    }
}

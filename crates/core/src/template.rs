//! Notification template rendering.
//!
//! Templates are logic-free: the only construct is `{{ name }}`, replaced by
//! the value of `name` in a flat context built from the event (see
//! [`Event::context`]). Dotted names descend into nested payload values.
//! There are no expressions, filters or loops.
//!
//! A field that cannot be rendered keeps its original text and is reported
//! in [`Rendered::failures`] so callers can log it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::channels::{ordered_channel_set, CHANNEL_IN_APP};
use crate::event::{lookup_path, Event, Severity};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Template key holding the list of recipient role names.
pub const RECIPIENT_ROLES_KEY: &str = "recipient_roles";

/// Matches `{{ ... }}` tokens. The inner text is validated separately so a
/// malformed name is reported instead of silently left in place.
static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid regex"));

/// Valid variable names: identifier segments joined by dots.
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("unresolved variable {0:?}")]
    UnresolvedVariable(String),

    #[error("malformed template: {0}")]
    Malformed(String),
}

/// A template field that fell back to its literal source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub field: String,
    pub error: String,
}

/// Output of [`render`].
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub fields: Map<String, Value>,
    pub failures: Vec<RenderFailure>,
}

impl Rendered {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render every string-valued field of `template` against `event`.
///
/// Non-string fields (role lists, numbers, objects) pass through unchanged.
pub fn render(template: &Map<String, Value>, event: &Event) -> Rendered {
    let context = event.context();
    let mut rendered = Rendered::default();

    for (key, value) in template {
        let out = match value {
            Value::String(source) => match render_str(source, &context) {
                Ok(text) => Value::String(text),
                Err(e) => {
                    rendered.failures.push(RenderFailure {
                        field: key.clone(),
                        error: e.to_string(),
                    });
                    value.clone()
                }
            },
            other => other.clone(),
        };
        rendered.fields.insert(key.clone(), out);
    }

    rendered
}

/// Expand a single template string against a flat context.
pub fn render_str(source: &str, context: &Map<String, Value>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in VARIABLE_RE.captures_iter(source) {
        let whole = caps.get(0).expect("capture 0 always present");
        let literal = &source[last..whole.start()];
        check_literal(literal)?;
        out.push_str(literal);

        let name = caps[1].trim();
        if !NAME_RE.is_match(name) {
            return Err(RenderError::Malformed(format!("invalid variable name {name:?}")));
        }
        let value = resolve(context, name)
            .ok_or_else(|| RenderError::UnresolvedVariable(name.to_string()))?;
        out.push_str(&display_value(value));

        last = whole.end();
    }

    let tail = &source[last..];
    check_literal(tail)?;
    out.push_str(tail);
    Ok(out)
}

/// Literal text between tokens must not open another token.
fn check_literal(literal: &str) -> Result<(), RenderError> {
    if literal.contains("{{") {
        return Err(RenderError::Malformed("unterminated \"{{\"".into()));
    }
    Ok(())
}

fn resolve<'a>(context: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    match name.split_once('.') {
        None => context.get(name),
        Some((head, rest)) => lookup_path(context.get(head)?, rest),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Typed view of a rendered template
// ---------------------------------------------------------------------------

/// Role names listed under `recipient_roles`. Non-string entries are ignored.
pub fn recipient_roles(template: &Map<String, Value>) -> Vec<String> {
    template
        .get(RECIPIENT_ROLES_KEY)
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// The notification fields extracted from a rendered template.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub metadata: Value,
    /// Ordered set of requested channel names.
    pub channels: Vec<String>,
}

impl NotificationContent {
    /// Build content from rendered fields, defaulting what the template
    /// leaves out: the title falls back to the event type, severity to the
    /// event's, channels to `["in_app"]`.
    pub fn from_rendered(fields: &Map<String, Value>, event: &Event) -> Self {
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };

        let channels = match fields.get("channels").and_then(Value::as_array) {
            Some(list) => ordered_channel_set(list.iter().filter_map(Value::as_str)),
            None => Vec::new(),
        };
        let channels = if channels.is_empty() {
            vec![CHANNEL_IN_APP.to_string()]
        } else {
            channels
        };

        let metadata = match fields.get("metadata") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };

        Self {
            title: text("title").unwrap_or_else(|| event.event_type.clone()),
            body: text("body").unwrap_or_default(),
            severity: text("severity")
                .and_then(|s| Severity::parse(&s))
                .unwrap_or(event.severity),
            action_url: text("action_url"),
            action_label: text("action_label"),
            metadata,
            channels,
        }
    }
}

//! Snapshot name templates.
//!
//! Supported tokens are `{{timestamp}}` (Unix seconds at prepare time) and
//! `{{uuid}}` (a random v4 UUID). Whitespace inside the braces is ignored.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

/// Values substituted into a template.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TemplateContext {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Identifier substituted for `{{uuid}}`.
    pub uuid: Uuid,
}

impl TemplateContext {
    /// Captures the current time and a fresh UUID.
    #[must_use]
    pub fn now() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            timestamp,
            uuid: Uuid::new_v4(),
        }
    }
}

/// Reasons a template cannot be rendered.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TemplateError {
    /// A `{{` was never closed.
    #[error("unclosed '{{{{' in template {0:?}")]
    Unclosed(String),
    /// The token between the braces is not supported.
    #[error("unknown template token {0:?}")]
    UnknownToken(String),
    /// Rendering produced an empty name.
    #[error("template renders to an empty name")]
    Empty,
}

/// Expands every token in `template`.
///
/// # Errors
///
/// Returns [`TemplateError`] for unclosed or unknown tokens and for
/// templates that render to an empty string.
pub fn render(template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after)) = rest.split_once("{{") {
        rendered.push_str(before);
        let (token, tail) = after
            .split_once("}}")
            .ok_or_else(|| TemplateError::Unclosed(template.to_owned()))?;
        match token.trim() {
            "timestamp" => rendered.push_str(&context.timestamp.to_string()),
            "uuid" => rendered.push_str(&context.uuid.to_string()),
            other => return Err(TemplateError::UnknownToken(other.to_owned())),
        }
        rest = tail;
    }
    rendered.push_str(rest);

    if rendered.trim().is_empty() {
        return Err(TemplateError::Empty);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            timestamp: 1_700_000_000,
            uuid: Uuid::nil(),
        }
    }

    #[test]
    fn renders_timestamp_token() {
        let name = render("{{timestamp}}", &context()).expect("render");
        assert_eq!(name, "1700000000");
    }

    #[test]
    fn renders_tokens_with_surrounding_text_and_spaces() {
        let name = render("kiln-{{ timestamp }}-{{uuid}}", &context()).expect("render");
        assert_eq!(
            name,
            "kiln-1700000000-00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn leaves_plain_names_untouched() {
        let name = render("foobarbaz", &context()).expect("render");
        assert_eq!(name, "foobarbaz");
    }

    #[test]
    fn rejects_unknown_tokens() {
        let err = render("{{ user `x` }}", &context()).expect_err("unknown token");
        assert_eq!(err, TemplateError::UnknownToken(String::from("user `x`")));
    }

    #[test]
    fn rejects_unclosed_tokens() {
        let err = render("kiln-{{timestamp", &context()).expect_err("unclosed");
        assert!(matches!(err, TemplateError::Unclosed(_)));
    }

    #[test]
    fn rejects_blank_names() {
        assert_eq!(render("  ", &context()), Err(TemplateError::Empty));
    }

    #[test]
    fn now_produces_a_recent_timestamp() {
        let context = TemplateContext::now();
        assert!(context.timestamp > 1_600_000_000);
    }
}

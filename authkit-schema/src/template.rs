//! Schema template rendering.
//!
//! Feature schema templates are DDL with `{{ ... }}` placeholders. The
//! evaluation context is intentionally tiny: a table naming prefix and a
//! pluralization helper. Rendering never touches a database.
//!
//! ```text
//! CREATE TABLE IF NOT EXISTS {{ prefix | plural }} (
//!     id INTEGER PRIMARY KEY
//! );
//! CREATE TABLE IF NOT EXISTS {{ prefix }}_password_hashes (
//!     id INTEGER PRIMARY KEY REFERENCES {{ prefix | plural }}(id),
//!     password_hash TEXT NOT NULL
//! );
//! ```
//!
//! Supported expressions are `prefix` or a quoted literal, followed by any
//! number of `plural` / `singular` filters.

use regex_lite::Regex;

use crate::error::{SchemaError, SchemaResult};

/// Default table naming prefix.
pub const DEFAULT_PREFIX: &str = "account";

const PLACEHOLDER: &str = r"\{\{([^{}]*)\}\}";

/// Evaluation context for schema templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    prefix: String,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl TemplateContext {
    /// Create a context with the given table prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The table naming prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefixed table name, e.g. `account_otp_keys` for `otp_keys`.
    pub fn table(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// Pluralized prefix, e.g. `accounts`.
    pub fn plural_prefix(&self) -> String {
        pluralize(&self.prefix)
    }

    /// Render a template for the named feature.
    pub fn render(&self, feature: &str, template: &str) -> SchemaResult<String> {
        let re = Regex::new(PLACEHOLDER).map_err(|e| SchemaError::template(feature, e.to_string()))?;

        let mut output = String::with_capacity(template.len());
        let mut last = 0;
        for cap in re.captures_iter(template) {
            let (Some(whole), Some(expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            output.push_str(&template[last..whole.start()]);
            output.push_str(&self.evaluate(feature, expr.as_str())?);
            last = whole.end();
        }
        output.push_str(&template[last..]);

        let rest = &template[last..];
        if output.contains("{{") || rest.contains("}}") {
            return Err(SchemaError::template(feature, "unterminated placeholder"));
        }

        Ok(output)
    }

    fn evaluate(&self, feature: &str, expr: &str) -> SchemaResult<String> {
        let mut parts = expr.split('|').map(str::trim);
        let head = parts.next().unwrap_or_default();

        let mut value = if head == "prefix" {
            self.prefix.clone()
        } else if let Some(literal) = quoted(head) {
            literal.to_string()
        } else if head.is_empty() {
            return Err(SchemaError::template(feature, "empty placeholder"));
        } else {
            return Err(SchemaError::template(
                feature,
                format!("unknown placeholder `{}`", head),
            ));
        };

        for filter in parts {
            value = match filter {
                "plural" => pluralize(&value),
                "singular" => singularize(&value),
                other => {
                    return Err(SchemaError::template(
                        feature,
                        format!("unknown filter `{}`", other),
                    ));
                }
            };
        }

        Ok(value)
    }
}

fn quoted(s: &str) -> Option<&str> {
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
}

/// Pluralize an English word using regular rules.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();
    if ["s", "x", "z", "ch", "sh"].iter().any(|e| lower.ends_with(e)) {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last().map(|c| c.to_ascii_lowercase());
        if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u') | None) {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}

/// Singularize an English word using regular rules.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if let Some(stem) = lower.strip_suffix("ies") {
        return format!("{}y", &word[..stem.len()]);
    }
    if ["ches", "shes", "sses", "uses", "xes", "zes"]
        .iter()
        .any(|e| lower.ends_with(e))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

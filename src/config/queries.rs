//! JQL query templates and custom field mapping.

use std::collections::BTreeMap;

use super::{ConfigError, Result};

/// Named JQL templates from the `[queries]` section.
///
/// Templates contain `{name}` placeholders; `{{` and `}}` stand for literal
/// braces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplates {
    templates: BTreeMap<String, String>,
}

impl QueryTemplates {
    /// Create from a name → template map.
    pub fn new(templates: BTreeMap<String, String>) -> Self {
        Self { templates }
    }

    /// Get a template by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` when the template is not configured.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey(format!("queries.{}", name)))
    }

    /// Render the named template with the given values.
    pub fn render(&self, name: &str, values: &BTreeMap<&str, String>) -> Result<String> {
        render_template(self.get(name)?, values)
    }
}

/// Substitute `{name}` placeholders in a template.
///
/// # Errors
///
/// Returns `ConfigError::InvalidTemplate` for unknown placeholders,
/// unterminated placeholders and unmatched `}`.
pub fn render_template(template: &str, values: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ConfigError::InvalidTemplate(format!(
                                "unterminated placeholder in '{}'",
                                template
                            )))
                        }
                    }
                }
                let value = values.get(name.trim()).ok_or_else(|| {
                    ConfigError::InvalidTemplate(format!(
                        "unknown placeholder '{{{}}}' in '{}'",
                        name, template
                    ))
                })?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(ConfigError::InvalidTemplate(format!(
                    "single '}}' in '{}'",
                    template
                )))
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Render values as a JQL list: `("A", "B")`.
pub fn jql_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("({})", quoted.join(", "))
}

/// Mapping of human names to JIRA custom field IDs from `[custom_fields]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFields {
    fields: BTreeMap<String, String>,
}

impl CustomFields {
    /// Key of the story points field.
    pub const STORY_POINTS: &'static str = "story_points";
    /// Key of the t-shirt size field.
    pub const T_SHIRT_SIZE: &'static str = "t_shirt_size";

    /// Create from a name → field ID map.
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// Get a field ID by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` when the field is not mapped.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingKey(format!("custom_fields.{}", name)))
    }

    /// The story points field ID.
    pub fn story_points(&self) -> Result<&str> {
        self.get(Self::STORY_POINTS)
    }

    /// The t-shirt size field ID.
    pub fn t_shirt_size(&self) -> Result<&str> {
        self.get(Self::T_SHIRT_SIZE)
    }
}

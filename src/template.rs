//! Prompt template rendering.
//!
//! Templates are plain text with `{name}` placeholders. Every placeholder
//! must resolve against the supplied variables; a missing binding is a
//! fatal setup error, not something to render as-is. `{{` and `}}` escape
//! literal braces so templates can show JSON examples.

use std::collections::BTreeMap;

use crate::error::TemplateError;

/// Named values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    vars: BTreeMap<String, String>,
}

impl TemplateVars {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Render `template`, substituting every `{name}` placeholder.
///
/// Positions in errors are byte offsets into the template.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '}' => {
                            closed = true;
                            break;
                        }
                        // An opening brace inside a placeholder means the
                        // first one was never closed.
                        '{' => return Err(TemplateError::UnmatchedOpenBrace { position }),
                        _ => name.push(inner),
                    }
                }
                if !closed {
                    return Err(TemplateError::UnmatchedOpenBrace { position });
                }
                if name.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder { position });
                }
                match vars.get(&name) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingVariable { name }),
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedCloseBrace { position });
                }
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

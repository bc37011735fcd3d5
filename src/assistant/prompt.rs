//! Layered prompt builder.
//!
//! Prompts are assembled from a stack of plain-text fragments stored under
//! the prompts directory (`config/prompts/` by default). Each layer is
//! appended in order; missing files are skipped, or replaced by built-in
//! text with [`PromptBuilder::layer_or`].
//!
//! Variable substitution uses `{{key}}` syntax and is applied once at
//! [`build()`](PromptBuilder::build) time, after all layers are joined.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const SEPARATOR: &str = "\n\n";

/// Fluent builder that assembles a layered prompt from template files.
///
/// ```rust
/// use learnbot::assistant::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("config/prompts")
///     .layer("does-not-exist.md")
///     .append("Question: {{message}}")
///     .var("message", "what is this?")
///     .build();
/// assert_eq!(prompt, "Question: what is this?");
/// ```
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append a layer loaded from `filename`; skipped when the file is
    /// missing or blank.
    pub fn layer(mut self, filename: &str) -> Self {
        if let Some(text) = self.read(filename) {
            self.parts.push(text);
        }
        self
    }

    /// Like [`layer`](Self::layer) but falls back to `default` when the file
    /// is missing or blank.
    pub fn layer_or(mut self, filename: &str, default: &str) -> Self {
        match self.read(filename) {
            Some(text) => {
                self.parts.push(text);
                self
            }
            None => self.append(default),
        }
    }

    /// Directly append a text fragment.
    pub fn append(mut self, text: impl Into<String>) -> Self {
        let s = text.into();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register `{{key}}` → `value` substitution pairs applied at build time.
    pub fn with_vars<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (k, v) in vars {
            self.vars.insert(k.to_string(), v.to_string());
        }
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Join all layers with blank lines and apply variable substitution.
    ///
    /// Placeholders are replaced in a single left-to-right pass over the
    /// joined template; substituted values are never scanned again.
    pub fn build(self) -> String {
        render(&self.parts.join(SEPARATOR), &self.vars)
    }

    fn read(&self, filename: &str) -> Option<String> {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            Err(_) => {
                tracing::debug!("prompt: layer '{}' not found, skipped", path.display());
                None
            }
        }
    }
}

fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        match vars.get(&after[..end]) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

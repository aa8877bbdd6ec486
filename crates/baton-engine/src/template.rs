use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError,
};
use serde_json::Value;

use baton_core::error::{BatonError, Result};

/// Renders `{{ ... }}` templates against the run's context tree.
///
/// Lookups that miss render as the empty string rather than failing, so a
/// partially populated context (a step that has not run yet) never aborts
/// an unrelated render. Syntax errors and helper misuse do fail.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        // Rendered text goes into prompts and command lines, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("shellEscape", Box::new(shell_escape_helper));
        Self { registry }
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<String> {
        if template.is_empty() {
            return Ok(String::new());
        }
        self.registry
            .render_template(template, data)
            .map_err(|e| BatonError::Template(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-quote a string for the shell, turning embedded single quotes
/// into the `'"'"'` dance. The empty string becomes `''`.
pub fn shell_escape(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", input.replace('\'', r#"'"'"'"#))
}

fn shell_escape_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or_else(|| RenderError::new("shellEscape requires one argument"))?;
    let raw = match param.value() {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    out.write(&shell_escape(&raw))?;
    Ok(())
}

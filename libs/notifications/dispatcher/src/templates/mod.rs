//! Email template rendering with Handlebars
//!
//! This module provides:
//! - `TemplateEngine`: the process-wide Handlebars registry, which owns the
//!   global partial namespace
//! - `CompiledTemplate`: an immutable, parsed page template
//! - `TemplateCache`: lazy fetch-and-compile of page templates by name
//!
//! Supported syntax is plain Handlebars: `{{field}}` (HTML-escaped),
//! `{{{raw}}}`, `{{#if}}`, `{{#each}}` and partial inclusion `{{> name}}`.

mod cache;

pub use cache::TemplateCache;

use crate::error::TemplateError;
use handlebars::{Context, Handlebars, RenderContext, Renderable, StringOutput, Template};
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

/// A parsed page template. Immutable once built.
#[derive(Debug)]
pub struct CompiledTemplate {
    name: String,
    template: Template,
}

impl CompiledTemplate {
    /// Parse template source text
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let template = Template::compile(source).map_err(|e| TemplateError::Compile {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { name, template })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn render_with(&self, registry: &Handlebars<'static>, data: &Value) -> Result<String, TemplateError> {
        let render_error = |reason: String| TemplateError::Render {
            name: self.name.clone(),
            reason,
        };

        let context = Context::wraps(data).map_err(|e| render_error(e.to_string()))?;
        let mut render_context = RenderContext::new(None);
        let mut output = StringOutput::new();

        self.template
            .render(registry, &context, &mut render_context, &mut output)
            .map_err(|e| render_error(e.to_string()))?;

        output.into_string().map_err(|e| render_error(e.to_string()))
    }
}

struct Registry {
    handlebars: Handlebars<'static>,
    partials: HashSet<String>,
}

/// Handlebars-based template engine
///
/// Holds the partial namespace shared by every page template. Partials are
/// registered during one-time configuration; renders take a read lock.
pub struct TemplateEngine {
    registry: RwLock<Registry>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing fields render as empty strings
        handlebars.set_strict_mode(false);

        Self {
            registry: RwLock::new(Registry {
                handlebars,
                partials: HashSet::new(),
            }),
        }
    }

    /// Register (or overwrite) a partial under `name`
    pub async fn register_partial(&self, name: &str, source: &str) -> Result<(), TemplateError> {
        let mut registry = self.registry.write().await;

        registry
            .handlebars
            .register_partial(name, source)
            .map_err(|e| TemplateError::Compile {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        registry.partials.insert(name.to_string());

        debug!(partial = %name, "Partial registered");
        Ok(())
    }

    /// Check if a partial has been registered
    pub async fn has_partial(&self, name: &str) -> bool {
        self.registry.read().await.partials.contains(name)
    }

    /// List registered partial names
    pub async fn partial_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().await.partials.iter().cloned().collect();
        names.sort();
        names
    }

    /// Render a compiled page template against `data`
    pub async fn render(&self, template: &CompiledTemplate, data: &Value) -> Result<String, TemplateError> {
        let registry = self.registry.read().await;
        template.render_with(&registry.handlebars, data)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_render_with_fields() {
        let engine = TemplateEngine::new();
        let template = CompiledTemplate::compile("welcome", "<h1>Welcome, {{name}}!</h1>").unwrap();

        let html = engine
            .render(&template, &json!({ "name": "Ada" }))
            .await
            .unwrap();

        assert_eq!(html, "<h1>Welcome, Ada!</h1>");
    }

    #[tokio::test]
    async fn test_render_escapes_html_and_tolerates_missing_fields() {
        let engine = TemplateEngine::new();
        let template = CompiledTemplate::compile("t", "<p>{{note}}</p><p>{{missing}}</p>").unwrap();

        let html = engine
            .render(&template, &json!({ "note": "<b>hi</b>" }))
            .await
            .unwrap();

        assert_eq!(html, "<p>&lt;b&gt;hi&lt;/b&gt;</p><p></p>");
    }

    #[tokio::test]
    async fn test_render_with_partial() {
        let engine = TemplateEngine::new();
        engine
            .register_partial("footer", "<footer>{{company}}</footer>")
            .await
            .unwrap();

        let template = CompiledTemplate::compile("t", "<main>{{body}}</main>{{> footer}}").unwrap();
        let html = engine
            .render(&template, &json!({ "body": "Hi", "company": "Acme" }))
            .await
            .unwrap();

        assert_eq!(html, "<main>Hi</main><footer>Acme</footer>");
        assert!(engine.has_partial("footer").await);
    }

    #[tokio::test]
    async fn test_partial_overwrite() {
        let engine = TemplateEngine::new();
        engine.register_partial("sig", "first").await.unwrap();
        engine.register_partial("sig", "second").await.unwrap();

        let template = CompiledTemplate::compile("t", "{{> sig}}").unwrap();
        let html = engine.render(&template, &json!({})).await.unwrap();

        assert_eq!(html, "second");
        assert_eq!(engine.partial_names().await, vec!["sig".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_partial_is_render_error() {
        let engine = TemplateEngine::new();
        let template = CompiledTemplate::compile("t", "{{> nowhere}}").unwrap();

        let err = engine.render(&template, &json!({})).await.unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn test_compile_error() {
        let err = CompiledTemplate::compile("broken", "{{#if x}}unclosed").unwrap_err();
        match err {
            TemplateError::Compile { name, .. } => assert_eq!(name, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

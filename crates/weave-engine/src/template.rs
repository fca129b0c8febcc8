//! Template and script engines.

use std::collections::HashMap;
use std::error::Error as _;

use async_trait::async_trait;
use serde_json::Value;
use tera::Tera;
use weave_config::Config;
use weave_core::{Context, RenderError};

/// Renders template source with a context.
///
/// `config` carries the rendering fields (`filters`, `options`) of the
/// renderer being called.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn render(&self, source: &str, context: &Context, config: &Config) -> Result<String, RenderError>;
}

/// Runs script source with a context and returns its JSON result.
///
/// No script language ships with weave; renderers that run scripts are built
/// with an engine supplied by the caller.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    async fn run(&self, source: &str, context: &Context) -> Result<Value, RenderError>;
}

const INLINE_TEMPLATE: &str = "__weave_inline__";

/// Jinja2-style templates (`Hello {{ name }}`) rendered with Tera.
///
/// Registered `filters` are available inside templates, and
/// `options.autoescape` HTML-escapes every interpolated value.
///
/// ```rust
/// use weave_config::Config;
/// use weave_engine::{TemplateEngine, TeraEngine};
///
/// let mut context = serde_json::Map::new();
/// context.insert("name".into(), "World".into());
///
/// let out = futures::executor::block_on(
///     TeraEngine.render("Hello {{ name }}", &context, &Config::default()),
/// ).unwrap();
/// assert_eq!(out, "Hello World");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraEngine;

impl TeraEngine {
    fn render_sync(source: &str, context: &Context, config: &Config) -> Result<String, tera::Error> {
        let mut tera = Tera::default();

        let autoescape = config.options.as_ref().is_some_and(|o| o.autoescape);
        tera.autoescape_on(if autoescape { vec![INLINE_TEMPLATE] } else { vec![] });

        for (name, filter) in config.filters.iter().flatten() {
            let filter = filter.clone();
            tera.register_filter(name, move |value: &Value, args: &HashMap<String, Value>| {
                filter(value, args).map_err(tera::Error::msg)
            });
        }

        tera.add_raw_template(INLINE_TEMPLATE, source)?;
        let context = tera::Context::from_value(Value::Object(context.clone()))?;
        tera.render(INLINE_TEMPLATE, &context)
    }
}

/// Flattens Tera's error chain, whose top level only says which template failed.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl TemplateEngine for TeraEngine {
    async fn render(&self, source: &str, context: &Context, config: &Config) -> Result<String, RenderError> {
        Self::render_sync(source, context, config).map_err(|e| RenderError::Template(describe(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weave_config::TemplateOptions;

    fn context(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn renders_variables_and_loops() {
        let out = TeraEngine
            .render(
                "{% for n in items %}{{ n }},{% endfor %} {{ who }}",
                &context(json!({ "items": [1, 2], "who": "done" })),
                &Config::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, "1,2, done");
    }

    #[tokio::test]
    async fn applies_registered_filters() {
        let config = Config::builder()
            .filter("shout", |v, _| {
                let s = v.as_str().ok_or("shout expects a string")?;
                Ok(json!(s.to_uppercase()))
            })
            .build();
        let out = TeraEngine
            .render("{{ name | shout }}", &context(json!({ "name": "ada" })), &config)
            .await
            .unwrap();
        assert_eq!(out, "ADA");
    }

    #[tokio::test]
    async fn autoescape_is_opt_in() {
        let ctx = context(json!({ "html": "<b>" }));
        let plain = TeraEngine.render("{{ html }}", &ctx, &Config::default()).await.unwrap();
        assert_eq!(plain, "<b>");

        let escaping = Config::builder().options(TemplateOptions { autoescape: true }).build();
        let escaped = TeraEngine.render("{{ html }}", &ctx, &escaping).await.unwrap();
        assert_eq!(escaped, "&lt;b&gt;");
    }

    #[tokio::test]
    async fn undefined_variables_are_template_errors() {
        let err = TeraEngine
            .render("Hello {{ name }}", &Context::new(), &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Template(ref m) if m.contains("name")));
    }
}

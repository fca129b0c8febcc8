//! Turning a template, script or function source into content.
//!
//! A [`PromptRenderer`] is built once per renderer, bound to a source and to
//! the rendering fields of the configuration (`context`, `filters`,
//! `options`, `loader`, `input_schema`, `debug`). It serves both Template
//! and Script renderers directly and LLM renderers whose prompt must be
//! rendered before the model is called.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use weave_config::{load_source, Config, ConfigError, PromptFn, PromptKind, PromptSource, PromptType, PromptValue};
use weave_core::{Context, Message, RenderError};

use crate::template::{ScriptEngine, TemplateEngine};

/// What a source produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Template output, or a script or function that returned a string.
    Text(String),
    /// A function or script that returned a message list.
    Messages(Vec<Message>),
    /// Any other script result.
    Value(Value),
}

enum Source {
    Template { engine: Arc<dyn TemplateEngine>, source: Option<String> },
    Script { engine: Arc<dyn ScriptEngine>, source: Option<String> },
    Function(PromptFn),
}

/// A sub-renderer bound to one source.
pub struct PromptRenderer {
    config: Config,
    prompt_type: PromptType,
    source: Source,
}

impl std::fmt::Debug for PromptRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRenderer")
            .field("prompt_type", &self.prompt_type.to_string())
            .field("config", &self.config)
            .finish()
    }
}

impl PromptRenderer {
    /// Binds a source of `prompt_type` to the rendering fields of `config`.
    ///
    /// `source` is inline source text, a loader name when `prompt_type` loads
    /// by name, or a prompt function.
    pub fn new(
        config: &Config,
        prompt_type: PromptType,
        source: Option<PromptSource>,
        template_engine: Arc<dyn TemplateEngine>,
        script_engine: Option<Arc<dyn ScriptEngine>>,
    ) -> Result<Self, ConfigError> {
        let text = |source: Option<PromptSource>| match source {
            None => Ok(None),
            Some(PromptSource::Text(text)) => Ok(Some(text)),
            Some(other) => Err(ConfigError::Invalid(format!(
                "A '{}' prompt type needs source text, got {:?}.",
                prompt_type, other
            ))),
        };

        let source = match prompt_type.kind {
            PromptKind::Template | PromptKind::AsyncTemplate => Source::Template {
                engine: template_engine,
                source: text(source)?,
            },
            PromptKind::Script | PromptKind::AsyncScript => Source::Script {
                engine: script_engine
                    .ok_or_else(|| ConfigError::Invalid("A script renderer needs a script engine.".into()))?,
                source: text(source)?,
            },
            PromptKind::Function => match source {
                Some(PromptSource::Function(f)) => Source::Function(f),
                _ => {
                    return Err(ConfigError::MissingField {
                        field: "prompt",
                        reason: "as a function for the 'function' prompt type".into(),
                    })
                }
            },
            PromptKind::Text => {
                return Err(ConfigError::InvalidPromptType(format!(
                    "'{}' is not rendered",
                    prompt_type
                )))
            }
        };

        Ok(Self {
            config: config.rendering_subset(),
            prompt_type,
            source,
        })
    }

    pub fn prompt_type(&self) -> PromptType {
        self.prompt_type
    }

    /// The configured context with `overrides` applied on top.
    fn merged_context(&self, overrides: Option<Context>) -> Context {
        let mut context = self.config.context.clone().unwrap_or_default();
        context.extend(overrides.unwrap_or_default());
        context
    }

    async fn resolve_source(&self, configured: &Option<String>, source_override: Option<&str>) -> Result<String, RenderError> {
        let source = source_override
            .map(str::to_string)
            .or_else(|| configured.clone())
            .ok_or_else(|| RenderError::arguments("No source to render"))?;

        if !self.prompt_type.by_name {
            return Ok(source);
        }
        let loaders = self.config.loader.as_deref().unwrap_or_default();
        load_source(loaders, &source).await
    }

    /// Renders the source with the configured context merged with `context`.
    ///
    /// `source_override` replaces the bound source (or name) for this call;
    /// it is ignored by function sources. The merged context is checked
    /// against `input_schema` before the engine runs.
    pub async fn render(&self, source_override: Option<&str>, context: Option<Context>) -> Result<Rendered, RenderError> {
        let context = self.merged_context(context);

        if let Some(schema) = &self.config.input_schema {
            schema
                .safe_parse(&Value::Object(context.clone()))
                .map_err(|e| RenderError::InputValidation(e.to_string()))?;
        }

        if self.config.is_debug() {
            info!(prompt_type = %self.prompt_type, keys = ?context.keys().collect::<Vec<_>>(), "Rendering prompt source");
        }

        let rendered = match &self.source {
            Source::Template { engine, source } => {
                let source = self.resolve_source(source, source_override).await?;
                Rendered::Text(engine.render(&source, &context, &self.config).await?)
            }
            Source::Script { engine, source } => {
                let source = self.resolve_source(source, source_override).await?;
                match engine.run(&source, &context).await? {
                    Value::String(text) => Rendered::Text(text),
                    other => Rendered::Value(other),
                }
            }
            Source::Function(f) => match f(context).await.map_err(|e| RenderError::Function(e.to_string()))? {
                PromptValue::Text(text) => Rendered::Text(text),
                PromptValue::Messages(messages) => Rendered::Messages(messages),
            },
        };

        debug!(prompt_type = %self.prompt_type, "Rendered prompt source");
        Ok(rendered)
    }

    /// Renders a source used as an LLM prompt.
    ///
    /// The result must be text or a message list; a script returning any
    /// other value is an error.
    pub async fn render_prompt(&self, source_override: Option<&str>, context: Option<Context>) -> Result<Rendered, RenderError> {
        match self.render(source_override, context).await? {
            Rendered::Value(value) => match serde_json::from_value::<Vec<Message>>(value) {
                Ok(messages) => Ok(Rendered::Messages(messages)),
                Err(_) => Err(RenderError::Script(
                    "A script used as a prompt must return a string or a message list".into(),
                )),
            },
            rendered => Ok(rendered),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TeraEngine;
    use async_trait::async_trait;
    use serde_json::json;
    use weave_config::{JsonSchema, MemoryLoader};

    /// Returns the context value named by the script source.
    struct LookupEngine;

    #[async_trait]
    impl ScriptEngine for LookupEngine {
        async fn run(&self, source: &str, context: &Context) -> Result<Value, RenderError> {
            context
                .get(source.trim())
                .cloned()
                .ok_or_else(|| RenderError::Script(format!("unknown variable '{}'", source)))
        }
    }

    fn tera() -> Arc<dyn TemplateEngine> {
        Arc::new(TeraEngine)
    }

    fn ctx(value: Value) -> Option<Context> {
        value.as_object().cloned()
    }

    #[tokio::test]
    async fn call_context_overrides_configured_context() {
        let config = Config::builder().var("name", "config").var("greeting", "Hi").build();
        let renderer = PromptRenderer::new(
            &config,
            PromptType::TEMPLATE,
            Some("{{ greeting }} {{ name }}".into()),
            tera(),
            None,
        )
        .unwrap();

        let out = renderer.render(None, ctx(json!({ "name": "call" }))).await.unwrap();
        assert_eq!(out, Rendered::Text("Hi call".into()));
    }

    #[tokio::test]
    async fn source_override_replaces_bound_source() {
        let renderer =
            PromptRenderer::new(&Config::default(), PromptType::TEMPLATE, Some("bound".into()), tera(), None)
                .unwrap();
        let out = renderer.render(Some("over{{ x }}"), ctx(json!({ "x": 1 }))).await.unwrap();
        assert_eq!(out, Rendered::Text("over1".into()));
    }

    #[tokio::test]
    async fn named_sources_go_through_the_loader() {
        let config = Config::builder()
            .loader(Arc::new(MemoryLoader::new().with("greet", "Hello {{ name }}")))
            .build();
        let renderer =
            PromptRenderer::new(&config, PromptType::TEMPLATE.named(), Some("greet".into()), tera(), None)
                .unwrap();

        let out = renderer.render(None, ctx(json!({ "name": "World" }))).await.unwrap();
        assert_eq!(out, Rendered::Text("Hello World".into()));

        let missing = renderer.render(Some("nope"), None).await.unwrap_err();
        assert!(matches!(missing, RenderError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn input_schema_runs_before_the_engine() {
        let config = Config::builder()
            .input_schema(Arc::new(
                JsonSchema::new(json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"]
                }))
                .unwrap(),
            ))
            .build();
        let renderer = PromptRenderer::new(
            &config,
            PromptType::SCRIPT,
            Some("name".into()),
            tera(),
            Some(Arc::new(LookupEngine)),
        )
        .unwrap();

        let err = renderer.render(None, None).await.unwrap_err();
        assert!(matches!(err, RenderError::InputValidation(_)));
    }

    #[tokio::test]
    async fn script_prompts_must_be_text_or_messages() {
        let renderer = PromptRenderer::new(
            &Config::default(),
            PromptType::SCRIPT,
            Some("value".into()),
            tera(),
            Some(Arc::new(LookupEngine)),
        )
        .unwrap();

        let messages = renderer
            .render_prompt(None, ctx(json!({ "value": [{ "role": "user", "content": "hi" }] })))
            .await
            .unwrap();
        assert_eq!(messages, Rendered::Messages(vec![Message::user("hi")]));

        let err = renderer.render_prompt(None, ctx(json!({ "value": 42 }))).await.unwrap_err();
        assert!(matches!(err, RenderError::Script(_)));
    }

    #[tokio::test]
    async fn function_sources_receive_the_context() {
        let config = Config::builder()
            .prompt_fn(|ctx| async move {
                let topic = ctx.get("topic").and_then(Value::as_str).unwrap_or("nothing").to_string();
                Ok(PromptValue::Messages(vec![Message::user(format!("Tell me about {}", topic))]))
            })
            .build();
        let renderer =
            PromptRenderer::new(&config, PromptType::FUNCTION, config.prompt.clone(), tera(), None).unwrap();

        let out = renderer.render(None, ctx(json!({ "topic": "tides" }))).await.unwrap();
        assert_eq!(out, Rendered::Messages(vec![Message::user("Tell me about tides")]));
    }

    #[test]
    fn script_sources_need_an_engine() {
        let err = PromptRenderer::new(&Config::default(), PromptType::SCRIPT, Some("x".into()), tera(), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

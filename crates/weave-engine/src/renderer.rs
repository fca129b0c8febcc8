//! Building renderers and dispatching their calls.
//!
//! Every renderer is produced by the same pipeline, parameterized by a
//! [`RendererSpec`]:
//!
//! 1. merge the child configuration over the optional parent
//! 2. fix `prompt_type` for the renderer kind
//! 3. apply kind defaults
//! 4. validate against the kind and [`Mode`]
//! 5. bind a [`PromptRenderer`] when a source must be rendered
//!
//! A call then runs argument resolution, rendering, request assembly, the
//! primitive and result augmentation, strictly in that order.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, info};
use weave_config::{
    apply_defaults, load_source, merge, validate, Config, ConfigError, ConfigKind, Mode, PromptKind,
    PromptSource, PromptType,
};
use weave_core::{Context, Message, RenderError};

use crate::arguments::{extract_call_arguments, CallArguments, IntoCallArgs};
use crate::augment::{augment_result, augment_stream, AugmentedResponse, AugmentedStreamResponse};
use crate::generate::{
    generate_object, generate_text, stream_object, stream_text, ObjectResult, ObjectStreamResult, PromptInput,
    TextResult, TextStreamResult,
};
use crate::prompt::{PromptRenderer, Rendered};
use crate::template::{ScriptEngine, TemplateEngine, TeraEngine};

/// The primitive behind a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererType {
    GenerateText,
    StreamText,
    GenerateObject,
    StreamObject,
    Template,
    Script,
    FunctionCall,
}

impl std::fmt::Display for RendererType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GenerateText => "GenerateText",
            Self::StreamText => "StreamText",
            Self::GenerateObject => "GenerateObject",
            Self::StreamObject => "StreamObject",
            Self::Template => "Template",
            Self::Script => "Script",
            Self::FunctionCall => "FunctionCall",
        };
        write!(f, "{}", s)
    }
}

/// What a renderer call returned.
#[derive(Debug)]
pub enum RenderOutput {
    Text(TextResult<AugmentedResponse>),
    TextStream(TextStreamResult<AugmentedStreamResponse>),
    Object(ObjectResult),
    ObjectStream(ObjectStreamResult),
    /// Template output.
    Rendered(String),
    /// Script or function result.
    Value(Value),
}

impl RenderOutput {
    pub fn into_text(self) -> Option<TextResult<AugmentedResponse>> {
        match self {
            RenderOutput::Text(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_text_stream(self) -> Option<TextStreamResult<AugmentedStreamResponse>> {
        match self {
            RenderOutput::TextStream(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectResult> {
        match self {
            RenderOutput::Object(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_object_stream(self) -> Option<ObjectStreamResult> {
        match self {
            RenderOutput::ObjectStream(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_rendered(self) -> Option<String> {
        match self {
            RenderOutput::Rendered(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            RenderOutput::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Collapses any output into text, draining streams to the end.
    ///
    /// Objects and non-string values are serialized as JSON.
    pub async fn into_string(self) -> Result<String, RenderError> {
        match self {
            RenderOutput::Text(result) => Ok(result.text),
            RenderOutput::TextStream(mut result) => {
                let mut text = String::new();
                while let Some(delta) = result.text_stream.next().await {
                    text.push_str(&delta?);
                }
                Ok(text)
            }
            RenderOutput::Object(result) => Ok(result.object.to_string()),
            RenderOutput::ObjectStream(mut result) => {
                while let Some(delta) = result.text_stream.next().await {
                    delta?;
                }
                Ok(result.object.wait().await?.object.to_string())
            }
            RenderOutput::Rendered(text) | RenderOutput::Value(Value::String(text)) => Ok(text),
            RenderOutput::Value(value) => Ok(value.to_string()),
        }
    }
}

/// Parameters of the build pipeline: which renderer to produce and how its
/// prompt is sourced.
///
/// ```rust
/// use weave_config::{Config, MemoryLoader};
/// use weave_engine::RendererSpec;
/// use std::sync::Arc;
///
/// let config = Config::builder()
///     .loader(Arc::new(MemoryLoader::new().with("greet", "Hello {{ name }}")))
///     .template("greet")
///     .build();
///
/// let renderer = RendererSpec::template().loads_by_name().build(config, None).unwrap();
/// assert_eq!(renderer.prompt_type().map(|t| t.to_string()).as_deref(), Some("async-template-name"));
/// ```
#[derive(Clone)]
pub struct RendererSpec {
    kind: ConfigKind,
    renderer_type: RendererType,
    prompt_kind: PromptKind,
    by_name: bool,
    is_tool: bool,
    template_engine: Arc<dyn TemplateEngine>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
}

impl RendererSpec {
    fn new(kind: ConfigKind, renderer_type: RendererType, prompt_kind: PromptKind) -> Self {
        Self {
            kind,
            renderer_type,
            prompt_kind,
            by_name: false,
            is_tool: false,
            template_engine: Arc::new(TeraEngine),
            script_engine: None,
        }
    }

    pub fn text_generator() -> Self {
        Self::new(ConfigKind::Text, RendererType::GenerateText, PromptKind::Text)
    }

    pub fn text_streamer() -> Self {
        Self::new(ConfigKind::Text, RendererType::StreamText, PromptKind::Text)
    }

    pub fn object_generator() -> Self {
        Self::new(ConfigKind::Object, RendererType::GenerateObject, PromptKind::Text)
    }

    pub fn object_streamer() -> Self {
        Self::new(ConfigKind::Object, RendererType::StreamObject, PromptKind::Text)
    }

    pub fn template() -> Self {
        Self::new(ConfigKind::Template, RendererType::Template, PromptKind::AsyncTemplate)
    }

    pub fn script(engine: Arc<dyn ScriptEngine>) -> Self {
        Self::new(ConfigKind::Script, RendererType::Script, PromptKind::AsyncScript).script_engine(engine)
    }

    pub fn function() -> Self {
        Self::new(ConfigKind::Function, RendererType::FunctionCall, PromptKind::Function)
    }

    /// The LLM prompt is template source.
    pub fn with_template(mut self) -> Self {
        self.prompt_kind = PromptKind::AsyncTemplate;
        self
    }

    /// The LLM prompt is script source run by `engine`.
    pub fn with_script(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.prompt_kind = PromptKind::AsyncScript;
        self.script_engine(engine)
    }

    /// The LLM prompt is a function of the call context.
    pub fn with_function(mut self) -> Self {
        self.prompt_kind = PromptKind::Function;
        self
    }

    /// Sources are names resolved through the `loader`.
    pub fn loads_by_name(mut self) -> Self {
        self.by_name = true;
        self
    }

    /// The renderer will be exposed as a tool; `input_schema` becomes required.
    pub fn as_tool(mut self) -> Self {
        self.is_tool = true;
        self
    }

    pub fn template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.template_engine = engine;
        self
    }

    pub fn script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    pub fn mode(&self) -> Mode {
        Mode {
            is_tool: self.is_tool,
            loaded_by_name: self.by_name,
            streamer: matches!(self.renderer_type, RendererType::StreamText | RendererType::StreamObject),
        }
    }

    /// The prompt type the built configuration carries. Function renderers
    /// have none: they take no prompt.
    pub fn prompt_type(&self) -> Option<PromptType> {
        match self.kind {
            ConfigKind::Function => None,
            _ => Some(PromptType {
                kind: self.prompt_kind,
                by_name: self.by_name,
            }),
        }
    }

    /// Runs the build pipeline.
    ///
    /// Fails with the first [`ConfigError`]; a renderer is never returned for
    /// an invalid configuration.
    pub fn build(&self, config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        let mut config = match parent {
            Some(parent) => merge(parent, &config),
            None => config,
        };
        let prompt_type = self.prompt_type();
        config.prompt_type = prompt_type;
        apply_defaults(&mut config, self.kind);

        let mode = self.mode();
        validate(&config, self.kind, mode)?;

        let prompt_renderer = match prompt_type {
            Some(prompt_type) if prompt_type.is_rendered() => Some(PromptRenderer::new(
                &config,
                prompt_type,
                self.bound_source(&config),
                self.template_engine.clone(),
                self.script_engine.clone(),
            )?),
            _ => None,
        };

        debug!(renderer = %self.renderer_type, kind = %self.kind, ?prompt_type, "Built renderer");

        Ok(Renderer {
            inner: Arc::new(Inner {
                config,
                kind: self.kind,
                renderer_type: self.renderer_type,
                mode,
                prompt_renderer,
            }),
        })
    }

    fn bound_source(&self, config: &Config) -> Option<PromptSource> {
        let own = match self.kind {
            ConfigKind::Template => config.template.clone(),
            ConfigKind::Script => config.script.clone(),
            _ => None,
        };
        own.map(PromptSource::Text).or_else(|| config.prompt.clone())
    }
}

impl std::fmt::Debug for RendererSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSpec")
            .field("renderer_type", &self.renderer_type)
            .field("prompt_type", &self.prompt_type().map(|t| t.to_string()))
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

struct Inner {
    config: Config,
    kind: ConfigKind,
    renderer_type: RendererType,
    mode: Mode,
    prompt_renderer: Option<PromptRenderer>,
}

/// A built, immutable renderer. Cloning shares the configuration.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("type", &self.inner.renderer_type)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// The request content of one LLM call and the prefixes its result is
/// augmented with.
struct Assembled {
    input: PromptInput,
    messages_prefix: Vec<Message>,
    history_prefix: Vec<Message>,
}

impl Assembled {
    /// Folds `prompt` into `base` when `base` is non-empty; otherwise sends
    /// it bare.
    fn fold(mut base: Vec<Message>, derived: Derived, history_prefix: Vec<Message>) -> Self {
        let (input, messages_prefix) = match derived {
            Derived::Prompt(prompt) => {
                let message = Message::user(prompt.clone());
                if base.is_empty() {
                    (PromptInput::Prompt(prompt), vec![message])
                } else {
                    base.push(message.clone());
                    (PromptInput::Messages(base), vec![message])
                }
            }
            Derived::Messages(messages) => {
                base.extend(messages.iter().cloned());
                (PromptInput::Messages(base), messages)
            }
            Derived::Nothing => (PromptInput::Messages(base), Vec::new()),
        };
        Self { input, messages_prefix, history_prefix }
    }
}

/// Content derived from the prompt in one call.
enum Derived {
    Prompt(String),
    Messages(Vec<Message>),
    Nothing,
}

impl Renderer {
    /// The effective configuration: merged, defaulted and validated.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn kind(&self) -> ConfigKind {
        self.inner.kind
    }

    pub fn renderer_type(&self) -> RendererType {
        self.inner.renderer_type
    }

    pub fn prompt_type(&self) -> Option<PromptType> {
        self.inner.config.prompt_type
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    /// Calls the renderer with up to three positional arguments.
    ///
    /// ```rust,ignore
    /// renderer.call("Summarize this").await?;
    /// renderer.call((vec![Message::user("hi")], context)).await?;
    /// renderer.call(context).await?;
    /// ```
    pub async fn call(&self, args: impl IntoCallArgs) -> Result<RenderOutput, RenderError> {
        let [arg1, arg2, arg3] = args.into_call_args();
        let args = extract_call_arguments(arg1, arg2, arg3)?;
        let config = &self.inner.config;

        debug!(renderer = %self.inner.renderer_type, "Calling renderer");
        if config.is_debug() {
            info!(
                renderer = %self.inner.renderer_type,
                prompt = args.prompt.is_some(),
                messages = args.messages.as_ref().map_or(0, Vec::len),
                context_keys = ?args.context.as_ref().map(|c| c.keys().collect::<Vec<_>>()),
                "Resolved call arguments"
            );
        }

        match self.inner.kind {
            ConfigKind::Text | ConfigKind::Object => self.call_model(args).await,
            ConfigKind::Template | ConfigKind::Script => self.call_source(args).await,
            ConfigKind::Function => self.call_function(args).await,
        }
    }

    fn static_messages(&self) -> Vec<Message> {
        self.inner.config.messages.clone().unwrap_or_default()
    }

    async fn assemble_text(&self, args: CallArguments) -> Result<Assembled, RenderError> {
        let config = &self.inner.config;
        if args.context.is_some() {
            return Err(RenderError::arguments(
                "A context cannot be passed to a renderer whose prompt is plain text",
            ));
        }

        let configured = match &config.prompt {
            Some(PromptSource::Text(text)) => Some(text.clone()),
            _ => None,
        };
        let mut prompt = args.prompt.or(configured);
        if self.prompt_type().is_some_and(|t| t.by_name) {
            if let Some(name) = prompt.take() {
                let loaders = config.loader.as_deref().unwrap_or_default();
                prompt = Some(load_source(loaders, &name).await?);
            }
        }

        let mut base = self.static_messages();
        if let Some(PromptSource::Messages(messages)) = &config.prompt {
            base.extend(messages.iter().cloned());
        }
        let history_prefix = args.messages.unwrap_or_default();
        base.extend(history_prefix.iter().cloned());

        let derived = match prompt {
            Some(prompt) => Derived::Prompt(prompt),
            None if base.is_empty() => {
                return Err(RenderError::arguments("Either a prompt or messages must be provided"));
            }
            None => Derived::Nothing,
        };
        Ok(Assembled::fold(base, derived, history_prefix))
    }

    async fn assemble_rendered(&self, renderer: &PromptRenderer, args: CallArguments) -> Result<Assembled, RenderError> {
        let rendered = renderer.render_prompt(args.prompt.as_deref(), args.context).await?;

        let mut base = self.static_messages();
        let history_prefix = args.messages.unwrap_or_default();
        base.extend(history_prefix.iter().cloned());

        let derived = match rendered {
            Rendered::Text(text) => Derived::Prompt(text),
            Rendered::Messages(messages) => Derived::Messages(messages),
            Rendered::Value(_) => {
                return Err(RenderError::Script("A prompt source must produce text or messages".into()));
            }
        };
        Ok(Assembled::fold(base, derived, history_prefix))
    }

    async fn call_model(&self, args: CallArguments) -> Result<RenderOutput, RenderError> {
        let config = &self.inner.config;
        let assembled = match &self.inner.prompt_renderer {
            Some(renderer) => self.assemble_rendered(renderer, args).await?,
            None => self.assemble_text(args).await?,
        };

        if config.is_debug() {
            let count = match &assembled.input {
                PromptInput::Prompt(_) => 1,
                PromptInput::Messages(messages) => messages.len(),
            };
            info!(renderer = %self.inner.renderer_type, messages = count, "Assembled request");
        }

        let Assembled { input, messages_prefix, history_prefix } = assembled;
        let output = match self.inner.renderer_type {
            RendererType::GenerateText => {
                let result = generate_text(config, input).await?;
                RenderOutput::Text(augment_result(result, messages_prefix, history_prefix))
            }
            RendererType::StreamText => {
                let result = stream_text(config, input).await?;
                RenderOutput::TextStream(augment_stream(result, messages_prefix, history_prefix))
            }
            RendererType::GenerateObject => RenderOutput::Object(generate_object(config, input).await?),
            RendererType::StreamObject => RenderOutput::ObjectStream(stream_object(config, input).await?),
            other => return Err(RenderError::Llm(format!("{} does not call a model", other))),
        };
        Ok(output)
    }

    async fn call_source(&self, args: CallArguments) -> Result<RenderOutput, RenderError> {
        let renderer_type = self.inner.renderer_type;
        if args.messages.is_some() {
            return Err(RenderError::arguments(format!("A {} renderer does not accept messages", renderer_type)));
        }
        let renderer = self
            .inner
            .prompt_renderer
            .as_ref()
            .ok_or_else(|| RenderError::arguments(format!("{} renderer has no source", renderer_type)))?;

        let rendered = renderer.render(args.prompt.as_deref(), args.context).await?;

        match renderer_type {
            RendererType::Template => match rendered {
                Rendered::Text(text) => Ok(RenderOutput::Rendered(text)),
                other => Err(RenderError::Template(format!("unexpected template output {:?}", other))),
            },
            _ => {
                let value = match rendered {
                    Rendered::Text(text) => Value::String(text),
                    Rendered::Value(value) => value,
                    Rendered::Messages(messages) => serde_json::to_value(messages)?,
                };
                if let Some(schema) = &self.inner.config.schema {
                    schema
                        .safe_parse(&value)
                        .map_err(|e| RenderError::OutputValidation(e.to_string()))?;
                }
                Ok(RenderOutput::Value(value))
            }
        }
    }

    async fn call_function(&self, args: CallArguments) -> Result<RenderOutput, RenderError> {
        let config = &self.inner.config;
        if args.prompt.is_some() || args.messages.is_some() {
            return Err(RenderError::arguments("A function renderer only accepts a context"));
        }
        let execute = config
            .execute
            .clone()
            .ok_or_else(|| RenderError::Function("no 'execute' configured".into()))?;

        let mut context: Context = config.context.clone().unwrap_or_default();
        context.extend(args.context.unwrap_or_default());

        if let Some(schema) = &config.input_schema {
            schema
                .safe_parse(&Value::Object(context.clone()))
                .map_err(|e| RenderError::InputValidation(e.to_string()))?;
        }

        let value = execute(context).await.map_err(|e| RenderError::Function(e.to_string()))?;
        Ok(RenderOutput::Value(value))
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;

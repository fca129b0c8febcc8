//! The renderer configuration and its fluent builder.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_core::{Context, Message};
use weave_llm::{LanguageModel, ModelSettings};
use weave_tools::ToolRegistry;

use crate::kind::{ObjectMode, OutputKind, PromptType};
use crate::loader::Loader;
use crate::schema::Schema;

/// Error type returned by user-supplied functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A template filter: `(value, named args) -> value`.
pub type FilterFn =
    Arc<dyn Fn(&Value, &HashMap<String, Value>) -> Result<Value, String> + Send + Sync>;

/// Named template filters, keyed by the name used inside templates.
pub type Filters = BTreeMap<String, FilterFn>;

/// The body of a Function renderer.
pub type ExecuteFn = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// A function that produces a prompt from the call context.
pub type PromptFn =
    Arc<dyn Fn(Context) -> BoxFuture<'static, Result<PromptValue, BoxError>> + Send + Sync>;

/// A literal prompt: either text or a message list.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptValue {
    Text(String),
    Messages(Vec<Message>),
}

/// What the `prompt` field holds.
///
/// Whether a `Text` prompt is literal content, template source, script source
/// or a name for the loader is decided by the sibling `prompt_type`.
#[derive(Clone)]
pub enum PromptSource {
    Text(String),
    Messages(Vec<Message>),
    Function(PromptFn),
}

impl std::fmt::Debug for PromptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
            PromptSource::Messages(messages) => f.debug_tuple("Messages").field(messages).finish(),
            PromptSource::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<&str> for PromptSource {
    fn from(text: &str) -> Self {
        PromptSource::Text(text.to_string())
    }
}

impl From<String> for PromptSource {
    fn from(text: String) -> Self {
        PromptSource::Text(text)
    }
}

impl From<Vec<Message>> for PromptSource {
    fn from(messages: Vec<Message>) -> Self {
        PromptSource::Messages(messages)
    }
}

/// Template engine options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateOptions {
    /// HTML-escape interpolated values.
    #[serde(default)]
    pub autoescape: bool,
}

/// A partial renderer configuration.
///
/// Every field is optional: two configurations combine with
/// [`Config::merged_with`], and the result is checked against a renderer kind
/// by [`validate`](crate::validate). A built renderer owns its configuration
/// and never mutates it.
#[derive(Clone, Default)]
pub struct Config {
    /// Chat model; its presence marks an LLM-backed kind.
    pub model: Option<Arc<dyn LanguageModel>>,
    /// Body of a Function renderer.
    pub execute: Option<ExecuteFn>,
    /// Template source (or name, when loading by name).
    pub template: Option<String>,
    /// Script source (or name, when loading by name).
    pub script: Option<String>,
    pub prompt: Option<PromptSource>,
    /// Set by the renderer factory, never by callers.
    pub prompt_type: Option<PromptType>,
    /// Static conversation, always sent before anything produced at call time.
    pub messages: Option<Vec<Message>>,
    pub system: Option<String>,

    pub output: Option<OutputKind>,
    pub schema: Option<Arc<dyn Schema>>,
    /// Allowed values for `output: enum`.
    pub enum_values: Option<Vec<String>>,
    pub schema_name: Option<String>,
    pub schema_description: Option<String>,
    pub mode: Option<ObjectMode>,

    pub context: Option<Context>,
    pub filters: Option<Filters>,
    pub options: Option<TemplateOptions>,
    pub loader: Option<Vec<Arc<dyn Loader>>>,
    /// Validates the call-time context.
    pub input_schema: Option<Arc<dyn Schema>>,

    pub tools: Option<ToolRegistry>,
    /// Tool description, used when the renderer is exposed as a tool.
    pub description: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub seed: Option<i64>,
    pub stop_sequences: Option<Vec<String>>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    /// Maximum model calls in one tool loop.
    pub max_steps: Option<u32>,

    pub debug: Option<bool>,
}

impl Config {
    /// Creates a new builder for constructing a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns true when diagnostic tracing is enabled.
    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// Collects the sampling settings for the provider.
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            seed: self.seed,
            stop_sequences: self.stop_sequences.clone(),
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }

    /// The configuration handed to template/script sub-renderers.
    ///
    /// Only the rendering fields survive, so LLM-specific fields like `model`
    /// never reach the sub-renderer's own validation.
    pub fn rendering_subset(&self) -> Config {
        Config {
            context: self.context.clone(),
            filters: self.filters.clone(),
            options: self.options.clone(),
            loader: self.loader.clone(),
            input_schema: self.input_schema.clone(),
            debug: self.debug,
            ..Config::default()
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Config");
        if let Some(model) = &self.model {
            s.field("model", &model.model_id());
        }
        if self.execute.is_some() {
            s.field("execute", &"<fn>");
        }
        if let Some(template) = &self.template {
            s.field("template", template);
        }
        if let Some(script) = &self.script {
            s.field("script", script);
        }
        if let Some(prompt) = &self.prompt {
            s.field("prompt", prompt);
        }
        if let Some(prompt_type) = &self.prompt_type {
            s.field("prompt_type", &prompt_type.to_string());
        }
        if let Some(messages) = &self.messages {
            s.field("messages", messages);
        }
        if let Some(output) = &self.output {
            s.field("output", output);
        }
        if let Some(context) = &self.context {
            s.field("context", context);
        }
        if let Some(filters) = &self.filters {
            s.field("filters", &filters.keys().collect::<Vec<_>>());
        }
        if let Some(loader) = &self.loader {
            s.field("loader", &loader.len());
        }
        if let Some(tools) = &self.tools {
            s.field("tools", tools);
        }
        s.finish_non_exhaustive()
    }
}

// ============================================================================
// Builder API
// ============================================================================

/// Builder for constructing a [`Config`] programmatically.
///
/// Use [`Config::builder()`] to create a new builder.
///
/// ```rust
/// use weave_config::Config;
/// use weave_core::Message;
///
/// let config = Config::builder()
///     .template("Hello {{ name }}")
///     .var("name", "World")
///     .message(Message::system("You are terse."))
///     .build();
///
/// assert_eq!(config.template.as_deref(), Some("Hello {{ name }}"));
/// assert_eq!(config.messages.unwrap().len(), 1);
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the chat model.
    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.config.model = Some(model);
        self
    }

    /// Sets the body of a Function renderer.
    pub fn execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        let execute: ExecuteFn =
            Arc::new(move |ctx: Context| -> BoxFuture<'static, Result<Value, BoxError>> {
                Box::pin(f(ctx))
            });
        self.config.execute = Some(execute);
        self
    }

    pub fn template(mut self, source: impl Into<String>) -> Self {
        self.config.template = Some(source.into());
        self
    }

    pub fn script(mut self, source: impl Into<String>) -> Self {
        self.config.script = Some(source.into());
        self
    }

    /// Sets a text or message-list prompt.
    pub fn prompt(mut self, prompt: impl Into<PromptSource>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    /// Sets a prompt function, evaluated with the call context.
    pub fn prompt_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PromptValue, BoxError>> + Send + 'static,
    {
        let prompt: PromptFn =
            Arc::new(move |ctx: Context| -> BoxFuture<'static, Result<PromptValue, BoxError>> {
                Box::pin(f(ctx))
            });
        self.config.prompt = Some(PromptSource::Function(prompt));
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.config.messages = Some(messages);
        self
    }

    /// Appends one message to the static conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.config.messages.get_or_insert_with(Vec::new).push(message);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.config.system = Some(system.into());
        self
    }

    pub fn output(mut self, output: OutputKind) -> Self {
        self.config.output = Some(output);
        self
    }

    pub fn schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.config.schema = Some(schema);
        self
    }

    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.config.schema_name = Some(name.into());
        self
    }

    pub fn schema_description(mut self, description: impl Into<String>) -> Self {
        self.config.schema_description = Some(description.into());
        self
    }

    pub fn mode(mut self, mode: ObjectMode) -> Self {
        self.config.mode = Some(mode);
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.config.context = Some(context);
        self
    }

    /// Inserts a single context variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config
            .context
            .get_or_insert_with(Context::new)
            .insert(key.into(), value.into());
        self
    }

    /// Registers a template filter.
    pub fn filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &HashMap<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.config
            .filters
            .get_or_insert_with(Filters::new)
            .insert(name.into(), Arc::new(f));
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.config.options = Some(options);
        self
    }

    /// Appends a loader; loaders are tried in the order they were added.
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.config.loader.get_or_insert_with(Vec::new).push(loader);
        self
    }

    pub fn input_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.config.input_schema = Some(schema);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.config.tools = Some(tools);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = Some(top_p);
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn stop_sequences<I, S>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.stop_sequences = Some(stops.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.config.max_steps = Some(max_steps);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = Some(debug);
        self
    }

    /// Builds the final [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

//! # Weave — declarative renderers over LLMs and templates
//!
//! Weave builds callable "renderers" (text and object generators, streamers,
//! templates, scripts, functions) from partial configurations. A renderer is
//! built once by merging a child configuration over an optional parent and
//! validating the result; every call then resolves its positional arguments,
//! renders the prompt source and dispatches to the right primitive.
//!
//! ## Quick Start — Builder API
//!
//! ```rust,ignore
//! use weave::prelude::*;
//! use std::sync::Arc;
//!
//! let model: Arc<dyn LanguageModel> = Arc::new(OpenAiModel::new("gpt-4o-mini", None));
//!
//! // Shared settings, used as a parent by several renderers
//! let base = create::config(
//!     Config::builder().model(model).temperature(0.2).build(),
//!     None,
//! );
//!
//! let summarize = RendererSpec::text_generator()
//!     .with_template()
//!     .build(Config::builder().prompt("Summarize: {{ text }}").build(), Some(&base))?;
//!
//! let out = summarize.call(context).await?.into_text().unwrap();
//! ```
//!
//! ## Quick Start — Load from JSON
//!
//! ```rust,ignore
//! use weave::prelude::*;
//!
//! let presets = PresetRegistry::load_from_dir(Path::new("presets"))?;
//! let config = presets.config("greeting", &models)?;
//! let greeting = create::from_config(config)?;
//! ```
//!
//! ## Crate Structure
//!
//! | Crate | Description |
//! |-------|-------------|
//! | [`weave_config`] | Config, merge, validation, loaders, schemas, presets |
//! | [`weave_core`] | Messages, tool types, runtime errors |
//! | [`weave_engine`] | Build pipeline, call dispatch, LLM primitives |
//! | [`weave_llm`] | Provider trait, OpenAI-compatible client |
//! | [`weave_tools`] | Tool trait and registry |
//!
//! ## Renderer Kinds
//!
//! - `Text` — LLM text, plain or streamed
//! - `Object` — LLM JSON shaped by `output` and `schema`
//! - `Template` — Tera template output
//! - `Script` — Result of a caller-supplied script engine
//! - `Function` — Result of `execute`

// Re-export config types
pub use weave_config::{
    load_source, merge, validate, BoxError, Config, ConfigBuilder, ConfigDocument, ConfigError,
    ConfigKind, FileSystemLoader, HttpLoader, JsonSchema, Loader, LoaderSpec, MemoryLoader, Mode,
    ModelRegistry, ObjectMode, OutputKind, PresetRegistry, PromptKind, PromptSource, PromptType,
    PromptValue, RaceLoader, Schema, SchemaError, TemplateOptions,
};

// Re-export core types
pub use weave_core::{Context, FinishReason, Message, MessageRole, RenderError, Usage};

// Re-export engine
pub use weave_engine::{
    extract_call_arguments, AugmentedResponse, AugmentedStreamResponse, CallArg, CallArguments,
    IntoCallArgs, ObjectResult, ObjectStreamResult, RenderOutput, Renderer, RendererSpec,
    RendererTool, RendererType, ScriptEngine, TemplateEngine, TeraEngine, TextResult,
    TextStreamResult,
};

// Re-export LLM providers
pub use weave_llm::{
    ChatRequest, ChatResponse, LanguageModel, LlmStream, OpenAiModel, ScriptedModel, StreamChunk,
};

// Re-export tools
pub use weave_tools::{Tool, ToolCall, ToolError, ToolRegistry, ToolResult, ToolSchema};

/// Named entry points over [`RendererSpec`].
///
/// Each function fixes the [`RendererSpec`] parameters of one renderer and runs the
/// shared build pipeline; nothing here merges or validates on its own.
/// Prompt variants (`with_template`, `loads_by_name`, ...) are reached
/// through [`RendererSpec`] directly.
pub mod create {
    use std::sync::Arc;

    use weave_config::{merge, Config, ConfigError, ConfigKind, PromptKind};
    use weave_engine::{Renderer, RendererSpec, RendererTool, ScriptEngine};

    /// Merges `child` over `parent` without validating, for use as a shared
    /// parent of other renderers.
    pub fn config(child: Config, parent: Option<&Config>) -> Config {
        match parent {
            Some(parent) => merge(parent, &child),
            None => child,
        }
    }

    pub fn text_generator(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::text_generator().build(config, parent)
    }

    pub fn text_streamer(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::text_streamer().build(config, parent)
    }

    pub fn object_generator(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::object_generator().build(config, parent)
    }

    pub fn object_streamer(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::object_streamer().build(config, parent)
    }

    pub fn template(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::template().build(config, parent)
    }

    /// A template renderer whose `template` names a source in the `loader`.
    pub fn loads_template(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::template().loads_by_name().build(config, parent)
    }

    pub fn script(
        config: Config,
        parent: Option<&Config>,
        engine: Arc<dyn ScriptEngine>,
    ) -> Result<Renderer, ConfigError> {
        RendererSpec::script(engine).build(config, parent)
    }

    pub fn function(config: Config, parent: Option<&Config>) -> Result<Renderer, ConfigError> {
        RendererSpec::function().build(config, parent)
    }

    /// Builds `spec` as a tool and wraps it for a [`ToolRegistry`](weave_tools::ToolRegistry).
    pub fn tool(
        name: &str,
        spec: RendererSpec,
        config: Config,
        parent: Option<&Config>,
    ) -> Result<RendererTool, ConfigError> {
        RendererTool::new(name, spec.as_tool().build(config, parent)?)
    }

    /// Builds a generator for whatever kind `config` describes.
    ///
    /// The kind is inferred structurally (see [`ConfigKind::infer`]); a
    /// `prompt_type` left by an earlier build is honoured. Script sources
    /// need an engine and are built through [`RendererSpec`] instead.
    pub fn from_config(config: Config) -> Result<Renderer, ConfigError> {
        let kind = ConfigKind::infer(&config).ok_or_else(|| {
            ConfigError::Invalid("The configuration does not describe any renderer kind.".into())
        })?;

        let mut spec = match kind {
            ConfigKind::Text => RendererSpec::text_generator(),
            ConfigKind::Object => RendererSpec::object_generator(),
            ConfigKind::Template => RendererSpec::template(),
            ConfigKind::Function => RendererSpec::function(),
            ConfigKind::Script => {
                return Err(ConfigError::Invalid(
                    "A script renderer needs a script engine.".into(),
                ))
            }
        };

        if let Some(prompt_type) = config.prompt_type {
            spec = match prompt_type.kind {
                _ if !kind.requires_llm() => spec,
                PromptKind::Text => spec,
                PromptKind::Template | PromptKind::AsyncTemplate => spec.with_template(),
                PromptKind::Function => spec.with_function(),
                PromptKind::Script | PromptKind::AsyncScript => {
                    return Err(ConfigError::Invalid(
                        "A script renderer needs a script engine.".into(),
                    ))
                }
            };
            if prompt_type.by_name {
                spec = spec.loads_by_name();
            }
        }

        spec.build(config, None)
    }
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use weave::prelude::*;
/// ```
pub mod prelude {
    pub use crate::create;

    // Core types
    pub use crate::{Context, Message, MessageRole, RenderError};

    // Config types
    pub use crate::{Config, ConfigError, ConfigKind, OutputKind, PresetRegistry, PromptType};

    // Engine
    pub use crate::{RenderOutput, Renderer, RendererSpec, RendererTool};

    // LLM
    pub use crate::{LanguageModel, OpenAiModel, ScriptedModel};

    // Tools
    pub use crate::{Tool, ToolError, ToolRegistry};
}

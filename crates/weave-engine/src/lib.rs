//! Call dispatch for weave renderers.
//!
//! This crate turns a validated configuration into something callable:
//!
//! - [`RendererSpec`] — The one build pipeline (merge, validate, bind)
//! - [`Renderer`] — A built renderer; [`Renderer::call`] dispatches a call
//! - [`extract_call_arguments`] — Positional argument disambiguation
//! - [`PromptRenderer`] — Template, script and function sources
//! - [`generate_text`], [`stream_text`], [`generate_object`], [`stream_object`] — LLM primitives
//! - [`AugmentedResponse`] — Responses with their full conversation
//! - [`RendererTool`] — A renderer exposed to a model as a tool
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use weave_config::Config;
//! use weave_engine::RendererSpec;
//!
//! let summarize = RendererSpec::text_generator()
//!     .with_template()
//!     .build(
//!         Config::builder()
//!             .model(model)
//!             .prompt("Summarize in one line: {{ text }}")
//!             .build(),
//!         None,
//!     )?;
//!
//! let result = summarize.call(context).await?.into_text().unwrap();
//! println!("{}", result.text);
//! for message in result.response.message_history() {
//!     println!("{}: {}", message.role, message.content);
//! }
//! ```
//!
//! # Dispatch
//!
//! The `prompt_type` fixed at build time selects the call path:
//!
//! 1. **Text** (`text`, `text-name`) — the prompt and messages are sent as
//!    given; a context is rejected
//! 2. **Rendered** (template, script, function) — the context drives the
//!    prompt source, whose output is appended to the conversation
//!
//! Either way the request is `config.messages`, then call messages, then the
//! prompt-derived content.

mod arguments;
mod augment;
mod generate;
mod prompt;
mod renderer;
mod template;
mod tool;

pub use arguments::{extract_call_arguments, CallArg, CallArguments, IntoCallArgs};
pub use augment::{augment_result, augment_stream, AugmentedResponse, AugmentedStreamResponse};
pub use generate::{
    generate_object, generate_text, stream_object, stream_text, ObjectResult, ObjectStreamResult,
    PendingObject, PendingResponse, PromptInput, ResponseInfo, TextResult, TextStream, TextStreamResult,
};
pub use prompt::{PromptRenderer, Rendered};
pub use renderer::{RenderOutput, Renderer, RendererSpec, RendererType};
pub use template::{ScriptEngine, TemplateEngine, TeraEngine};
pub use tool::RendererTool;

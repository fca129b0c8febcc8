//! LLM provider abstractions for weave.
//!
//! This crate defines the low-level seam between weave and a chat model:
//!
//! - [`LanguageModel`] — Provider trait: one chat turn, plain or streamed
//! - [`OpenAiModel`] — OpenAI-compatible provider (also works with Ollama's `/v1`)
//! - [`ScriptedModel`] — Deterministic provider that replays queued replies
//!
//! Higher-level primitives (`generate_text`, `stream_text`, ...) live in
//! `weave-engine` and are built on top of [`LanguageModel::chat`] and
//! [`LanguageModel::chat_stream`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use weave_llm::{ChatRequest, LanguageModel, OpenAiModel};
//! use weave_core::Message;
//!
//! let model = OpenAiModel::new("gpt-4o-mini", None);
//! let request = ChatRequest::new(vec![Message::user("Hello!")]);
//! let response = model.chat(request).await?;
//! ```
//!
//! # Streaming
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use weave_llm::StreamChunk;
//!
//! let mut stream = model.chat_stream(request).await?;
//! while let Some(chunk) = stream.next().await {
//!     match chunk? {
//!         StreamChunk::Content(text) => print!("{}", text),
//!         StreamChunk::Usage { input_tokens, output_tokens } => {
//!             println!("\nTokens: {}/{}", input_tokens, output_tokens);
//!         }
//!     }
//! }
//! ```

mod client;
mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use weave_core::{FinishReason, Message, RenderError, ToolCall, ToolSchema, Usage};

pub use client::OpenAiModel;
pub use scripted::ScriptedModel;

/// A chunk from a streaming LLM response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Content(String),
    Usage { input_tokens: u32, output_tokens: u32 },
}

/// A stream of LLM response chunks.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, RenderError>> + Send>>;

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LlmMetrics {
    pub usage: Usage,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub metrics: LlmMetrics,
}

/// Response from an LLM that may include tool calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    Content(LlmResponse),
    ToolCalls { calls: Vec<ToolCall>, metrics: LlmMetrics },
}

impl ChatResponse {
    /// Token usage of this response.
    pub fn usage(&self) -> Usage {
        match self {
            ChatResponse::Content(resp) => resp.metrics.usage,
            ChatResponse::ToolCalls { metrics, .. } => metrics.usage,
        }
    }
}

/// Output format requested from the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The reply must be a single JSON object.
    Json,
}

/// Sampling settings forwarded to the provider.
///
/// Unset fields use the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub seed: Option<i64>,
    pub stop_sequences: Option<Vec<String>>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

/// One chat turn sent to a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// System prompt, sent ahead of `messages`.
    pub system: Option<String>,
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Tools the model may call.
    pub tools: Vec<ToolSchema>,
    pub settings: ModelSettings,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    /// Creates a request over the given messages with default settings.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

/// A chat model provider.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The provider's model identifier (e.g. `"gpt-4o-mini"`).
    fn model_id(&self) -> &str;

    /// Sends a chat request and returns content or tool calls.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RenderError>;

    /// Sends a chat request and returns a stream of chunks.
    async fn chat_stream(&self, request: ChatRequest) -> Result<LlmStream, RenderError>;
}

impl std::fmt::Debug for dyn LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModel")
            .field("model_id", &self.model_id())
            .finish()
    }
}

//! Core domain types and error definitions for weave.
//!
//! This crate provides the fundamental types shared across the weave crates:
//!
//! - [`RenderError`] — Error type for renderer invocations and LLM operations
//! - [`Message`] and [`MessageRole`] — Conversation message types
//! - [`Context`] — Key-value data handed to templates, scripts and functions
//! - [`ToolCall`], [`ToolResult`], [`ToolSchema`] — Tool interaction types
//! - [`Usage`] and [`FinishReason`] — Provider accounting
//!
//! # Example
//!
//! ```rust
//! use weave_core::{Message, MessageRole};
//!
//! let msg = Message::user("Hello!");
//! assert_eq!(msg.role, MessageRole::User);
//! assert!(msg.check().is_ok());
//! ```

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key-value data passed to template, script and function renderers.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while invoking a renderer.
///
/// Construction-time problems are reported separately by
/// `weave_config::ConfigError`; everything here happens after a renderer
/// has been built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Positional call arguments could not be resolved.
    #[error("{0}")]
    Arguments(String),

    /// The call context failed `input_schema` validation.
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    /// The produced value failed `schema` validation.
    #[error("Output validation failed: {0}")]
    OutputValidation(String),

    /// The template engine failed.
    #[error("Template rendering failed: {0}")]
    Template(String),

    /// The script engine failed or returned an unusable value.
    #[error("Script execution failed: {0}")]
    Script(String),

    /// A user-supplied function failed.
    #[error("Function call failed: {0}")]
    Function(String),

    /// A loader failed while resolving a named source.
    #[error("Loader error: {0}")]
    Loader(String),

    /// No loader could resolve the named source.
    #[error("Template not found: '{0}'")]
    TemplateNotFound(String),

    /// LLM API request failed.
    #[error("LLM request failed: {0}")]
    Llm(String),

    /// Failed to parse structured output from the LLM.
    #[error("Failed to parse structured output: {0}")]
    Parse(String),

    /// A tool requested by the model failed or does not exist.
    #[error("Tool error: {0}")]
    Tool(String),

    /// A streamed response ended before its final value was delivered.
    #[error("Stream closed before the response completed")]
    StreamClosed,
}

impl RenderError {
    /// Creates an argument-resolution error.
    pub fn arguments(message: impl Into<String>) -> Self {
        Self::Arguments(message.into())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Parse(err.to_string())
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model.
    System,
    /// Message from the user.
    User,
    /// Message from the assistant/LLM.
    Assistant,
    /// Result of a tool invocation.
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        };
        write!(f, "{}", s)
    }
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message. Required when deserializing, may be empty.
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call this tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Creates a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creates an assistant message that requests tool calls.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(MessageRole::Assistant, "")
        }
    }

    /// Creates a tool result message.
    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            tool_call_id: Some(result.tool_call_id),
            ..Self::new(MessageRole::Tool, result.content)
        }
    }

    /// Checks that the message is well formed.
    ///
    /// Empty content is allowed. Tool messages must name the call they
    /// answer, and only assistant messages may carry tool calls.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.role == MessageRole::Tool && self.tool_call_id.is_none() {
            return Err("tool message is missing 'tool_call_id'");
        }
        if self.role != MessageRole::Assistant && !self.tool_calls.is_empty() {
            return Err("only assistant messages may carry tool calls");
        }
        Ok(())
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool call requested by the LLM.
///
/// When an LLM decides to use a tool, it returns one or more `ToolCall`
/// instances with the tool name and arguments to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments to pass to the tool (JSON object).
    pub arguments: serde_json::Value,
}

/// Result of a tool execution to be sent back to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID from the original tool call request.
    pub tool_call_id: String,
    /// Output content from the tool execution.
    pub content: String,
}

/// JSON schema describing a tool for LLM function calling.
///
/// This follows the OpenAI function calling format and is used
/// to inform the LLM about available tools and their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique name of the tool.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

// ============================================================================
// Accounting
// ============================================================================

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

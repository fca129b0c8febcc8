//! LLM primitives: text and object generation, plain and streamed.
//!
//! Each primitive takes the effective configuration of a renderer and the
//! assembled [`PromptInput`], talks to the configured [`LanguageModel`] and
//! reports the messages it generated in [`ResponseInfo`].

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use weave_config::{Config, ObjectMode, OutputKind};
use weave_core::{FinishReason, Message, RenderError, ToolCall, ToolResult, ToolSchema, Usage};
use weave_llm::{ChatRequest, ChatResponse, LanguageModel, LlmStream, ResponseFormat, StreamChunk};

/// The conversation sent to a primitive: a bare prompt or a message list,
/// never both.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Prompt(String),
    Messages(Vec<Message>),
}

impl PromptInput {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            PromptInput::Prompt(prompt) => vec![Message::user(prompt)],
            PromptInput::Messages(messages) => messages,
        }
    }
}

/// What the provider reported about one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseInfo {
    pub model_id: String,
    /// Messages generated by this call only, in order.
    pub messages: Vec<Message>,
    /// Token usage summed over every model call.
    pub usage: Usage,
}

/// Text deltas of a streamed response.
pub type TextStream = BoxStream<'static, Result<String, RenderError>>;

/// Result of [`generate_text`].
#[derive(Debug)]
pub struct TextResult<R = ResponseInfo> {
    pub text: String,
    pub finish_reason: FinishReason,
    /// Tool calls of the last step, when it ended asking for tools.
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    /// Model calls made.
    pub steps: u32,
    pub response: R,
}

impl<R> TextResult<R> {
    pub fn map_response<S>(self, f: impl FnOnce(R) -> S) -> TextResult<S> {
        TextResult {
            text: self.text,
            finish_reason: self.finish_reason,
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
            steps: self.steps,
            response: f(self.response),
        }
    }
}

/// The response of a stream, available once the stream is exhausted.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Result<ResponseInfo, RenderError>>,
}

impl PendingResponse {
    /// Waits for the stream to finish. Dropping the stream first yields
    /// [`RenderError::StreamClosed`].
    pub async fn wait(self) -> Result<ResponseInfo, RenderError> {
        self.rx.await.map_err(|_| RenderError::StreamClosed)?
    }

    pub(crate) fn into_receiver(self) -> oneshot::Receiver<Result<ResponseInfo, RenderError>> {
        self.rx
    }
}

/// Result of [`stream_text`].
pub struct TextStreamResult<R = PendingResponse> {
    pub text_stream: TextStream,
    pub response: R,
}

impl<R> TextStreamResult<R> {
    pub fn map_response<S>(self, f: impl FnOnce(R) -> S) -> TextStreamResult<S> {
        TextStreamResult {
            text_stream: self.text_stream,
            response: f(self.response),
        }
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for TextStreamResult<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStreamResult")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Result of [`generate_object`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectResult {
    pub object: Value,
    pub finish_reason: FinishReason,
    pub response: ResponseInfo,
}

/// The object of a stream, parsed and validated once the stream is exhausted.
#[derive(Debug)]
pub struct PendingObject {
    rx: oneshot::Receiver<Result<ObjectResult, RenderError>>,
}

impl PendingObject {
    pub async fn wait(self) -> Result<ObjectResult, RenderError> {
        self.rx.await.map_err(|_| RenderError::StreamClosed)?
    }
}

/// Result of [`stream_object`].
pub struct ObjectStreamResult {
    /// Raw JSON text as it arrives.
    pub text_stream: TextStream,
    pub object: PendingObject,
}

impl std::fmt::Debug for ObjectStreamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStreamResult").finish_non_exhaustive()
    }
}

fn require_model(config: &Config) -> Result<Arc<dyn LanguageModel>, RenderError> {
    config
        .model
        .clone()
        .ok_or_else(|| RenderError::Llm("no model configured".into()))
}

fn chat_request(config: &Config, input: PromptInput) -> ChatRequest {
    ChatRequest {
        system: config.system.clone(),
        messages: input.into_messages(),
        tools: Vec::new(),
        settings: config.model_settings(),
        response_format: ResponseFormat::Text,
    }
}

/// Generates text, running the tool loop when tools are configured.
///
/// Each step is one model call. When the model asks for tools, the calls are
/// executed and their results sent back in the next step, up to `max_steps`
/// model calls (default 1). If the budget runs out while the model still asks
/// for tools, the last calls and their results are returned with
/// [`FinishReason::ToolCalls`] and empty text.
pub async fn generate_text(config: &Config, input: PromptInput) -> Result<TextResult, RenderError> {
    let model = require_model(config)?;
    let tools = config.tools.clone().unwrap_or_default();
    let tool_schemas: Vec<ToolSchema> = tools.list();
    let max_steps = config.max_steps.unwrap_or(1).max(1);

    let mut request = chat_request(config, input);
    request.tools = tool_schemas;

    let mut generated = Vec::new();
    let mut usage = Usage::default();
    let mut step = 0;

    if !request.tools.is_empty() {
        debug!(tools = ?tools.tool_names(), max_steps, "Starting tool loop");
    }

    loop {
        step += 1;
        let response = model.chat(request.clone()).await?;
        usage += response.usage();

        match response {
            ChatResponse::Content(resp) => {
                debug!(step, chars = resp.content.len(), "Final response");
                generated.push(Message::assistant(resp.content.clone()));
                return Ok(TextResult {
                    text: resp.content,
                    finish_reason: resp.finish_reason,
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                    steps: step,
                    response: ResponseInfo {
                        model_id: model.model_id().to_string(),
                        messages: generated,
                        usage,
                    },
                });
            }
            ChatResponse::ToolCalls { calls, .. } => {
                debug!(step, calls = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(), "Tool calls");

                let assistant = Message::assistant_tool_calls(calls.clone());
                request.messages.push(assistant.clone());
                generated.push(assistant);

                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    let result = tools
                        .execute(call)
                        .await
                        .map_err(|e| RenderError::Tool(e.to_string()))?;
                    debug!(tool = %call.name, chars = result.content.len(), "Tool result");
                    let message = Message::tool_result(result.clone());
                    request.messages.push(message.clone());
                    generated.push(message);
                    results.push(result);
                }

                if step >= max_steps {
                    if max_steps > 1 {
                        warn!(max_steps, "Step budget spent while the model still asks for tools");
                    }
                    return Ok(TextResult {
                        text: String::new(),
                        finish_reason: FinishReason::ToolCalls,
                        tool_calls: calls,
                        tool_results: results,
                        steps: step,
                        response: ResponseInfo {
                            model_id: model.model_id().to_string(),
                            messages: generated,
                            usage,
                        },
                    });
                }
            }
        }
    }
}

struct StreamState<F, T> {
    inner: LlmStream,
    text: String,
    usage: Usage,
    finish: Option<F>,
    tx: Option<oneshot::Sender<Result<T, RenderError>>>,
}

/// Forwards text deltas from `inner`; once it is exhausted, `finish` turns
/// the accumulated text into the value delivered on the returned receiver.
///
/// Nothing is read from `inner` until the returned stream is polled.
fn stream_with_completion<F, T>(inner: LlmStream, finish: F) -> (TextStream, oneshot::Receiver<Result<T, RenderError>>)
where
    F: FnOnce(String, Usage) -> Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let state = StreamState {
        inner,
        text: String::new(),
        usage: Usage::default(),
        finish: Some(finish),
        tx: Some(tx),
    };

    let text_stream = stream::unfold(state, |mut state| async move {
        loop {
            match state.inner.next().await {
                Some(Ok(StreamChunk::Content(delta))) => {
                    state.text.push_str(&delta);
                    return Some((Ok(delta), state));
                }
                Some(Ok(StreamChunk::Usage { input_tokens, output_tokens })) => {
                    state.usage += Usage { input_tokens, output_tokens };
                }
                Some(Err(e)) => {
                    if let Some(tx) = state.tx.take() {
                        let _ = tx.send(Err(e.clone()));
                    }
                    return Some((Err(e), state));
                }
                None => {
                    if let (Some(tx), Some(finish)) = (state.tx.take(), state.finish.take()) {
                        let text = std::mem::take(&mut state.text);
                        let _ = tx.send(finish(text, state.usage));
                    }
                    return None;
                }
            }
        }
    });

    (text_stream.boxed(), rx)
}

/// Streams text deltas; the response is delivered once the stream ends.
///
/// Tools are not offered to the model while streaming.
pub async fn stream_text(config: &Config, input: PromptInput) -> Result<TextStreamResult, RenderError> {
    let model = require_model(config)?;
    let inner = model.chat_stream(chat_request(config, input)).await?;
    let model_id = model.model_id().to_string();

    let (text_stream, rx) = stream_with_completion(inner, move |text, usage| {
        Ok(ResponseInfo {
            model_id,
            messages: vec![Message::assistant(text)],
            usage,
        })
    });

    Ok(TextStreamResult {
        text_stream,
        response: PendingResponse { rx },
    })
}

/// The JSON Schema the model is asked to fill, if any.
fn response_schema(config: &Config, output: OutputKind) -> Option<Value> {
    match output {
        OutputKind::Object => config.schema.as_ref().map(|s| s.json_schema()),
        OutputKind::Array => config.schema.as_ref().map(|s| {
            json!({
                "type": "object",
                "properties": { "elements": { "type": "array", "items": s.json_schema() } },
                "required": ["elements"],
                "additionalProperties": false
            })
        }),
        OutputKind::Enum => Some(json!({
            "type": "object",
            "properties": {
                "result": { "type": "string", "enum": config.enum_values.clone().unwrap_or_default() }
            },
            "required": ["result"],
            "additionalProperties": false
        })),
        OutputKind::NoSchema => None,
    }
}

fn object_instructions(config: &Config, schema: Option<&Value>) -> String {
    let instruction = match schema {
        Some(schema) => format!("Respond with a single JSON value matching this JSON Schema:\n{}", schema),
        None => "Respond with a single JSON value.".to_string(),
    };
    match &config.system {
        Some(system) => format!("{}\n\n{}", system, instruction),
        None => instruction,
    }
}

/// Strips a Markdown code fence some models wrap JSON in.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Checks a parsed model reply against the configured output shape and
/// unwraps the `elements`/`result` envelopes.
fn extract_object(config: &Config, output: OutputKind, value: Value) -> Result<Value, RenderError> {
    let validate = |value: &Value| -> Result<(), RenderError> {
        match &config.schema {
            Some(schema) => schema
                .safe_parse(value)
                .map(|_| ())
                .map_err(|e| RenderError::OutputValidation(e.to_string())),
            None => Ok(()),
        }
    };

    match output {
        OutputKind::Object => {
            validate(&value)?;
            Ok(value)
        }
        OutputKind::Array => {
            let elements = match value {
                Value::Object(mut map) => map.remove("elements"),
                _ => None,
            };
            let Some(Value::Array(elements)) = elements else {
                return Err(RenderError::OutputValidation("expected an 'elements' array".into()));
            };
            for element in &elements {
                validate(element)?;
            }
            Ok(Value::Array(elements))
        }
        OutputKind::Enum => {
            let allowed = config.enum_values.as_deref().unwrap_or_default();
            match value.get("result").and_then(Value::as_str) {
                Some(result) if allowed.iter().any(|v| v == result) => Ok(Value::String(result.to_string())),
                Some(result) => Err(RenderError::OutputValidation(format!(
                    "'{}' is not one of {:?}",
                    result, allowed
                ))),
                None => Err(RenderError::OutputValidation("expected a 'result' string".into())),
            }
        }
        OutputKind::NoSchema => Ok(value),
    }
}

fn parse_object(config: &Config, output: OutputKind, text: &str) -> Result<Value, RenderError> {
    let value: Value = serde_json::from_str(strip_fences(text))?;
    extract_object(config, output, value)
}

/// Generates a JSON value shaped by `output`.
///
/// | `output` | Model reply | Result |
/// |----------|-------------|--------|
/// | `object` | object matching `schema` | the object |
/// | `array` | `{"elements": [...]}`, each matching `schema` | the array |
/// | `enum` | `{"result": "<value>"}` | the value |
/// | `no-schema` | any JSON | as is |
///
/// With [`ObjectMode::Tool`] the model is forced through a single tool whose
/// arguments are the reply; otherwise JSON response format is requested.
pub async fn generate_object(config: &Config, input: PromptInput) -> Result<ObjectResult, RenderError> {
    let model = require_model(config)?;
    let output = config.output.unwrap_or_default();
    let schema = response_schema(config, output);

    let mut request = chat_request(config, input);
    let tool_mode = config.mode == Some(ObjectMode::Tool);
    if tool_mode {
        request.tools = vec![ToolSchema {
            name: config.schema_name.clone().unwrap_or_else(|| "json".into()),
            description: config
                .schema_description
                .clone()
                .unwrap_or_else(|| "Respond by calling this tool with the answer.".into()),
            parameters: schema.clone().unwrap_or_else(|| json!({ "type": "object" })),
        }];
    } else {
        request.system = Some(object_instructions(config, schema.as_ref()));
        request.response_format = ResponseFormat::Json;
    }

    let response = model.chat(request).await?;
    let usage = response.usage();
    let (value, finish_reason, message) = match response {
        ChatResponse::ToolCalls { mut calls, .. } if tool_mode && !calls.is_empty() => {
            let call = calls.swap_remove(0);
            let value = extract_object(config, output, call.arguments.clone())?;
            (value, FinishReason::Stop, Message::assistant_tool_calls(vec![call]))
        }
        ChatResponse::ToolCalls { .. } => {
            return Err(RenderError::Parse("expected a JSON reply, got tool calls".into()));
        }
        ChatResponse::Content(resp) => {
            let value = parse_object(config, output, &resp.content)?;
            (value, resp.finish_reason, Message::assistant(resp.content))
        }
    };

    if config.is_debug() {
        info!(%output, "Generated object");
    }

    Ok(ObjectResult {
        object: value,
        finish_reason,
        response: ResponseInfo {
            model_id: model.model_id().to_string(),
            messages: vec![message],
            usage,
        },
    })
}

/// Streams the JSON text of an object; the parsed, validated object is
/// delivered once the stream ends.
///
/// The model is always asked for JSON. [`ObjectMode::Tool`] is rejected when
/// an object streamer is built.
pub async fn stream_object(config: &Config, input: PromptInput) -> Result<ObjectStreamResult, RenderError> {
    let model = require_model(config)?;
    let output = config.output.unwrap_or_default();
    let schema = response_schema(config, output);

    let mut request = chat_request(config, input);
    request.system = Some(object_instructions(config, schema.as_ref()));
    request.response_format = ResponseFormat::Json;

    let inner = model.chat_stream(request).await?;
    let model_id = model.model_id().to_string();
    let config = config.clone();

    let (text_stream, rx) = stream_with_completion(inner, move |text, usage| {
        let object = parse_object(&config, output, &text)?;
        Ok(ObjectResult {
            object,
            finish_reason: FinishReason::Stop,
            response: ResponseInfo {
                model_id,
                messages: vec![Message::assistant(text)],
                usage,
            },
        })
    });

    Ok(ObjectStreamResult {
        text_stream,
        object: PendingObject { rx },
    })
}

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;

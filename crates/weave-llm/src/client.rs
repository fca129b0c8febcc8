//! OpenAI-compatible chat provider with streaming support.
//!
//! Works with OpenAI API and any compatible endpoint (including Ollama's /v1 endpoint).
//! Supports regular chat, streaming, JSON output, and tool calling.

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionStreamOptions, ChatCompletionTool, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FinishReason as OpenAiFinishReason,
        FunctionCall, FunctionObject, ResponseFormat as OpenAiResponseFormat, Stop,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};
use weave_core::{FinishReason, Message, MessageRole, RenderError, ToolCall, Usage};

use crate::{
    ChatRequest, ChatResponse, LanguageModel, LlmMetrics, LlmResponse, LlmStream, ResponseFormat,
    StreamChunk,
};

/// Converts any error into a RenderError::Llm.
fn llm_err(e: impl ToString) -> RenderError {
    RenderError::Llm(e.to_string())
}

/// Converts one weave message into the OpenAI wire type.
fn to_openai_message(msg: &Message) -> Result<ChatCompletionRequestMessage, RenderError> {
    let converted = match msg.role {
        MessageRole::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.as_str())
                .build()
                .map_err(llm_err)?,
        ),
        MessageRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.as_str())
                .build()
                .map_err(llm_err)?,
        ),
        MessageRole::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !msg.content.is_empty() {
                args.content(msg.content.as_str());
            }
            if !msg.tool_calls.is_empty() {
                let calls = msg
                    .tool_calls
                    .iter()
                    .map(|call| ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect::<Vec<_>>();
                args.tool_calls(calls);
            }
            ChatCompletionRequestMessage::Assistant(args.build().map_err(llm_err)?)
        }
        MessageRole::Tool => ChatCompletionRequestMessage::Tool(
            ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .content(msg.content.as_str())
                .build()
                .map_err(llm_err)?,
        ),
    };
    Ok(converted)
}

fn map_finish_reason(reason: Option<OpenAiFinishReason>) -> FinishReason {
    match reason {
        Some(OpenAiFinishReason::Stop) | None => FinishReason::Stop,
        Some(OpenAiFinishReason::Length) => FinishReason::Length,
        Some(OpenAiFinishReason::ToolCalls) | Some(OpenAiFinishReason::FunctionCall) => {
            FinishReason::ToolCalls
        }
        Some(OpenAiFinishReason::ContentFilter) => FinishReason::ContentFilter,
    }
}

/// Provider for OpenAI-compatible chat completion APIs.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    /// Creates a new provider for the given model and optional API base URL.
    ///
    /// Without an API base the key is read from `OPENAI_API_KEY`.
    pub fn new(model: &str, api_base: Option<&str>) -> Self {
        let config = match api_base {
            Some(base) => OpenAIConfig::new()
                .with_api_base(base)
                .with_api_key("ollama"),
            None => OpenAIConfig::default(),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// Builds the wire request shared by plain and streaming calls.
    fn build_request(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, RenderError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(to_openai_message(&Message::system(system.as_str()))?);
        }
        for msg in &request.messages {
            messages.push(to_openai_message(msg)?);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);

        let settings = &request.settings;
        if let Some(temperature) = settings.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = settings.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
        if let Some(top_p) = settings.top_p {
            builder.top_p(top_p);
        }
        if let Some(seed) = settings.seed {
            builder.seed(seed);
        }
        if let Some(stop) = &settings.stop_sequences {
            builder.stop(Stop::StringArray(stop.clone()));
        }
        if let Some(penalty) = settings.presence_penalty {
            builder.presence_penalty(penalty);
        }
        if let Some(penalty) = settings.frequency_penalty {
            builder.frequency_penalty(penalty);
        }
        if request.response_format == ResponseFormat::Json {
            builder.response_format(OpenAiResponseFormat::JsonObject);
        }

        if !request.tools.is_empty() {
            let tools: Vec<ChatCompletionTool> = request
                .tools
                .iter()
                .map(|t| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: t.name.clone(),
                        description: Some(t.description.clone()),
                        parameters: Some(t.parameters.clone()),
                        strict: None,
                    },
                })
                .collect();
            builder.tools(tools);
        }

        if stream {
            builder.stream_options(ChatCompletionStreamOptions { include_usage: true });
        }

        builder.build().map_err(llm_err)
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RenderError> {
        let start = Instant::now();
        let wire = self.build_request(&request, false)?;

        let response = self.client.chat().create(wire).await.map_err(llm_err)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let usage = response
            .usage
            .as_ref()
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let metrics = LlmMetrics { usage, elapsed_ms };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::Llm("No response choices".into()))?;

        // Check for tool calls
        if let Some(tool_calls) = choice.message.tool_calls {
            if !tool_calls.is_empty() {
                let calls = tool_calls
                    .into_iter()
                    .map(|tc| {
                        let args: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                            .unwrap_or(serde_json::Value::Null);
                        ToolCall {
                            id: tc.id,
                            name: tc.function.name,
                            arguments: args,
                        }
                    })
                    .collect();
                return Ok(ChatResponse::ToolCalls { calls, metrics });
            }
        }

        let content = choice
            .message
            .content
            .ok_or_else(|| RenderError::Llm("No response content".into()))?;

        info!(
            "LLM {}: {}ms, tokens: {}/{} (in/out)",
            self.model, elapsed_ms, usage.input_tokens, usage.output_tokens
        );

        Ok(ChatResponse::Content(LlmResponse {
            content,
            finish_reason: map_finish_reason(choice.finish_reason),
            metrics,
        }))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LlmStream, RenderError> {
        let wire = self.build_request(&request, true)?;
        debug!("LLM {}: opening stream", self.model);

        let stream = self.client.chat().create_stream(wire).await.map_err(llm_err)?;

        let mapped = stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    if let Some(usage) = response.usage {
                        return Some(Ok(StreamChunk::Usage {
                            input_tokens: usage.prompt_tokens,
                            output_tokens: usage.completion_tokens,
                        }));
                    }
                    let chunk = response.choices.first()?.delta.content.clone()?;
                    Some(Ok(StreamChunk::Content(chunk)))
                }
                Err(e) => Some(Err(RenderError::Llm(e.to_string()))),
            }
        });

        Ok(Box::pin(mapped))
    }
}

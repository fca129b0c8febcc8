//! Deterministic provider that replays queued replies.
//!
//! Useful for tests and offline demos: every request is recorded, and each
//! call pops the next scripted reply.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use weave_core::{FinishReason, RenderError, ToolCall, Usage};

use crate::{ChatRequest, ChatResponse, LanguageModel, LlmMetrics, LlmResponse, LlmStream, StreamChunk};

#[derive(Default)]
struct Script {
    replies: VecDeque<ChatResponse>,
    streams: VecDeque<Vec<Result<StreamChunk, RenderError>>>,
    requests: Vec<ChatRequest>,
}

/// A [`LanguageModel`] that answers from a script instead of the network.
///
/// ```rust
/// use weave_llm::{ChatRequest, LanguageModel, ScriptedModel};
///
/// let model = ScriptedModel::new("scripted").reply_text("hello");
/// let reply = futures::executor::block_on(model.chat(ChatRequest::default()));
/// assert!(reply.is_ok());
/// assert_eq!(model.requests().len(), 1);
/// ```
pub struct ScriptedModel {
    id: String,
    script: Mutex<Script>,
}

impl ScriptedModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: Mutex::new(Script::default()),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a plain text reply.
    pub fn reply_text(self, text: impl Into<String>) -> Self {
        self.reply(ChatResponse::Content(LlmResponse {
            content: text.into(),
            finish_reason: FinishReason::Stop,
            metrics: LlmMetrics {
                usage: Usage { input_tokens: 1, output_tokens: 1 },
                elapsed_ms: 0,
            },
        }))
    }

    /// Queues a reply asking for tool calls.
    pub fn reply_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.reply(ChatResponse::ToolCalls {
            calls,
            metrics: LlmMetrics {
                usage: Usage { input_tokens: 1, output_tokens: 1 },
                elapsed_ms: 0,
            },
        })
    }

    /// Queues an arbitrary reply.
    pub fn reply(self, response: ChatResponse) -> Self {
        self.script().replies.push_back(response);
        self
    }

    /// Queues a streamed reply made of the given chunks.
    pub fn reply_stream(self, chunks: Vec<StreamChunk>) -> Self {
        self.script().streams.push_back(chunks.into_iter().map(Ok).collect());
        self
    }

    /// Queues a streamed reply that fails with `error` after `chunks`.
    pub fn reply_stream_error(self, chunks: Vec<StreamChunk>, error: RenderError) -> Self {
        let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.script().streams.push_back(items);
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.script().requests.clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.script().requests.last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RenderError> {
        let mut script = self.script();
        script.requests.push(request);
        script
            .replies
            .pop_front()
            .ok_or_else(|| RenderError::Llm(format!("{}: no scripted reply left", self.id)))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<LlmStream, RenderError> {
        let mut script = self.script();
        script.requests.push(request);
        let chunks = script
            .streams
            .pop_front()
            .ok_or_else(|| RenderError::Llm(format!("{}: no scripted stream left", self.id)))?;
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use weave_core::Message;

    #[tokio::test]
    async fn replays_in_order_and_records_requests() {
        let model = ScriptedModel::new("scripted").reply_text("one").reply_text("two");

        let first = model.chat(ChatRequest::new(vec![Message::user("a")])).await.unwrap();
        let second = model.chat(ChatRequest::new(vec![Message::user("b")])).await.unwrap();

        assert!(matches!(first, ChatResponse::Content(ref r) if r.content == "one"));
        assert!(matches!(second, ChatResponse::Content(ref r) if r.content == "two"));
        assert_eq!(model.requests().len(), 2);
        assert_eq!(model.last_request().unwrap().messages, vec![Message::user("b")]);
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let model = ScriptedModel::new("scripted");
        let err = model.chat(ChatRequest::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::Llm(_)));
    }

    #[tokio::test]
    async fn streams_scripted_chunks() {
        let model = ScriptedModel::new("scripted").reply_stream(vec![
            StreamChunk::Content("he".into()),
            StreamChunk::Content("llo".into()),
        ]);
        let chunks: Vec<_> = model
            .chat_stream(ChatRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn scripted_streams_can_fail_midway() {
        let model = ScriptedModel::new("scripted").reply_stream_error(
            vec![StreamChunk::Content("he".into())],
            RenderError::Llm("connection reset".into()),
        );
        let chunks: Vec<_> = model
            .chat_stream(ChatRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(chunks[0], Ok(StreamChunk::Content(ref t)) if t == "he"));
        assert!(matches!(chunks[1], Err(RenderError::Llm(ref m)) if m == "connection reset"));
    }
}

//! Full-conversation views over LLM responses.
//!
//! A primitive reports only the messages it generated. The renderer knows
//! what else belongs to the conversation: the messages derived from the
//! prompt in this call (`messages_prefix`) and the older messages the caller
//! supplied (`history_prefix`). The wrappers here stitch those lists on
//! demand and cache the result.

use std::sync::{Mutex, OnceLock, PoisonError};

use tokio::sync::{oneshot, OnceCell};
use weave_core::{Message, RenderError, Usage};

use crate::generate::{PendingResponse, ResponseInfo, TextResult, TextStreamResult};

/// A response with the conversation around it.
///
/// `messages()` is `[messages_prefix.., generated..]` and
/// `message_history()` is `[history_prefix.., messages_prefix.., generated..]`.
/// Each is built on first access and cached.
#[derive(Debug)]
pub struct AugmentedResponse {
    info: ResponseInfo,
    messages_prefix: Vec<Message>,
    history_prefix: Vec<Message>,
    messages: OnceLock<Vec<Message>>,
    history: OnceLock<Vec<Message>>,
}

impl AugmentedResponse {
    pub fn new(info: ResponseInfo, messages_prefix: Vec<Message>, history_prefix: Vec<Message>) -> Self {
        Self {
            info,
            messages_prefix,
            history_prefix,
            messages: OnceLock::new(),
            history: OnceLock::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.info.model_id
    }

    pub fn usage(&self) -> Usage {
        self.info.usage
    }

    /// Messages generated by the model in this call, as the primitive
    /// reported them.
    pub fn generated(&self) -> &[Message] {
        &self.info.messages
    }

    /// The prompt-derived messages of this call followed by the generated ones.
    pub fn messages(&self) -> &[Message] {
        self.messages.get_or_init(|| {
            self.messages_prefix
                .iter()
                .chain(&self.info.messages)
                .cloned()
                .collect()
        })
    }

    /// The caller-supplied history followed by [`messages`](Self::messages).
    pub fn message_history(&self) -> &[Message] {
        self.history.get_or_init(|| {
            self.history_prefix
                .iter()
                .chain(&self.messages_prefix)
                .chain(&self.info.messages)
                .cloned()
                .collect()
        })
    }
}

type Pending = (oneshot::Receiver<Result<ResponseInfo, RenderError>>, Vec<Message>, Vec<Message>);

/// The augmented response of a stream.
///
/// Waiting never drives the stream: the response settles once the caller has
/// consumed `text_stream`. The augmented value is built once and every later
/// `wait` returns the same reference.
#[derive(Debug)]
pub struct AugmentedStreamResponse {
    pending: Mutex<Option<Pending>>,
    cell: OnceCell<AugmentedResponse>,
}

impl AugmentedStreamResponse {
    fn new(response: PendingResponse, messages_prefix: Vec<Message>, history_prefix: Vec<Message>) -> Self {
        Self {
            pending: Mutex::new(Some((response.into_receiver(), messages_prefix, history_prefix))),
            cell: OnceCell::new(),
        }
    }

    /// Waits for the stream to finish and returns the augmented response.
    ///
    /// If the stream failed or was dropped, the first call reports why and
    /// later calls report [`RenderError::StreamClosed`].
    pub async fn wait(&self) -> Result<&AugmentedResponse, RenderError> {
        self.cell
            .get_or_try_init(|| async {
                let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
                let (rx, messages_prefix, history_prefix) = pending.ok_or(RenderError::StreamClosed)?;
                let info = rx.await.map_err(|_| RenderError::StreamClosed)??;
                Ok::<_, RenderError>(AugmentedResponse::new(info, messages_prefix, history_prefix))
            })
            .await
    }
}

/// Wraps the response of a completed call.
pub fn augment_result(
    result: TextResult,
    messages_prefix: Vec<Message>,
    history_prefix: Vec<Message>,
) -> TextResult<AugmentedResponse> {
    result.map_response(|info| AugmentedResponse::new(info, messages_prefix, history_prefix))
}

/// Wraps the pending response of a stream without touching the stream.
pub fn augment_stream(
    result: TextStreamResult,
    messages_prefix: Vec<Message>,
    history_prefix: Vec<Message>,
) -> TextStreamResult<AugmentedStreamResponse> {
    result.map_response(|pending| AugmentedStreamResponse::new(pending, messages_prefix, history_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{stream_text, PromptInput};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use weave_config::Config;
    use weave_llm::{ScriptedModel, StreamChunk};

    fn info(messages: Vec<Message>) -> ResponseInfo {
        ResponseInfo {
            model_id: "m".into(),
            messages,
            usage: Usage::default(),
        }
    }

    #[test]
    fn messages_are_built_once() {
        let response = AugmentedResponse::new(
            info(vec![Message::assistant("a")]),
            vec![Message::user("p")],
            vec![Message::user("h")],
        );

        let first = response.messages();
        let second = response.messages();
        assert_eq!(first.as_ptr(), second.as_ptr());
        assert_eq!(first, &[Message::user("p"), Message::assistant("a")]);
        assert_eq!(response.generated(), &[Message::assistant("a")]);
    }

    #[test]
    fn history_puts_caller_messages_first() {
        let response = AugmentedResponse::new(
            info(vec![Message::assistant("a")]),
            vec![Message::user("p")],
            vec![Message::user("h1"), Message::assistant("h2")],
        );

        assert_eq!(
            response.message_history(),
            &[
                Message::user("h1"),
                Message::assistant("h2"),
                Message::user("p"),
                Message::assistant("a"),
            ]
        );
        let again = response.message_history();
        assert_eq!(again.as_ptr(), response.message_history().as_ptr());
    }

    #[tokio::test]
    async fn stream_responses_settle_after_the_stream() {
        let model = Arc::new(ScriptedModel::new("m").reply_stream(vec![StreamChunk::Content("done".into())]));
        let config = Config::builder().model(model).build();
        let result = stream_text(&config, PromptInput::Prompt("go".into())).await.unwrap();
        let result = augment_stream(result, vec![Message::user("go")], vec![Message::user("earlier")]);

        let text: Vec<_> = result.text_stream.collect().await;
        assert_eq!(text.len(), 1);

        let first = result.response.wait().await.unwrap();
        assert_eq!(
            first.message_history(),
            &[Message::user("earlier"), Message::user("go"), Message::assistant("done")]
        );
        let second = result.response.wait().await.unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn dropped_streams_close_every_wait() {
        let model = Arc::new(ScriptedModel::new("m").reply_stream(vec![StreamChunk::Content("x".into())]));
        let config = Config::builder().model(model).build();
        let result = stream_text(&config, PromptInput::Prompt("go".into())).await.unwrap();
        let result = augment_stream(result, Vec::new(), Vec::new());
        drop(result.text_stream);

        assert!(matches!(result.response.wait().await, Err(RenderError::StreamClosed)));
        assert!(matches!(result.response.wait().await, Err(RenderError::StreamClosed)));
    }
}

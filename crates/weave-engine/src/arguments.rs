//! Positional call arguments and their disambiguation.
//!
//! A renderer is called with up to three positional values. Each may be a
//! prompt string, a message list or a context object; which role a value
//! plays depends on its type and position, never on a name.

use weave_core::{Context, Message, RenderError};

/// One positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Prompt(String),
    Messages(Vec<Message>),
    Context(Context),
}

impl From<&str> for CallArg {
    fn from(prompt: &str) -> Self {
        CallArg::Prompt(prompt.to_string())
    }
}

impl From<String> for CallArg {
    fn from(prompt: String) -> Self {
        CallArg::Prompt(prompt)
    }
}

impl From<Vec<Message>> for CallArg {
    fn from(messages: Vec<Message>) -> Self {
        CallArg::Messages(messages)
    }
}

impl From<Context> for CallArg {
    fn from(context: Context) -> Self {
        CallArg::Context(context)
    }
}

/// The resolved `{prompt, messages, context}` of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    pub prompt: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub context: Option<Context>,
}

/// Resolves positional arguments into [`CallArguments`].
///
/// 1. `arg1`: a prompt, messages or a context.
/// 2. `arg2`: messages or a context, each at most once overall.
/// 3. `arg3`: a context, only after messages in `arg2`.
///
/// ```rust
/// use weave_core::Message;
/// use weave_engine::{extract_call_arguments, CallArg};
///
/// let args = extract_call_arguments(
///     Some("hi".into()),
///     Some(CallArg::Messages(vec![Message::user("m1")])),
///     None,
/// ).unwrap();
/// assert_eq!(args.prompt.as_deref(), Some("hi"));
/// assert_eq!(args.messages.unwrap().len(), 1);
/// ```
pub fn extract_call_arguments(
    arg1: Option<CallArg>,
    arg2: Option<CallArg>,
    arg3: Option<CallArg>,
) -> Result<CallArguments, RenderError> {
    let mut args = CallArguments::default();

    match arg1 {
        Some(CallArg::Prompt(prompt)) => args.prompt = Some(prompt),
        Some(CallArg::Messages(messages)) => args.messages = Some(messages),
        Some(CallArg::Context(context)) => args.context = Some(context),
        None => {}
    }

    let second_was_messages = matches!(arg2, Some(CallArg::Messages(_)));
    match arg2 {
        Some(CallArg::Messages(messages)) => {
            if args.messages.is_some() {
                return Err(RenderError::arguments("Messages provided multiple times"));
            }
            args.messages = Some(messages);
        }
        Some(CallArg::Context(context)) => {
            if args.context.is_some() {
                return Err(RenderError::arguments("Context provided multiple times"));
            }
            args.context = Some(context);
        }
        Some(CallArg::Prompt(_)) => {
            return Err(RenderError::arguments(
                "The second argument must be a message list or a context object",
            ));
        }
        None => {}
    }

    match arg3 {
        None => {}
        Some(_) if !second_was_messages => {
            return Err(RenderError::arguments(
                "A third argument is only accepted after a message list",
            ));
        }
        Some(CallArg::Context(context)) => {
            if args.context.is_some() {
                return Err(RenderError::arguments("Context provided multiple times"));
            }
            args.context = Some(context);
        }
        Some(_) => {
            return Err(RenderError::arguments("The third argument must be an object"));
        }
    }

    Ok(args)
}

/// Values a renderer can be called with: `()`, one argument, or a tuple of
/// up to three.
pub trait IntoCallArgs {
    fn into_call_args(self) -> [Option<CallArg>; 3];
}

impl IntoCallArgs for () {
    fn into_call_args(self) -> [Option<CallArg>; 3] {
        [None, None, None]
    }
}

macro_rules! single_call_arg {
    ($($ty:ty),*) => {
        $(
            impl IntoCallArgs for $ty {
                fn into_call_args(self) -> [Option<CallArg>; 3] {
                    [Some(self.into()), None, None]
                }
            }
        )*
    };
}

single_call_arg!(&str, String, Vec<Message>, Context, CallArg);

impl<A: Into<CallArg>> IntoCallArgs for (A,) {
    fn into_call_args(self) -> [Option<CallArg>; 3] {
        [Some(self.0.into()), None, None]
    }
}

impl<A: Into<CallArg>, B: Into<CallArg>> IntoCallArgs for (A, B) {
    fn into_call_args(self) -> [Option<CallArg>; 3] {
        [Some(self.0.into()), Some(self.1.into()), None]
    }
}

impl<A: Into<CallArg>, B: Into<CallArg>, C: Into<CallArg>> IntoCallArgs for (A, B, C) {
    fn into_call_args(self) -> [Option<CallArg>; 3] {
        [Some(self.0.into()), Some(self.1.into()), Some(self.2.into())]
    }
}

//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use toolstream_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            let preset_events = &this.preset.events;
            if this.event_idx < preset_events.len() {
                let event = match &preset_events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCallDelta(delta) => {
                        ModelResponseEvent::ToolCallDelta(delta.clone())
                    }
                    PresetEvent::Disconnect => {
                        // Poison the response, further polls end it.
                        this.event_idx = usize::MAX;
                        return Poll::Ready(Err(Error {
                            message: "connection reset by peer",
                            kind: ErrorKind::Other,
                        }));
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == preset_events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if this.preset.has_tool_call() {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Clone)]
enum ConversationStep {
    History,
    AssistantResponse(PresetResponse),
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The step at position `n`
/// answers a request carrying `n` history messages, so every message the
/// caller adds to its history (system prompt, user input, tool results,
/// the assistant message itself) needs a step of its own. If there is no
/// response step at that position, an error will be returned.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<HashMap<usize, u64>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    /// Adds a step for a message that the caller appends by itself, such
    /// as a system prompt or a tool result.
    #[inline]
    pub fn add_history_step(&mut self) {
        self.conversation_script.push(ConversationStep::History);
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.add_history_step();
    }

    /// Sets the delay before each event of a response.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns all the requests received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn open(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }

        let step_idx = req.messages.len();
        let Some(step) = self.conversation_script.get(step_idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        let ConversationStep::AssistantResponse(preset) = step else {
            return Err(Error {
                message: "not an assistant response step",
                kind: ErrorKind::Moderated,
            });
        };

        if let Some(failures) = preset.failures {
            let attempt = {
                let mut attempts = self
                    .attempts
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let attempt = attempts.entry(step_idx).or_default();
                *attempt += 1;
                *attempt
            };
            if failures == 0 || attempt <= failures {
                return Err(Error {
                    message: "too many requests",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
        }

        Ok(TestModelResponse {
            preset: preset.clone(),
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            event_idx: 0,
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.open(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use toolstream_model::{ModelMessage, ModelTool, ToolCallDelta};

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> Result<(String, Vec<ToolCallDelta>), Error> {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut deltas = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            match event {
                ModelResponseEvent::Completed(_) => {}
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCallDelta(delta) => deltas.push(delta),
            }
        }
        Ok((msg, deltas))
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::message("Hello, "),
            PresetEvent::message("world!"),
        ]));
        provider.add_user_input_step();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::message("Sure, let me take a look."),
            PresetEvent::tool_call_start(0, "call_1", "read_file"),
            PresetEvent::tool_call_arguments(0, r#"{"filename":"#),
            PresetEvent::tool_call_arguments(0, r#""todo.txt"}"#),
        ]));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![ModelTool {
                name: "read_file".to_owned(),
                description: "Reads a file".to_owned(),
                parameters: serde_json::json!({ "type": "object" }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, deltas) = collect_response(resp).await.unwrap();
        assert_eq!(msg, "Hello, world!");
        assert!(deltas.is_empty());

        req.messages.push(ModelMessage::assistant(msg));
        req.messages.push(ModelMessage::user("Check my todo"));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, deltas) = collect_response(resp).await.unwrap();
        assert_eq!(msg, "Sure, let me take a look.");
        assert_eq!(deltas.len(), 3);
        assert!(deltas.iter().all(|delta| delta.index == 0));

        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_and_disconnect() {
        let mut provider = TestModelProvider::default();
        provider.add_user_input_step();
        provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::message("partial"),
                PresetEvent::Disconnect,
            ])
            .with_failures(1),
        );

        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let resp = provider.send_request(&req).await.unwrap();
        let err = collect_response(resp).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let req = ModelRequest {
            messages: vec![],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Moderated);
    }
}

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use toolstream_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ToolCallDelta,
};

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the input word by word, then asks for an `echo` tool call whose
/// arguments are split across two fragments.
#[derive(Debug)]
struct FakeModelResponse {
    fake_items: VecDeque<ModelResponseEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeModelResponse {
    fn new(input: &str) -> Self {
        let words: Vec<_> = format!("You said {input}")
            .split(' ')
            .map(ToString::to_string)
            .collect();
        let word_count = words.len();
        let mut fake_items: VecDeque<_> = words
            .into_iter()
            .enumerate()
            .map(|(idx, mut word)| {
                if idx + 1 < word_count {
                    word.push(' ');
                }
                ModelResponseEvent::MessageDelta(word)
            })
            .collect();
        fake_items.push_back(ModelResponseEvent::ToolCallDelta(ToolCallDelta {
            index: 0,
            id: Some("call_0".to_owned()),
            name: Some("echo".to_owned()),
            arguments: Some(r#"{"text":"#.to_owned()),
        }));
        fake_items.push_back(ModelResponseEvent::ToolCallDelta(ToolCallDelta {
            index: 0,
            arguments: Some(format!("{:?}}}", input)),
            ..Default::default()
        }));
        fake_items.push_back(ModelResponseEvent::Completed(
            ModelFinishReason::ToolCalls,
        ));
        Self {
            fake_items,
            sleep: None,
        }
    }
}

impl ModelResponse for FakeModelResponse {
    type Error = FakeModelProviderError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fake_items.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;
    type Response = FakeModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            let Some(msg) = req.messages.last() else {
                break 'blk Err(FakeModelProviderError(ErrorKind::Other));
            };
            let ModelMessage::User { content } = msg else {
                break 'blk Err(FakeModelProviderError(
                    ErrorKind::RateLimitExceeded,
                ));
            };
            Ok(FakeModelResponse::new(content))
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    #[tokio::test]
    async fn test_completion() {
        let provider = FakeModelProvider;
        let req = ModelRequest {
            messages: vec![ModelMessage::user("Good morning")],
            tools: vec![],
        };
        let mut resp = provider.send_request(&req).await.unwrap();

        let mut resp_message = String::new();
        let mut arguments = String::new();
        let mut finish_reason = None;
        loop {
            let resp_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match resp_fut.await {
                Ok(Some(event)) => match event {
                    ModelResponseEvent::MessageDelta(delta) => {
                        resp_message.push_str(&delta);
                    }
                    ModelResponseEvent::ToolCallDelta(delta) => {
                        assert_eq!(delta.index, 0);
                        if let Some(fragment) = delta.arguments {
                            arguments.push_str(&fragment);
                        }
                    }
                    ModelResponseEvent::Completed(reason) => {
                        finish_reason = Some(reason);
                    }
                },
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        assert_eq!(resp_message, "You said Good morning");
        assert_eq!(arguments, r#"{"text":"Good morning"}"#);
        assert_eq!(finish_reason, Some(ModelFinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeModelProvider;
        let req = ModelRequest {
            messages: vec![],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let req = ModelRequest {
            messages: vec![ModelMessage::assistant("Hi")],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn test_shared_provider() {
        let provider = std::sync::Arc::new(FakeModelProvider);
        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        let mut resp = provider.send_request(&req).await.unwrap();
        let first = poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx)).await;
        assert_eq!(
            first.unwrap(),
            Some(ModelResponseEvent::MessageDelta("You ".to_owned()))
        );
    }
}

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use toolstream_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallDelta,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Choice};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // A single chunk may carry text and several tool call fragments, they
    // are queued here and handed out one per poll.
    pending_events: VecDeque<ModelResponseEvent>,
    finished: bool,
}

impl PartialState {
    fn push_choice(&mut self, choice: Choice) {
        if let Some(content) =
            choice.delta.content.filter(|content| !content.is_empty())
        {
            self.pending_events
                .push_back(ModelResponseEvent::MessageDelta(content));
        }
        for tool_call in choice.delta.tool_calls.into_iter().flatten() {
            let (name, arguments) = match tool_call.function {
                Some(function) => (function.name, function.arguments),
                None => (None, None),
            };
            self.pending_events.push_back(ModelResponseEvent::ToolCallDelta(
                ToolCallDelta {
                    index: tool_call.index.unwrap_or_default(),
                    id: tool_call.id,
                    name,
                    arguments,
                },
            ));
        }
        if let Some(finish_reason) = choice.finish_reason {
            let finish_reason = if finish_reason == "tool_calls" {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            };
            self.pending_events
                .push_back(ModelResponseEvent::Completed(finish_reason));
            self.finished = true;
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_events: VecDeque::new(),
            finished: false,
        };
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.finished {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok((None, partial_state)),
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            return Ok((None, partial_state));
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        for choice in chunk.choices {
            partial_state.push_choice(choice);
        }
    }
}

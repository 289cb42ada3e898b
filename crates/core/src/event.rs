//! Events observed by the consumer of a turn.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use toolstream_model::ErrorKind as ModelErrorKind;

/// An event of a turn, in the order it happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    /// A piece of assistant text.
    Content {
        /// The text fragment.
        text: String,
    },
    /// A tool call is about to run.
    ToolCall {
        /// The call id.
        id: String,
        /// The tool name.
        name: String,
        /// The parsed arguments, or the raw text if they don't parse.
        arguments: Value,
    },
    /// A tool call has finished.
    ToolResult {
        /// The call id.
        id: String,
        /// The result text, or the error text if it failed.
        result: String,
        /// Whether the call succeeded.
        success: bool,
    },
    /// The turn has finished normally.
    TurnComplete {
        /// All the assistant text of the turn.
        final_text: String,
        /// The number of `tool_call` events of the turn.
        tool_call_count: usize,
    },
    /// The turn was aborted by a transport failure.
    Error {
        /// The error message.
        message: String,
        /// The error category.
        code: ErrorCode,
    },
}

/// The category of an [`Event::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The model stream failed or disconnected.
    StreamError,
    /// The provider rejected the request for rate limiting.
    RateLimited,
    /// The provider refused to answer.
    Moderated,
}

impl From<ModelErrorKind> for ErrorCode {
    fn from(kind: ModelErrorKind) -> Self {
        match kind {
            ModelErrorKind::Moderated => ErrorCode::Moderated,
            ModelErrorKind::RateLimitExceeded => ErrorCode::RateLimited,
            ModelErrorKind::Other => ErrorCode::StreamError,
        }
    }
}

/// The producer side of [`TurnEvents`].
///
/// Sending never fails. The turn keeps running after the consumer went away,
/// the events are just dropped.
pub(crate) struct EventEmitter {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventEmitter {
    pub(crate) fn new() -> (Self, TurnEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TurnEvents { rx })
    }

    pub(crate) fn emit(&self, event: Event) {
        trace!("emitting event: {event:?}");
        if self.tx.send(event).is_err() {
            trace!("event consumer is gone");
        }
    }
}

/// The events of a running turn.
///
/// The sequence ends after [`Event::TurnComplete`] or [`Event::Error`].
#[derive(Debug)]
pub struct TurnEvents {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl TurnEvents {
    /// Waits for the next event, returning `None` after the turn ends.
    #[inline]
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Waits for the turn to end and returns all of its events.
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = vec![];
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}

impl Stream for TurnEvents {
    type Item = Event;

    #[inline]
    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

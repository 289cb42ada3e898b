use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use tokio::time::sleep;
use toolstream_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tracing::Instrument;

type OpenStreamResult = Result<ModelStream, Box<dyn ModelProviderError>>;
type BoxedOpenStreamFuture =
    Pin<Box<dyn Future<Output = OpenStreamResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedOpenStreamFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_initial_interval: Duration,
    retry_max_elapsed: Duration,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {req:?}");
                    match fut.await {
                        Ok(resp) => Ok(ModelStream {
                            inner: Box::pin(resp),
                        }),
                        Err(err) => Err(Box::new(err) as Box<dyn ModelProviderError>),
                    }
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_initial_interval: Duration::ZERO,
            retry_max_elapsed: Duration::ZERO,
        }
    }

    /// Retries opening rate-limited streams with an exponential backoff.
    #[inline]
    pub fn with_retry(
        mut self,
        initial_interval: Duration,
        max_elapsed: Duration,
    ) -> Self {
        self.retry_initial_interval = initial_interval;
        self.retry_max_elapsed = max_elapsed;
        self
    }

    /// Opens a response stream for the request.
    ///
    /// Only [`ErrorKind::RateLimitExceeded`] failures are retried, every
    /// other error is returned right away.
    pub async fn open_stream(&self, req: &ModelRequest) -> OpenStreamResult {
        let mut backoff = (!self.retry_max_elapsed.is_zero()).then(|| {
            ExponentialBackoffBuilder::new()
                .with_initial_interval(self.retry_initial_interval)
                .with_max_elapsed_time(Some(self.retry_max_elapsed))
                .build()
        });
        loop {
            let err = match (self.handler_fn)(req.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };
            if err.kind() != ErrorKind::RateLimitExceeded {
                return Err(err);
            }
            let Some(delay) = backoff.as_mut().and_then(Backoff::next_backoff)
            else {
                return Err(err);
            };
            warn!("model stream is rate limited, retrying in {delay:?}: {err}");
            sleep(delay).await;
        }
    }
}

trait ErasedResponse: Send {
    fn poll_erased(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>>>;
}

impl<R: ModelResponse> ErasedResponse for R {
    #[inline]
    fn poll_erased(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>>>
    {
        self.poll_next_event(cx)
            .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
    }
}

/// An opened model response stream.
pub struct ModelStream {
    inner: Pin<Box<dyn ErasedResponse>>,
}

impl ModelStream {
    /// Waits for the next event, returning `None` once the stream ends.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe if the underlying response is.
    pub async fn next_event(
        &mut self,
    ) -> Result<Option<ModelResponseEvent>, Box<dyn ModelProviderError>> {
        let event = poll_fn(|cx| self.inner.as_mut().poll_erased(cx)).await;
        trace!("got an event: {event:?}");
        event
    }
}

#[cfg(test)]
mod tests {
    use toolstream_model::{ModelFinishReason, ModelMessage};
    use toolstream_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_open_stream() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::message("How "),
                PresetEvent::message("are you?"),
            ]),
        );

        let model_client = ModelClient::new(model_provider);
        for _ in 0..3 {
            let mut stream = model_client.open_stream(&request()).await.unwrap();
            let mut transcript = String::new();
            let mut finish_reason = None;
            while let Some(event) = stream.next_event().await.unwrap() {
                match event {
                    ModelResponseEvent::MessageDelta(delta) => {
                        transcript.push_str(&delta)
                    }
                    ModelResponseEvent::Completed(reason) => {
                        finish_reason = Some(reason)
                    }
                    ModelResponseEvent::ToolCallDelta(_) => unreachable!(),
                }
            }
            assert_eq!(transcript, "How are you?");
            assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rate_limited() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::message("ok")])
                .with_failures(2),
        );

        let model_client = ModelClient::new(model_provider.clone())
            .with_retry(Duration::from_millis(10), Duration::from_secs(10));
        assert!(model_client.open_stream(&request()).await.is_ok());
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::message("ok")])
                .with_failures(1),
        );

        // Retrying is off by default.
        let model_client = ModelClient::new(model_provider.clone());
        let err = model_client.open_stream(&request()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        // Other kinds are never retried.
        let model_client = ModelClient::new(TestModelProvider::default())
            .with_retry(Duration::from_millis(1), Duration::from_secs(10));
        let err = model_client.open_stream(&request()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::message("ok")])
                .with_failures(0),
        );

        let model_client = ModelClient::new(model_provider.clone())
            .with_retry(Duration::from_millis(5), Duration::from_millis(50));
        let err = model_client.open_stream(&request()).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert!(model_provider.requests().len() > 1);
    }
}

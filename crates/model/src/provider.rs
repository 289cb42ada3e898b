use std::error::Error;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
///
/// The [`kind`](ModelProviderError::kind) is what the orchestrator acts on,
/// for instance only [`ErrorKind::RateLimitExceeded`] failures are retried.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A streaming model endpoint.
///
/// Each call of [`send_request`](ModelProvider::send_request) opens an
/// independent response stream, and several streams may be open at once.
/// The provider may be dropped while streams it opened are still being read.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends the conversation and the tool schemas to the model, resolving
    /// once the response stream is open.
    ///
    /// The returned future must not borrow `self` or `req`.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}

impl<P: ModelProvider> ModelProvider for Arc<P> {
    type Error = P::Error;
    type Response = P::Response;

    #[inline]
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        (**self).send_request(req)
    }
}

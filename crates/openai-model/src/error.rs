use std::error::Error as StdError;
use std::fmt::{self, Display};

use reqwest::StatusCode;
use toolstream_model::{ErrorKind, ModelProviderError};

/// Error type for [`OpenAIProvider`](crate::OpenAIProvider).
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Classifies a failed HTTP exchange.
    pub(crate) fn from_http(err: reqwest::Error) -> Self {
        let kind = err.status().map_or(ErrorKind::Other, kind_of_status);
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn kind_of_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        _ => ErrorKind::Other,
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_status() {
        assert_eq!(
            kind_of_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(kind_of_status(StatusCode::BAD_GATEWAY), ErrorKind::Other);
        assert_eq!(kind_of_status(StatusCode::UNAUTHORIZED), ErrorKind::Other);
    }
}

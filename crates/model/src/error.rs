use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    ///
    /// This is the only kind that callers may treat as transient.
    RateLimitExceeded,
    /// Any other errors, including broken connections.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Content moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::Other => write!(f, "Transport error"),
        }
    }
}

use std::time::Duration;

const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RETRY_MAX_ELAPSED: Duration = Duration::from_secs(10);

/// Tunables of an [`Agent`](crate::Agent).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AgentConfig {
    pub(crate) concurrency_limit: usize,
    pub(crate) tool_timeout: Duration,
    pub(crate) stream_retry_initial_interval: Duration,
    pub(crate) stream_retry_max_elapsed: Duration,
}

impl AgentConfig {
    /// Returns the maximum number of tool bodies running at once.
    #[inline]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Returns the time a batch of tool calls is given to finish.
    #[inline]
    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfigBuilder::new().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AgentConfigBuilder {
    concurrency_limit: Option<usize>,
    tool_timeout: Option<Duration>,
    stream_retry_initial_interval: Option<Duration>,
    stream_retry_max_elapsed: Option<Duration>,
}

impl AgentConfigBuilder {
    /// Creates a builder with every value at its default.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of tool bodies running at once, 5 by default.
    #[inline]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Sets the time a batch of tool calls is given to finish, 30 seconds by
    /// default.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Sets the first delay before retrying a rate-limited stream.
    #[inline]
    pub fn with_stream_retry_initial_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.stream_retry_initial_interval = Some(interval);
        self
    }

    /// Sets how long a rate-limited stream is retried before giving up.
    /// Zero disables retrying.
    #[inline]
    pub fn with_stream_retry_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.stream_retry_max_elapsed = Some(max_elapsed);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> AgentConfig {
        AgentConfig {
            concurrency_limit: self
                .concurrency_limit
                .unwrap_or(DEFAULT_CONCURRENCY_LIMIT)
                .max(1),
            tool_timeout: self.tool_timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT),
            stream_retry_initial_interval: self
                .stream_retry_initial_interval
                .unwrap_or(DEFAULT_RETRY_INITIAL_INTERVAL),
            stream_retry_max_elapsed: self
                .stream_retry_max_elapsed
                .unwrap_or(DEFAULT_RETRY_MAX_ELAPSED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.concurrency_limit(), 5);
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));

        let config = AgentConfigBuilder::new()
            .with_concurrency_limit(0)
            .with_tool_timeout(Duration::from_millis(200))
            .build();
        assert_eq!(config.concurrency_limit(), 1);
        assert_eq!(config.tool_timeout(), Duration::from_millis(200));
    }
}

use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;

use super::object::join_error;
use super::{Error, Registry, ToolCallRecord, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// How the calls of a batch are run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// All calls are started at once, bounded by the concurrency limit.
    #[default]
    Parallel,
    /// Calls are run one after another.
    Sequential,
}

/// Runs batches of tool calls against a [`Registry`].
///
/// A batch has a single deadline, `timeout` after it starts. Calls that are
/// still running at the deadline are aborted and reported as timed out,
/// calls that finished keep their results. The order of the returned records
/// always matches the order of the input.
#[derive(Clone)]
pub struct Scheduler {
    registry: Arc<Registry>,
    concurrency_limit: usize,
    timeout: Duration,
}

impl Scheduler {
    /// Creates a scheduler.
    ///
    /// A `concurrency_limit` of zero is treated as one.
    pub fn new(
        registry: Arc<Registry>,
        concurrency_limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            concurrency_limit: concurrency_limit.max(1),
            timeout,
        }
    }

    /// Returns the registry this scheduler looks tools up in.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs a single call.
    pub async fn execute_one(&self, call: ToolCallRecord) -> ToolCallRecord {
        let mut records =
            self.execute_batch(vec![call], ExecutionMode::Parallel).await;
        // A batch always yields one record per call.
        records.remove(0)
    }

    /// Runs a batch of calls, returning one finished record per call.
    pub async fn execute_batch(
        &self,
        calls: Vec<ToolCallRecord>,
        mode: ExecutionMode,
    ) -> Vec<ToolCallRecord> {
        let span = debug_span!("tool scheduler", ?mode, calls = calls.len());
        async move {
            let deadline = Instant::now() + self.timeout;
            match mode {
                ExecutionMode::Parallel => self.run_parallel(calls, deadline).await,
                ExecutionMode::Sequential => {
                    self.run_sequential(calls, deadline).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_parallel(
        &self,
        calls: Vec<ToolCallRecord>,
        deadline: Instant,
    ) -> Vec<ToolCallRecord> {
        let permits = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut running = Vec::with_capacity(calls.len());
        for (position, mut record) in calls.into_iter().enumerate() {
            record.ensure_id(position);
            record.start();
            let fut = self.prepare(&record);
            let permits = Arc::clone(&permits);
            let handle = tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await;
                fut.await
            });
            running.push((record, handle));
        }

        let mut records = Vec::with_capacity(running.len());
        for (mut record, handle) in running {
            let result = self.join(handle, deadline).await;
            record.finish(result);
            records.push(record);
        }
        records
    }

    async fn run_sequential(
        &self,
        calls: Vec<ToolCallRecord>,
        deadline: Instant,
    ) -> Vec<ToolCallRecord> {
        let mut records = Vec::with_capacity(calls.len());
        for (position, mut record) in calls.into_iter().enumerate() {
            record.ensure_id(position);
            record.start();
            let result = if Instant::now() >= deadline {
                Err(Error::timeout(self.timeout))
            } else {
                let handle = tokio::spawn(self.prepare(&record));
                self.join(handle, deadline).await
            };
            record.finish(result);
            records.push(record);
        }
        records
    }

    async fn join(
        &self,
        mut handle: JoinHandle<ToolResult>,
        deadline: Instant,
    ) -> ToolResult {
        match timeout_at(deadline, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(join_error(err)),
            Err(_) => {
                handle.abort();
                Err(Error::timeout(self.timeout))
            }
        }
    }

    fn prepare(&self, record: &ToolCallRecord) -> BoxedToolFuture {
        let Some(tool) = self.registry.lookup(&record.name) else {
            return Box::pin(ready(Err(Error::not_found())));
        };
        let arguments = match record.parse_arguments() {
            Ok(arguments) => arguments,
            Err(err) => return Box::pin(ready(Err(err))),
        };
        trace!("spawning a tool ({}) with args: {arguments:?}", record.id);
        tool.execute(Value::Object(arguments))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;
    use serde_json::json;
    use tokio::time::sleep;

    use super::*;
    use crate::tool::{BlockingTool, CallState, Tool};

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(Value);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text"
        }

        fn parameter_schema(&self) -> &Value {
            &self.0
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(input.text))
        }
    }

    #[derive(Deserialize)]
    struct SleepInput {
        millis: u64,
        #[serde(default)]
        fail: bool,
    }

    struct SleepTool {
        schema: Value,
        running: Arc<AtomicUsize>,
        max_running: Arc<AtomicUsize>,
    }

    impl Tool for SleepTool {
        type Input = SleepInput;

        fn name(&self) -> &str {
            "sleep"
        }

        fn description(&self) -> &str {
            "Sleeps for a while"
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            let running = Arc::clone(&self.running);
            let max_running = Arc::clone(&self.max_running);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(input.millis)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                if input.fail {
                    return Err(Error::execution_error().with_reason("boom"));
                }
                Ok(format!("slept {}ms", input.millis))
            }
        }
    }

    struct PanicTool(Value);

    impl Tool for PanicTool {
        type Input = Value;

        fn name(&self) -> &str {
            "panic"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameter_schema(&self) -> &Value {
            &self.0
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            explode()
        }
    }

    async fn explode() -> ToolResult {
        panic!("kaboom")
    }

    struct UpperTool(Value);

    impl BlockingTool for UpperTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Upper-cases the text"
        }

        fn parameter_schema(&self) -> &Value {
            &self.0
        }

        fn execute(&self, input: Self::Input) -> ToolResult {
            std::thread::sleep(Duration::from_millis(5));
            Ok(input.text.to_uppercase())
        }
    }

    struct Fixture {
        scheduler: Scheduler,
        max_running: Arc<AtomicUsize>,
    }

    fn fixture(concurrency_limit: usize, timeout: Duration) -> Fixture {
        let max_running = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.register(EchoTool(json!({ "type": "object" })));
        registry.register(SleepTool {
            schema: json!({ "type": "object" }),
            running: Arc::new(AtomicUsize::new(0)),
            max_running: Arc::clone(&max_running),
        });
        registry.register(PanicTool(json!({ "type": "object" })));
        registry.register_blocking(UpperTool(json!({ "type": "object" })));
        Fixture {
            scheduler: Scheduler::new(
                Arc::new(registry),
                concurrency_limit,
                timeout,
            ),
            max_running,
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRecord {
        ToolCallRecord::new(id, name, arguments)
    }

    fn results(records: &[ToolCallRecord]) -> Vec<(&str, bool, &str)> {
        records
            .iter()
            .map(|record| {
                (
                    record.id.as_str(),
                    record.success.unwrap_or_default(),
                    record.result.as_deref().unwrap_or_default(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_tool_is_isolated() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_secs(1));
        let records = scheduler
            .execute_batch(
                vec![
                    call("1", "foo", "{}"),
                    call("2", "echo", r#"{"text":"bar"}"#),
                ],
                ExecutionMode::Parallel,
            )
            .await;
        assert_eq!(
            results(&records),
            [
                ("1", false, "Error: Unknown function 'foo'"),
                ("2", true, "bar"),
            ]
        );
        assert_eq!(records[0].state, CallState::Failed);
        assert_eq!(records[1].state, CallState::Completed);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_secs(1));
        let records = scheduler
            .execute_batch(
                vec![
                    call("1", "echo", "[1, 2]"),
                    call("2", "echo", "{}"),
                    call("3", "echo", ""),
                ],
                ExecutionMode::Sequential,
            )
            .await;
        for record in &records {
            assert_eq!(record.success, Some(false));
            let result = record.result.as_deref().unwrap_or_default();
            assert!(
                result.starts_with("Error: Invalid arguments for echo: "),
                "{result}"
            );
        }
    }

    #[tokio::test]
    async fn test_panic_and_failure() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_secs(1));
        let records = scheduler
            .execute_batch(
                vec![
                    call("1", "panic", "{}"),
                    call("2", "sleep", r#"{"millis":1,"fail":true}"#),
                    call("3", "echo", r#"{"text":"still here"}"#),
                ],
                ExecutionMode::Parallel,
            )
            .await;
        assert_eq!(
            results(&records),
            [
                ("1", false, "Error executing panic: panicked: kaboom"),
                ("2", false, "Error executing sleep: boom"),
                ("3", true, "still here"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_timeout_keeps_order() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_millis(100));
        let started = Instant::now();
        let records = scheduler
            .execute_batch(
                vec![
                    call("slow", "sleep", r#"{"millis":1000}"#),
                    call("fast", "sleep", r#"{"millis":10}"#),
                    call("", "echo", r#"{"text":"hi"}"#),
                ],
                ExecutionMode::Parallel,
            )
            .await;
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(
            results(&records),
            [
                ("slow", false, "Timeout after 0.1s"),
                ("fast", true, "slept 10ms"),
                ("tool_2", true, "hi"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_shares_one_deadline() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_millis(250));
        let started = Instant::now();
        let records = scheduler
            .execute_batch(
                vec![
                    call("1", "sleep", r#"{"millis":100}"#),
                    call("2", "sleep", r#"{"millis":100}"#),
                    call("3", "sleep", r#"{"millis":100}"#),
                    call("4", "echo", r#"{"text":"late"}"#),
                ],
                ExecutionMode::Sequential,
            )
            .await;
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(
            results(&records),
            [
                ("1", true, "slept 100ms"),
                ("2", true, "slept 100ms"),
                ("3", false, "Timeout after 0.25s"),
                ("4", false, "Timeout after 0.25s"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_runs_concurrently() {
        let Fixture {
            scheduler,
            max_running,
        } = fixture(2, Duration::from_secs(1));
        let started = Instant::now();
        let calls = (0..4)
            .map(|i| call(&format!("{i}"), "sleep", r#"{"millis":100}"#))
            .collect();
        let records =
            scheduler.execute_batch(calls, ExecutionMode::Parallel).await;
        assert!(records.iter().all(|record| record.success == Some(true)));
        assert_eq!(max_running.load(Ordering::SeqCst), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_blocking_tool() {
        let Fixture { scheduler, .. } = fixture(5, Duration::from_secs(5));
        let record = scheduler
            .execute_one(call("1", "upper", r#"{"text":"tokyo"}"#))
            .await;
        assert_eq!(record.result.as_deref(), Some("TOKYO"));
        assert_eq!(record.state, CallState::Completed);
    }
}

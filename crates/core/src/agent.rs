mod builder;
mod turn;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot};
use tracing::Instrument;

use crate::config::AgentConfig;
use crate::conversation::Conversation;
use crate::event::{EventEmitter, TurnEvents};
use crate::model_client::ModelClient;
use crate::tool::{ExecutionMode, Registry, Scheduler};
pub use builder::AgentBuilder;
use turn::Turn;

/// Options of a single turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TurnOptions {
    /// Clears the conversation before the user message is added.
    pub reset_history: bool,
    /// Runs the tool calls collected at the end of a stream concurrently
    /// instead of one by one.
    pub parallel_tools: bool,
}

impl TurnOptions {
    #[inline]
    fn execution_mode(&self) -> ExecutionMode {
        if self.parallel_tools {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            reset_history: false,
            parallel_tools: true,
        }
    }
}

#[derive(Default)]
struct ConversationSlot {
    conversation: Arc<AsyncMutex<Conversation>>,
    // Resolves once the last queued user of the conversation is done.
    tail: Option<oneshot::Receiver<()>>,
}

/// A place in the queue of a conversation, taken when a turn or a snapshot
/// is requested.
struct Ticket {
    conversation: Arc<AsyncMutex<Conversation>>,
    previous: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl Ticket {
    /// Waits for every earlier ticket of the conversation to be released.
    async fn acquire(self) -> TicketGuard {
        if let Some(previous) = self.previous {
            // The sender is dropped without sending.
            previous.await.ok();
        }
        TicketGuard {
            conversation: self.conversation.lock_owned().await,
            _done: self.done,
        }
    }
}

/// Exclusive access to a conversation. Dropping it lets the next ticket go.
struct TicketGuard {
    // Declared first so the lock is released before the next ticket wakes.
    conversation: OwnedMutexGuard<Conversation>,
    _done: oneshot::Sender<()>,
}

pub(crate) struct AgentInner {
    model_client: ModelClient,
    scheduler: Scheduler,
    config: AgentConfig,
    system_prompt: Option<String>,
    conversations: Mutex<HashMap<String, ConversationSlot>>,
}

/// An agent instance, which holds a model provider, the tools, and the
/// conversations it is having.
///
/// The agent is cheap to clone, clones share the same conversations. Turns
/// of different conversations run independently, while turns of the same
/// conversation are run one after another in the order `run_turn` was
/// called.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Starts a turn in the given conversation, creating the conversation if
    /// it doesn't exist yet.
    ///
    /// The turn runs as a task of the current tokio runtime, so this must be
    /// called within one. It keeps running to the end even if the returned
    /// events are dropped.
    pub fn run_turn(
        &self,
        conversation_id: impl Into<String>,
        message: impl Into<String>,
        options: TurnOptions,
    ) -> TurnEvents {
        let conversation_id = conversation_id.into();
        let message = message.into();
        let (emitter, events) = EventEmitter::new();
        let ticket = self.enqueue(&conversation_id);
        let inner = Arc::clone(&self.inner);

        let span = debug_span!("turn", conversation_id = %conversation_id);
        tokio::spawn(
            async move {
                let mut guard = ticket.acquire().await;
                let turn = Turn::new(
                    &inner.model_client,
                    &inner.scheduler,
                    inner.system_prompt.as_deref(),
                    &mut guard.conversation,
                    emitter,
                    options.execution_mode(),
                );
                turn.run(message, options.reset_history).await;
            }
            .instrument(span),
        );
        events
    }

    /// Returns a snapshot of a conversation.
    ///
    /// Waits for every turn of that conversation started before this call
    /// to finish first.
    pub async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        if !self.conversations().contains_key(conversation_id) {
            return None;
        }
        let guard = self.enqueue(conversation_id).acquire().await;
        Some(guard.conversation.clone())
    }

    /// Returns the configuration of the agent.
    #[inline]
    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Returns the tools available to the model.
    #[inline]
    pub fn tools(&self) -> &Registry {
        self.inner.scheduler.registry()
    }

    /// Takes the next place in the queue of a conversation, creating the
    /// conversation if needed. Places are handed out in call order.
    fn enqueue(&self, conversation_id: &str) -> Ticket {
        let (done, tail) = oneshot::channel();
        let mut conversations = self.conversations();
        let slot = conversations
            .entry(conversation_id.to_owned())
            .or_insert_with(|| {
                debug!("creating conversation {conversation_id}");
                Default::default()
            });
        Ticket {
            conversation: Arc::clone(&slot.conversation),
            previous: slot.tail.replace(tail),
            done,
        }
    }

    fn conversations(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, ConversationSlot>> {
        // The map is never left in an intermediate state.
        self.inner
            .conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            registry,
            config,
            system_prompt,
        } = builder;

        let scheduler = Scheduler::new(
            Arc::new(registry),
            config.concurrency_limit,
            config.tool_timeout,
        );
        let model_client = model_client.with_retry(
            config.stream_retry_initial_interval,
            config.stream_retry_max_elapsed,
        );
        let inner = AgentInner {
            model_client,
            scheduler,
            config,
            system_prompt,
            conversations: Default::default(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }
}

use std::collections::HashMap;

use serde_json::Value;
use toolstream_model::{
    AssistantMessage, ModelMessage, ModelProviderError, ModelRequest,
    ModelResponseEvent,
};

use crate::assembler::{Assembler, ReadyCall, ToolCallFragment};
use crate::conversation::Conversation;
use crate::event::{Event, EventEmitter};
use crate::model_client::{ModelClient, ModelStream};
use crate::tool::{ExecutionMode, Scheduler, ToolCallRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum TurnStage {
    #[default]
    Idle,
    Streaming,
    Draining,
    Submitting,
    FinalStreaming,
}

/// A call that was run while its stream was still going.
struct EagerCall {
    snapshot: ReadyCall,
    record: ToolCallRecord,
}

impl EagerCall {
    /// Returns `true` if the final fragment still describes the call that
    /// was run. Arguments are compared by value, so text that only grew by
    /// whitespace is the same call.
    fn matches(&self, fragment: &ToolCallFragment) -> bool {
        self.snapshot.id == fragment.id
            && self.snapshot.name == fragment.name
            && serde_json::from_str::<Value>(&fragment.arguments)
                .is_ok_and(|arguments| arguments == self.snapshot.arguments)
    }
}

/// The outcome of a stream that ended normally.
struct StreamOutput {
    content: String,
    calls: Vec<ToolCallFragment>,
    executed: HashMap<u32, EagerCall>,
}

/// Drives one user message to the final assistant response.
///
/// A turn makes at most two model requests: the first one may ask for tool
/// calls, the second one answers with the tool results in the history. Tool
/// calls asked for in the second response are ignored.
pub(super) struct Turn<'a> {
    model_client: &'a ModelClient,
    scheduler: &'a Scheduler,
    system_prompt: Option<&'a str>,
    conversation: &'a mut Conversation,
    emitter: EventEmitter,
    mode: ExecutionMode,
    stage: TurnStage,
    // All the text of the turn, and the number of calls announced so far.
    text: String,
    tool_call_count: usize,
}

impl<'a> Turn<'a> {
    pub(super) fn new(
        model_client: &'a ModelClient,
        scheduler: &'a Scheduler,
        system_prompt: Option<&'a str>,
        conversation: &'a mut Conversation,
        emitter: EventEmitter,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            model_client,
            scheduler,
            system_prompt,
            conversation,
            emitter,
            mode,
            stage: TurnStage::Idle,
            text: String::new(),
            tool_call_count: 0,
        }
    }
}

impl Turn<'_> {
    pub(super) async fn run(mut self, message: String, reset_history: bool) {
        if reset_history {
            debug!("resetting history");
            self.conversation.clear();
        }
        if self.conversation.is_empty() {
            if let Some(prompt) = self.system_prompt {
                self.conversation.push(ModelMessage::system(prompt));
            }
        }
        self.conversation.push(ModelMessage::user(message));

        self.transition(TurnStage::Streaming);
        let Some(output) = self.stream_with_tools().await else {
            return;
        };
        let StreamOutput {
            content,
            calls,
            executed,
        } = output;

        if calls.is_empty() {
            self.conversation.push(ModelMessage::assistant(content));
            self.complete();
            return;
        }

        self.transition(TurnStage::Draining);
        self.drain(content, calls, executed).await;

        self.transition(TurnStage::Submitting);
        let Some(mut stream) = self.open_stream().await else {
            return;
        };

        self.transition(TurnStage::FinalStreaming);
        let mut content = String::new();
        loop {
            match stream.next_event().await {
                Ok(Some(ModelResponseEvent::MessageDelta(text))) => {
                    self.emit_content(&mut content, text);
                }
                Ok(Some(ModelResponseEvent::ToolCallDelta(delta))) => {
                    debug!("ignoring tool call in the final stream: {delta:?}");
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    debug!("final stream completed: {reason:?}");
                }
                Ok(None) => break,
                Err(err) => return self.fail(err),
            }
        }
        self.conversation.push(ModelMessage::assistant(content));
        self.complete();
    }

    /// Runs the first stream, dispatching every call as soon as it is
    /// ready. Returns `None` if the stream failed.
    async fn stream_with_tools(&mut self) -> Option<StreamOutput> {
        let mut stream = self.open_stream().await?;
        let mut assembler = Assembler::new();
        let mut content = String::new();
        let mut executed = HashMap::new();
        loop {
            match stream.next_event().await {
                Ok(Some(ModelResponseEvent::MessageDelta(text))) => {
                    self.emit_content(&mut content, text);
                }
                Ok(Some(ModelResponseEvent::ToolCallDelta(delta))) => {
                    let Some(ready) = assembler.push(delta) else {
                        continue;
                    };
                    let record = self.dispatch_eagerly(&ready).await;
                    executed.insert(
                        ready.slot_index,
                        EagerCall {
                            snapshot: ready,
                            record,
                        },
                    );
                }
                Ok(Some(ModelResponseEvent::Completed(reason))) => {
                    debug!("stream completed: {reason:?}");
                }
                Ok(None) => break,
                Err(err) => {
                    self.fail(err);
                    return None;
                }
            }
        }
        Some(StreamOutput {
            content,
            calls: assembler.finish(),
            executed,
        })
    }

    async fn dispatch_eagerly(&mut self, ready: &ReadyCall) -> ToolCallRecord {
        debug!("dispatching {} ({}) eagerly", ready.name, ready.id);
        let record =
            ToolCallRecord::new(&ready.id, &ready.name, &ready.raw_arguments);
        self.emit_tool_call(&record);
        let record = self.scheduler.execute_one(record).await;
        self.emit_tool_result(&record);
        record
    }

    /// Records the calls of the first stream, runs the ones that were not
    /// run eagerly, and appends one tool message per call.
    async fn drain(
        &mut self,
        content: String,
        calls: Vec<ToolCallFragment>,
        mut executed: HashMap<u32, EagerCall>,
    ) {
        let mut records = Vec::with_capacity(calls.len());
        let mut pending = vec![];
        for (position, fragment) in calls.iter().enumerate() {
            let mut record = ToolCallRecord::new(
                &fragment.id,
                &fragment.name,
                &fragment.arguments,
            );
            record.ensure_id(position);
            match executed.remove(&fragment.slot_index) {
                Some(eager) if eager.matches(fragment) => {
                    trace!("reusing the result of {}", eager.record.id);
                    records.push(eager.record);
                    continue;
                }
                Some(eager) => {
                    warn!(
                        "call {} changed after it was dispatched \
                         (arguments {:?} -> {:?}), running it again",
                        eager.snapshot.id,
                        eager.snapshot.raw_arguments,
                        fragment.arguments,
                    );
                }
                None => {}
            }
            pending.push(position);
            records.push(record);
        }

        self.conversation.push(ModelMessage::Assistant(AssistantMessage {
            content,
            tool_calls: records.iter().map(ToolCallRecord::to_request).collect(),
        }));

        if !pending.is_empty() {
            debug!("running {} remaining calls", pending.len());
            let batch: Vec<_> =
                pending.iter().map(|&pos| records[pos].clone()).collect();
            for record in &batch {
                self.emit_tool_call(record);
            }
            let finished =
                self.scheduler.execute_batch(batch, self.mode).await;
            for (&pos, record) in pending.iter().zip(finished) {
                self.emit_tool_result(&record);
                records[pos] = record;
            }
        }

        for record in &records {
            self.conversation.push(record.to_message());
        }
    }

    async fn open_stream(&mut self) -> Option<ModelStream> {
        let req = ModelRequest {
            messages: self.conversation.messages().to_vec(),
            tools: self.scheduler.registry().definitions(),
        };
        match self.model_client.open_stream(&req).await {
            Ok(stream) => Some(stream),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn emit_content(&mut self, content: &mut String, text: String) {
        if text.is_empty() {
            return;
        }
        content.push_str(&text);
        self.text.push_str(&text);
        self.emitter.emit(Event::Content { text });
    }

    fn emit_tool_call(&mut self, record: &ToolCallRecord) {
        self.tool_call_count += 1;
        self.emitter.emit(Event::ToolCall {
            id: record.id.clone(),
            name: record.name.clone(),
            arguments: record.arguments(),
        });
    }

    fn emit_tool_result(&self, record: &ToolCallRecord) {
        self.emitter.emit(Event::ToolResult {
            id: record.id.clone(),
            result: record.result.clone().unwrap_or_default(),
            success: record.success.unwrap_or_default(),
        });
    }

    fn complete(&mut self) {
        self.transition(TurnStage::Idle);
        self.emitter.emit(Event::TurnComplete {
            final_text: self.text.clone(),
            tool_call_count: self.tool_call_count,
        });
    }

    fn fail(&mut self, err: Box<dyn ModelProviderError>) {
        error!("model stream failed in {:?} stage: {err}", self.stage);
        self.transition(TurnStage::Idle);
        self.emitter.emit(Event::Error {
            message: format!("{err}"),
            code: err.kind().into(),
        });
    }

    #[inline]
    fn transition(&mut self, stage: TurnStage) {
        debug!("turn stage: {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }
}

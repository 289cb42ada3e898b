//! Conversation-related types.

use std::collections::HashSet;

use toolstream_model::{ModelMessage, Role};

/// The ordered message log of a conversation.
///
/// Messages are only ever appended, in causal order. The log can be cleared
/// as a whole when a turn asks for a history reset.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Returns the messages of the conversation.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the conversation has no message.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Checks that every assistant message requesting tool calls is directly
    /// followed by exactly one tool message per call, before any other
    /// message, and that no tool message is left unanswered or orphaned.
    pub fn is_consistent(&self) -> bool {
        let mut known_ids = HashSet::new();
        let mut iter = self.messages.iter().peekable();
        while let Some(msg) = iter.next() {
            match msg.role() {
                Role::Tool => return false,
                Role::Assistant if !msg.tool_calls().is_empty() => {
                    let mut pending: HashSet<&str> = HashSet::new();
                    for call in msg.tool_calls() {
                        if !known_ids.insert(call.id.as_str())
                            || !pending.insert(call.id.as_str())
                        {
                            return false;
                        }
                    }
                    while !pending.is_empty() {
                        let Some(reply) =
                            iter.next_if(|next| next.role() == Role::Tool)
                        else {
                            return false;
                        };
                        let answered = reply
                            .tool_call_ref()
                            .is_some_and(|id| pending.remove(id));
                        if !answered {
                            return false;
                        }
                    }
                }
                _ => {}
            }
        }
        true
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: ModelMessage) {
        trace!("appending a {:?} message", msg.role());
        self.messages.push(msg);
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }
}

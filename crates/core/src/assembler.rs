//! Incremental reconstruction of tool calls from streamed fragments.

mod json;

use std::collections::BTreeMap;

use serde_json::Value;
use toolstream_model::ToolCallDelta;

pub use json::is_complete;

/// A tool call being reconstructed from the fragments of one slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// The transport-assigned slot.
    pub slot_index: u32,
    /// The call id, empty until the transport sends it.
    pub id: String,
    /// The tool name, empty until the transport sends it.
    pub name: String,
    /// The argument text received so far.
    pub arguments: String,
    reported: bool,
}

impl ToolCallFragment {
    #[inline]
    fn new(slot_index: u32) -> Self {
        Self {
            slot_index,
            ..Default::default()
        }
    }

    /// Returns `true` if the fragment has everything needed to run it.
    #[inline]
    pub fn is_ready(&self) -> bool {
        !self.id.is_empty()
            && !self.name.is_empty()
            && is_complete(&self.arguments)
    }
}

/// A snapshot of a slot at the moment it became ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyCall {
    /// The slot this call was assembled in.
    pub slot_index: u32,
    /// The call id.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The argument text as streamed.
    pub raw_arguments: String,
    /// The parsed arguments.
    pub arguments: Value,
}

/// Merges tool call fragments of a single model stream, and tells when a
/// call is ready to be dispatched.
///
/// Every slot is reported ready at most once, at the first fragment that
/// makes it ready. Fragments arriving afterwards are still merged and show
/// up in [`Assembler::finish`].
#[derive(Debug, Default)]
pub struct Assembler {
    fragments: BTreeMap<u32, ToolCallFragment>,
}

impl Assembler {
    /// Creates an empty assembler.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a fragment, returning the call if its slot just became ready.
    pub fn push(&mut self, delta: ToolCallDelta) -> Option<ReadyCall> {
        let ToolCallDelta {
            index,
            id,
            name,
            arguments,
        } = delta;
        let fragment = self
            .fragments
            .entry(index)
            .or_insert_with(|| ToolCallFragment::new(index));

        if let Some(id) = id.filter(|id| !id.is_empty()) {
            fragment.id = id;
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            fragment.name = name;
        }
        if let Some(arguments) = arguments {
            fragment.arguments.push_str(&arguments);
        }

        if fragment.reported || !fragment.is_ready() {
            return None;
        }
        let arguments = serde_json::from_str(&fragment.arguments).ok()?;
        fragment.reported = true;
        trace!("slot {index} is ready: {}", fragment.name);
        Some(ReadyCall {
            slot_index: index,
            id: fragment.id.clone(),
            name: fragment.name.clone(),
            raw_arguments: fragment.arguments.clone(),
            arguments,
        })
    }

    /// Returns `true` if no fragment has been merged yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Consumes the assembler and returns the calls of this stream in slot
    /// order.
    ///
    /// Fragments without a name or without any argument text are dropped.
    pub fn finish(self) -> Vec<ToolCallFragment> {
        self.fragments
            .into_values()
            .filter(|fragment| {
                let keep =
                    !fragment.name.is_empty() && !fragment.arguments.is_empty();
                if !keep {
                    debug!("dropping incomplete slot {}", fragment.slot_index);
                }
                keep
            })
            .collect()
    }
}

//! Folding an event stream back into final values

use crate::types::{Citation, EventKind, OutputEvent, ParamDelta, ToolCallDelta};
use serde::Serialize;

/// Accumulated state of one tool call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolCallSummary {
    pub index: usize,
    pub id: String,
    pub name: String,

    /// Raw parameter text (raw delta mode)
    pub raw_params: String,

    /// Parameter name and value text, in the order they appeared (structured mode)
    pub params: Vec<(String, String)>,
}

impl ToolCallSummary {
    fn absorb(&mut self, delta: &ToolCallDelta) {
        if let Some(id) = &delta.id {
            self.id.push_str(id);
        }
        if let Some(name) = &delta.name {
            self.name.push_str(name);
        }
        match &delta.param {
            Some(ParamDelta::Raw { delta }) => self.raw_params.push_str(delta),
            Some(ParamDelta::Structured { name, value_delta }) => {
                match self.params.last_mut() {
                    Some((last, value)) if last == name => value.push_str(value_delta),
                    _ => self.params.push((name.clone(), value_delta.clone())),
                }
            }
            None => {}
        }
    }
}

/// Everything a consumer would reconstruct from a complete event stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamSummary {
    /// Answer text
    pub text: String,

    /// Thinking text
    pub thinking: String,

    /// Citations in emission order
    pub citations: Vec<Citation>,

    /// Search queries, by index
    pub search_queries: Vec<String>,

    /// Tool calls, by index
    pub tool_calls: Vec<ToolCallSummary>,

    /// Log probabilities of every token carried by the events, in order
    pub logprobs: Vec<f32>,
}

impl StreamSummary {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarize a complete event sequence
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a OutputEvent>) -> Self {
        let mut summary = Self::new();
        for event in events {
            summary.absorb(event);
        }
        summary
    }

    /// Fold one event into the summary
    pub fn absorb(&mut self, event: &OutputEvent) {
        self.logprobs.extend_from_slice(&event.logprobs.logprobs);

        match &event.kind {
            EventKind::TextChunk if event.is_thinking => self.thinking.push_str(&event.text),
            EventKind::TextChunk => self.text.push_str(&event.text),
            EventKind::Citation(citation) => self.citations.push(citation.clone()),
            EventKind::SearchQuery(query) => {
                if self.search_queries.len() <= query.index {
                    self.search_queries.resize(query.index + 1, String::new());
                }
                self.search_queries[query.index].push_str(&query.text);
            }
            EventKind::ToolCallDelta(delta) => {
                let call = match self.tool_calls.iter_mut().position(|c| c.index == delta.index) {
                    Some(pos) => &mut self.tool_calls[pos],
                    None => {
                        self.tool_calls.push(ToolCallSummary {
                            index: delta.index,
                            ..Default::default()
                        });
                        let last = self.tool_calls.len() - 1;
                        &mut self.tool_calls[last]
                    }
                };
                call.absorb(delta);
            }
        }
    }
}

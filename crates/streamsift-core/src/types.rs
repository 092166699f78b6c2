//! Core types for streamsift

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Token ids and their log probabilities, as parallel sequences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenLogProbs {
    /// Token ids from the model's vocabulary
    pub token_ids: Vec<u32>,

    /// Log probability of each token, parallel to `token_ids`
    pub logprobs: Vec<f32>,
}

impl TokenLogProbs {
    /// Build from parallel slices, rejecting sequences of unequal length
    pub fn from_slices(token_ids: &[u32], logprobs: &[f32]) -> Result<Self> {
        if token_ids.len() != logprobs.len() {
            return Err(Error::LogprobMismatch {
                token_ids: token_ids.len(),
                logprobs: logprobs.len(),
            });
        }
        Ok(Self {
            token_ids: token_ids.to_vec(),
            logprobs: logprobs.to_vec(),
        })
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    /// Check if no tokens are recorded
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Move all tokens of `other` onto the end of this sequence
    pub fn append(&mut self, mut other: TokenLogProbs) {
        self.token_ids.append(&mut other.token_ids);
        self.logprobs.append(&mut other.logprobs);
    }

    /// Take the tokens out, leaving this sequence empty
    pub fn take(&mut self) -> TokenLogProbs {
        std::mem::take(self)
    }
}

/// Attribution of a citation to one tool invocation and some of its results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Index of the tool call whose output is cited
    pub tool_call_index: usize,

    /// Indices into that tool call's results
    pub tool_result_indices: Vec<usize>,
}

/// A cited span of the answer (or thinking) text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Character offset of the first cited character
    pub start_index: usize,

    /// Character offset one past the last cited character
    pub end_index: usize,

    /// The cited text, exactly as it was emitted
    pub text: String,

    /// Sources backing the citation, in the order they were written
    pub sources: Vec<Source>,

    /// Whether the citation appeared inside a thinking region
    pub is_thinking: bool,
}

/// Incremental text of one extracted search query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryDelta {
    /// Index of the query within the generation
    pub index: usize,

    /// Text appended to the query
    pub text: String,
}

/// Parameter payload of a tool-call delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ParamDelta {
    /// A named parameter and a piece of its JSON value text
    Structured { name: String, value_delta: String },

    /// A piece of the raw JSON text of the whole parameter object
    Raw { delta: String },
}

/// Incremental update to one tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index of the tool call, stable for the invocation
    pub index: usize,

    /// Call id, set only on the delta that first reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool name, set only on the delta that first reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parameter text carried by this delta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<ParamDelta>,
}

impl ToolCallDelta {
    /// Fold `next` into this delta when both describe a contiguous piece of
    /// the same call. Returns false when `next` has to stay separate.
    pub fn merge(&mut self, next: &ToolCallDelta) -> bool {
        if next.index != self.index {
            return false;
        }
        if (next.id.is_some() && self.id.is_some()) || (next.name.is_some() && self.name.is_some())
        {
            return false;
        }
        // Id and name always precede parameters within a call
        if self.param.is_some() && (next.id.is_some() || next.name.is_some()) {
            return false;
        }

        if let Some(next_param) = &next.param {
            if self.param.is_none() {
                self.param = Some(next_param.clone());
            } else {
                match (&mut self.param, next_param) {
                    (
                        Some(ParamDelta::Structured { name, value_delta }),
                        ParamDelta::Structured {
                            name: next_name,
                            value_delta: next_value,
                        },
                    ) if *name == *next_name => value_delta.push_str(next_value),
                    (Some(ParamDelta::Raw { delta }), ParamDelta::Raw { delta: next_delta }) => {
                        delta.push_str(next_delta)
                    }
                    _ => return false,
                }
            }
        }
        if next.id.is_some() {
            self.id.clone_from(&next.id);
        }
        if next.name.is_some() {
            self.name.clone_from(&next.name);
        }
        true
    }
}

/// What kind of structure an output event carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Plain answer or thinking text
    TextChunk,

    /// A closed citation span
    Citation(Citation),

    /// Search query text
    SearchQuery(SearchQueryDelta),

    /// Tool-call progress
    ToolCallDelta(ToolCallDelta),
}

/// One unit of filter output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Structured payload
    pub kind: EventKind,

    /// Text carried by the event (empty for tool-call deltas)
    pub text: String,

    /// Tokens that contributed to this event
    #[serde(default, skip_serializing_if = "TokenLogProbs::is_empty")]
    pub logprobs: TokenLogProbs,

    /// Emitted from a thinking/reasoning region
    pub is_thinking: bool,

    /// Emitted after an answer region was closed
    pub is_post_answer: bool,
}

impl OutputEvent {
    /// Create an event with no token information and no provenance flags
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            logprobs: TokenLogProbs::default(),
            is_thinking: false,
            is_post_answer: false,
        }
    }

    /// Create a plain text chunk
    pub fn text_chunk(text: impl Into<String>) -> Self {
        Self::new(EventKind::TextChunk, text)
    }

    /// Check if this is a text chunk
    pub fn is_text(&self) -> bool {
        matches!(self.kind, EventKind::TextChunk)
    }

    /// The citation, if this is a citation event
    pub fn citation(&self) -> Option<&Citation> {
        match &self.kind {
            EventKind::Citation(c) => Some(c),
            _ => None,
        }
    }

    /// The search query delta, if this is a search query event
    pub fn search_query(&self) -> Option<&SearchQueryDelta> {
        match &self.kind {
            EventKind::SearchQuery(q) => Some(q),
            _ => None,
        }
    }

    /// The tool-call delta, if this is a tool-call event
    pub fn tool_call(&self) -> Option<&ToolCallDelta> {
        match &self.kind {
            EventKind::ToolCallDelta(d) => Some(d),
            _ => None,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::TextChunk => "text_chunk",
            EventKind::Citation(_) => "citation",
            EventKind::SearchQuery(_) => "search_query",
            EventKind::ToolCallDelta(_) => "tool_call_delta",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logprobs_from_slices() {
        let lp = TokenLogProbs::from_slices(&[1, 2], &[-0.1, -0.2]).unwrap();
        assert_eq!(lp.len(), 2);

        let err = TokenLogProbs::from_slices(&[1, 2], &[-0.1]).unwrap_err();
        assert!(matches!(err, Error::LogprobMismatch { token_ids: 2, logprobs: 1 }));
    }

    #[test]
    fn test_logprobs_append_and_take() {
        let mut lp = TokenLogProbs::from_slices(&[1, 2], &[0.1, 0.2]).unwrap();
        lp.append(TokenLogProbs::from_slices(&[3, 4], &[0.3, 0.4]).unwrap());
        assert_eq!(lp.token_ids, vec![1, 2, 3, 4]);
        assert_eq!(lp.logprobs, vec![0.1, 0.2, 0.3, 0.4]);

        let taken = lp.take();
        assert_eq!(taken.len(), 4);
        assert!(lp.is_empty());
    }

    #[test]
    fn test_merge_raw_deltas() {
        let mut first = ToolCallDelta {
            index: 0,
            id: Some("0".into()),
            ..Default::default()
        };
        let name = ToolCallDelta {
            index: 0,
            name: Some("add".into()),
            ..Default::default()
        };
        let params = |s: &str| ToolCallDelta {
            index: 0,
            param: Some(ParamDelta::Raw { delta: s.into() }),
            ..Default::default()
        };

        assert!(first.merge(&name));
        assert!(first.merge(&params("{\"a\": ")));
        assert!(first.merge(&params("6}")));
        assert_eq!(first.name.as_deref(), Some("add"));
        assert_eq!(first.param, Some(ParamDelta::Raw { delta: "{\"a\": 6}".into() }));
    }

    #[test]
    fn test_merge_keeps_calls_and_params_apart() {
        let mut a = ToolCallDelta {
            index: 0,
            param: Some(ParamDelta::Structured {
                name: "a".into(),
                value_delta: "1".into(),
            }),
            ..Default::default()
        };
        let b = ToolCallDelta {
            index: 0,
            param: Some(ParamDelta::Structured {
                name: "b".into(),
                value_delta: String::new(),
            }),
            ..Default::default()
        };
        let other_call = ToolCallDelta {
            index: 1,
            id: Some("1".into()),
            ..Default::default()
        };

        assert!(!a.merge(&b));
        assert!(!a.merge(&other_call));
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = OutputEvent::new(
            EventKind::SearchQuery(SearchQueryDelta {
                index: 1,
                text: "penguins".into(),
            }),
            "penguins",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["type"], "search_query");
        assert_eq!(json["kind"]["index"], 1);
        assert!(json.get("logprobs").is_none());

        let back: OutputEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

//! Filter configuration
//!
//! A [`FilterConfig`] is assembled once, either in code through
//! [`FilterConfig::builder`], from one of the [`presets`](crate::presets),
//! or from a YAML document, and then moved into a
//! [`FilterEngine`](crate::FilterEngine). Building never fails: toggles that
//! do not apply to the selected dialect are ignored, and unusable values
//! (empty stop strings, an empty prefix) are dropped.

use crate::dialect::{Dialect, Grammar};
use crate::stop::{StopKind, StopSequence};
use serde::{Deserialize, Serialize};
use std::path::Path;
use streamsift_core::{Error, Result};

/// When tool-call deltas are released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStreaming {
    /// As soon as the text arrives
    #[default]
    Incremental,

    /// Once per tool call, when its object closes
    OnCompletion,
}

/// Shape of tool-call parameter deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamFormat {
    /// Raw text of the whole parameter object
    #[default]
    Raw,

    /// One stream per named parameter
    Structured,
}

/// Abort generations that loop on the same token sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionLimit {
    /// Identical consecutive repetitions that trigger the guard
    pub limit: usize,

    /// Longest token sequence considered
    pub max_sequence_len: usize,
}

/// Complete configuration of one filter engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Markup grammar
    #[serde(default)]
    pub dialect: Dialect,

    /// Recognize citation spans in grounded answers and thinking
    #[serde(default)]
    pub citations: bool,

    /// Recognize search-query sections
    #[serde(default)]
    pub search_queries: bool,

    /// Recognize tool-call (multi-hop) sections
    #[serde(default)]
    pub tool_calls: bool,

    /// Emit non-grounded answer text as it streams
    #[serde(default)]
    pub stream_non_grounded_answer: bool,

    /// When tool-call deltas are released
    #[serde(default)]
    pub tool_call_streaming: ToolCallStreaming,

    /// Raw or per-parameter deltas
    #[serde(default)]
    pub param_format: ParamFormat,

    /// Emit thinking text (flagged `is_thinking`)
    #[serde(default = "default_true")]
    pub emit_thinking: bool,

    /// Strip leading whitespace of the output
    #[serde(default)]
    pub left_trim: bool,

    /// Strip trailing whitespace of the output
    #[serde(default)]
    pub right_trim: bool,

    /// Literal prefix removed from the start of the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_prefix: Option<String>,

    /// `write` calls gathered into one text chunk (0 = emit as available)
    ///
    /// Only calls that produced text count. A chunk holding part of an open
    /// citation waits for the citation to close.
    #[serde(default)]
    pub chunk_size: usize,

    /// Stop sequences in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<StopSequence>,

    /// Literal tokens removed from the stream
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_tokens: Vec<String>,

    /// Dialect markers treated as plain text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_markers: Vec<String>,

    /// Optional repetition guard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_limit: Option<RepetitionLimit>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Plain,
            citations: false,
            search_queries: false,
            tool_calls: false,
            stream_non_grounded_answer: false,
            tool_call_streaming: ToolCallStreaming::Incremental,
            param_format: ParamFormat::Raw,
            emit_thinking: default_true(),
            left_trim: false,
            right_trim: false,
            trim_prefix: None,
            chunk_size: 0,
            stops: Vec::new(),
            drop_tokens: Vec::new(),
            disabled_markers: Vec::new(),
            repetition_limit: None,
        }
    }
}

impl FilterConfig {
    /// Start building a configuration from the plain defaults
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    /// Continue building from this configuration
    pub fn into_builder(self) -> FilterConfigBuilder {
        FilterConfigBuilder { config: self }
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FilterConfig = serde_yaml::from_str(yaml)?;
        Ok(config.normalized())
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Marker grammar for the dialect and enabled features
    pub fn grammar(&self) -> Grammar {
        Grammar::new(
            self.dialect,
            self.tool_calls,
            self.search_queries,
            &self.disabled_markers,
        )
    }

    /// Whether citation spans are recognized at all
    pub fn citations_active(&self) -> bool {
        self.citations && self.dialect.citation_syntax().is_some()
    }

    /// Drop values that cannot take effect: empty literals, duplicate stops
    /// (the first registration wins), and a repetition guard that could
    /// never trigger.
    pub fn normalized(mut self) -> Self {
        let mut seen: Vec<String> = Vec::new();
        self.stops.retain(|stop| {
            if stop.text.is_empty() || seen.contains(&stop.text) {
                return false;
            }
            seen.push(stop.text.clone());
            true
        });

        let mut seen: Vec<String> = Vec::new();
        self.drop_tokens.retain(|token| {
            if token.is_empty() || seen.contains(token) {
                return false;
            }
            seen.push(token.clone());
            true
        });

        if self.trim_prefix.as_deref() == Some("") {
            self.trim_prefix = None;
        }

        if let Some(limit) = self.repetition_limit {
            if limit.limit < 2 || limit.max_sequence_len == 0 {
                self.repetition_limit = None;
            }
        }

        self
    }
}

/// Builder for [`FilterConfig`]; setters are last-write-wins
#[derive(Debug, Clone, Default)]
pub struct FilterConfigBuilder {
    config: FilterConfig,
}

impl FilterConfigBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    pub fn citations(mut self, enabled: bool) -> Self {
        self.config.citations = enabled;
        self
    }

    pub fn search_queries(mut self, enabled: bool) -> Self {
        self.config.search_queries = enabled;
        self
    }

    pub fn tool_calls(mut self, enabled: bool) -> Self {
        self.config.tool_calls = enabled;
        self
    }

    pub fn stream_non_grounded_answer(mut self, enabled: bool) -> Self {
        self.config.stream_non_grounded_answer = enabled;
        self
    }

    pub fn tool_call_streaming(mut self, streaming: ToolCallStreaming) -> Self {
        self.config.tool_call_streaming = streaming;
        self
    }

    pub fn param_format(mut self, format: ParamFormat) -> Self {
        self.config.param_format = format;
        self
    }

    pub fn emit_thinking(mut self, enabled: bool) -> Self {
        self.config.emit_thinking = enabled;
        self
    }

    pub fn left_trim(mut self, enabled: bool) -> Self {
        self.config.left_trim = enabled;
        self
    }

    pub fn right_trim(mut self, enabled: bool) -> Self {
        self.config.right_trim = enabled;
        self
    }

    pub fn trim_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.trim_prefix = Some(prefix.into());
        self
    }

    /// `write` calls per text chunk; 0 disables chunking
    pub fn chunk_size(mut self, writes: usize) -> Self {
        self.config.chunk_size = writes;
        self
    }

    /// Stop that stays in the output
    pub fn inclusive_stop(mut self, text: impl Into<String>) -> Self {
        self.config.stops.push(StopSequence::new(text, StopKind::Inclusive));
        self
    }

    /// Stop that is removed from the output
    pub fn exclusive_stop(mut self, text: impl Into<String>) -> Self {
        self.config.stops.push(StopSequence::new(text, StopKind::Exclusive));
        self
    }

    pub fn inclusive_stops<I, S>(self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        stops.into_iter().fold(self, |b, s| b.inclusive_stop(s))
    }

    pub fn exclusive_stops<I, S>(self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        stops.into_iter().fold(self, |b, s| b.exclusive_stop(s))
    }

    /// Remove every occurrence of `token` from the stream
    pub fn drop_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if !self.config.drop_tokens.contains(&token) {
            self.config.drop_tokens.push(token);
        }
        self
    }

    /// Treat a dialect marker as plain text
    pub fn disable_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !self.config.disabled_markers.contains(&marker) {
            self.config.disabled_markers.push(marker);
        }
        self
    }

    pub fn repetition_limit(mut self, limit: usize, max_sequence_len: usize) -> Self {
        self.config.repetition_limit = Some(RepetitionLimit {
            limit,
            max_sequence_len,
        });
        self
    }

    /// Finish the configuration
    pub fn build(self) -> FilterConfig {
        self.config.normalized()
    }
}

fn default_true() -> bool {
    true
}

//! Filter engine
//!
//! Orchestrates one generation stream: decoded text goes through the
//! [`MarkupScanner`] (markers, stops, dropped tokens), is routed by region
//! to the citation scanner or the tool-call extractor, and leaves through
//! the [`Emitter`] as [`OutputEvent`]s.
//!
//! ```text
//! Idle → Answering ⇄ (Thinking | Citing | ToolCalling | SearchQuerying | Ignoring)
//!      → Stopped → Flushed
//! ```

use crate::config::FilterConfig;
use crate::dialect::{CitationSyntax, MarkerAction, Region};
use crate::emit::{Channel, Emitter};
use crate::extract::{CitationItem, CitationScanner, ToolCallExtractor};
use crate::repetition::RepetitionGuard;
use crate::scanner::{MarkupScanner, ScanItem};
use crate::stop::{StopMatcher, StopSequence};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use streamsift_core::{Error, OutputEvent, Result, TokenLogProbs, Utf8Decoder};
use tracing::{debug, trace, warn};

/// Externally visible engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState {
    /// Nothing written yet
    Idle,

    /// In answer (or plain) text
    Answering,

    /// In a thinking region
    Thinking,

    /// Inside an open citation span
    Citing,

    /// In a tool-call section
    ToolCalling,

    /// In a search-query section
    SearchQuerying,

    /// In a discarded section
    Ignoring,

    /// A stop sequence or the repetition guard ended the stream
    Stopped,

    /// `flush` was called
    Flushed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
    Flushed,
}

/// Streaming post-processor for one generation
///
/// ```rust
/// use streamsift_filter::{presets, FilterEngine};
///
/// let mut engine = FilterEngine::new(presets::command3());
/// let mut events = engine.write("<|START_RESPONSE|>Hello", &[], &[]).unwrap();
/// events.extend(engine.flush().unwrap());
///
/// let text: String = events.iter().filter(|e| e.is_text()).map(|e| e.text.as_str()).collect();
/// assert_eq!(text, "Hello");
/// ```
#[derive(Debug)]
pub struct FilterEngine {
    config: FilterConfig,
    phase: Phase,
    region: Region,
    region_has_text: bool,
    citation_syntax: Option<CitationSyntax>,
    citations: Option<CitationScanner>,
    scanner: MarkupScanner,
    tools: ToolCallExtractor,
    emitter: Emitter,
    decoder: Utf8Decoder,
    guard: Option<RepetitionGuard>,
}

impl FilterEngine {
    /// Create an engine that owns `config`
    pub fn new(config: FilterConfig) -> Self {
        let config = config.normalized();
        let grammar = config.grammar();
        let scanner = MarkupScanner::new(
            &grammar,
            StopMatcher::new(&config.stops),
            &config.drop_tokens,
        );
        let tools = ToolCallExtractor::new(
            config.dialect.tool_call_keys(),
            config.param_format,
            config.tool_call_streaming,
        );
        let citation_syntax = if config.citations_active() {
            config.dialect.citation_syntax()
        } else {
            None
        };

        let mut engine = Self {
            emitter: Emitter::new(&config),
            guard: config.repetition_limit.map(RepetitionGuard::new),
            region: config.dialect.default_region(),
            region_has_text: false,
            citation_syntax,
            citations: None,
            scanner,
            tools,
            decoder: Utf8Decoder::new(),
            phase: Phase::Idle,
            config,
        };
        engine.open_region(engine.region, false);
        engine
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Region the scanner is in
    pub fn region(&self) -> Region {
        self.region
    }

    /// Current state
    pub fn state(&self) -> FilterState {
        match self.phase {
            Phase::Idle => FilterState::Idle,
            Phase::Stopped => FilterState::Stopped,
            Phase::Flushed => FilterState::Flushed,
            Phase::Running => {
                if self.citations.as_ref().is_some_and(|c| c.is_inside()) {
                    return FilterState::Citing;
                }
                match self.region {
                    Region::Text | Region::Answer | Region::GroundedAnswer => {
                        FilterState::Answering
                    }
                    Region::Thinking => FilterState::Thinking,
                    Region::ToolCall => FilterState::ToolCalling,
                    Region::SearchQuery => FilterState::SearchQuerying,
                    Region::Ignore => FilterState::Ignoring,
                }
            }
        }
    }

    /// Process one decoded fragment
    ///
    /// `token_ids` and `logprobs` are parallel and may be empty; a fragment
    /// can stand for any number of tokens. Returns the events the fragment
    /// completed, possibly none.
    pub fn write(
        &mut self,
        text: &str,
        token_ids: &[u32],
        logprobs: &[f32],
    ) -> Result<Vec<OutputEvent>> {
        if self.phase == Phase::Flushed {
            return Err(Error::AlreadyFlushed);
        }
        let tokens = TokenLogProbs::from_slices(token_ids, logprobs)?;
        self.write_tokens(text, tokens)
    }

    /// Process a fragment of raw UTF-8 bytes
    ///
    /// An incomplete character at the end is carried over to the next call.
    pub fn write_bytes(
        &mut self,
        bytes: &[u8],
        token_ids: &[u32],
        logprobs: &[f32],
    ) -> Result<Vec<OutputEvent>> {
        if self.phase == Phase::Flushed {
            return Err(Error::AlreadyFlushed);
        }
        let tokens = TokenLogProbs::from_slices(token_ids, logprobs)?;
        let text = self.decoder.push(bytes)?;
        self.write_tokens(&text, tokens)
    }

    /// Finish the stream
    ///
    /// Pending stop prefixes become text, open spans fall back to plain
    /// text, right-trim is applied, and buffered chunks are released. The
    /// engine accepts no calls afterwards.
    pub fn flush(&mut self) -> Result<Vec<OutputEvent>> {
        match self.phase {
            Phase::Flushed => Err(Error::AlreadyFlushed),
            Phase::Idle => {
                self.phase = Phase::Flushed;
                Ok(Vec::new())
            }
            Phase::Stopped => {
                self.phase = Phase::Flushed;
                Ok(self.emitter.take_events())
            }
            Phase::Running => {
                self.phase = Phase::Flushed;
                self.decoder.finish()?;

                let started = Instant::now();
                if !self.drain_scanner(true) {
                    self.finish_stream();
                }
                let events = self.emitter.take_events();
                debug!(events = events.len(), "stream flushed");
                record(&events, started);
                Ok(events)
            }
        }
    }

    fn write_tokens(&mut self, text: &str, tokens: TokenLogProbs) -> Result<Vec<OutputEvent>> {
        if self.phase == Phase::Stopped {
            trace!("write after stop ignored");
            return Ok(Vec::new());
        }
        self.phase = Phase::Running;
        let started = Instant::now();
        metrics::counter!("streamsift_fragments_total").increment(1);

        if let Some(guard) = self.guard.as_mut() {
            if let Err(e) = guard.observe(&tokens.token_ids) {
                warn!(error = %e, "stopping generation");
                metrics::counter!("streamsift_stops_total", "kind" => "repetition").increment(1);
                // Events finalized here are handed out by flush
                self.finish_stream();
                self.emitter.discard_logprobs();
                self.phase = Phase::Stopped;
                return Err(e);
            }
        }

        self.emitter.add_logprobs(tokens);
        self.scanner.push(text);
        self.drain_scanner(false);
        self.emitter.end_write();

        let events = self.emitter.take_events();
        trace!(
            bytes = text.len(),
            events = events.len(),
            pending = self.scanner.pending().len(),
            "fragment processed"
        );
        record(&events, started);
        Ok(events)
    }

    /// Process every item the scanner can decide. Returns true on a stop.
    fn drain_scanner(&mut self, at_end: bool) -> bool {
        while let Some(item) = self.scanner.next_item(self.region, at_end) {
            match item {
                ScanItem::Text(text) => self.route_text(&text),
                ScanItem::Dropped(token) => trace!(token = %token, "dropped token"),
                ScanItem::Marker { action, literal } => self.apply_marker(action, &literal),
                ScanItem::Stop(stop) => {
                    self.halt(&stop);
                    return true;
                }
            }
        }
        false
    }

    fn route_text(&mut self, text: &str) {
        match self.region {
            Region::Ignore => {}
            Region::ToolCall => {
                for delta in self.tools.push(text) {
                    self.emitter.tool_call(delta);
                }
            }
            _ => {
                if self.emitter.channel().is_none() {
                    return;
                }
                if !text.trim().is_empty() {
                    self.region_has_text = true;
                }
                match self.citations.as_mut() {
                    Some(scanner) => {
                        let items = scanner.push(text);
                        self.apply_citation_items(items);
                    }
                    None => self.emitter.text(text),
                }
            }
        }
    }

    fn apply_citation_items(&mut self, items: Vec<CitationItem>) {
        for item in items {
            match item {
                CitationItem::Text(text) => self.emitter.text(&text),
                CitationItem::Open => self.emitter.open_citation(),
                CitationItem::Close(sources) => self.emitter.close_citation(sources),
            }
        }
    }

    fn apply_marker(&mut self, action: MarkerAction, literal: &str) {
        match action {
            MarkerAction::Enter(next) => {
                debug!(from = ?self.region, to = ?next, marker = literal, "region change");
                self.leave_region();
                self.open_region(next, true);
            }
            MarkerAction::NextSearchQuery => {
                trace!(index = self.emitter.search_query_index(), "next search query");
                self.emitter.next_search_query();
            }
        }
    }

    fn channel_for(&self, region: Region) -> Option<Channel> {
        match region {
            Region::Text | Region::GroundedAnswer => Some(Channel::Answer),
            Region::Answer if self.config.stream_non_grounded_answer => Some(Channel::Answer),
            Region::Thinking if self.config.emit_thinking => Some(Channel::Thinking),
            Region::SearchQuery => Some(Channel::SearchQuery),
            Region::Answer | Region::Thinking | Region::Ignore | Region::ToolCall => None,
        }
    }

    fn open_region(&mut self, region: Region, by_marker: bool) {
        self.region = region;
        self.region_has_text = false;

        if by_marker {
            match region {
                Region::Answer | Region::Thinking => self.emitter.arm_left_trim(),
                Region::GroundedAnswer => {
                    self.emitter.reset_answer_offsets();
                    if self.config.stream_non_grounded_answer {
                        self.emitter.arm_left_trim();
                    }
                }
                _ => {}
            }
            if region == Region::Thinking {
                self.emitter.enable_right_trim();
            }
        }

        match self.channel_for(region) {
            Some(Channel::SearchQuery) => self.emitter.next_search_query(),
            Some(channel) => {
                self.emitter.begin(channel);
                if matches!(region, Region::GroundedAnswer | Region::Thinking) {
                    self.citations = self.citation_syntax.map(CitationScanner::new);
                }
            }
            None => {}
        }
    }

    fn leave_region(&mut self) {
        if let Some(mut scanner) = self.citations.take() {
            let (items, unclosed) = scanner.finish();
            self.apply_citation_items(items);
            if unclosed {
                warn!(region = ?self.region, "citation left open; its text stays uncited");
                metrics::counter!("streamsift_markup_fallbacks_total", "span" => "citation")
                    .increment(1);
                self.emitter.cancel_citation();
            }
        }

        if self.region == Region::ToolCall {
            let (deltas, unclosed) = self.tools.finish();
            for delta in deltas {
                self.emitter.tool_call(delta);
            }
            if unclosed {
                metrics::counter!("streamsift_markup_fallbacks_total", "span" => "tool_call")
                    .increment(1);
            }
        }

        if self.region.is_answer() && self.region_has_text {
            self.emitter.set_post_answer();
        }
        self.emitter.end();
    }

    fn halt(&mut self, stop: &StopSequence) {
        debug!(
            stop = %stop.text,
            kind = stop.kind.as_str(),
            region = ?self.region,
            "stop sequence matched"
        );
        metrics::counter!("streamsift_stops_total", "kind" => stop.kind.as_str()).increment(1);

        if let Some(text) = stop.retained_text() {
            self.route_text(text);
        }
        self.finish_stream();
        self.emitter.discard_logprobs();
        self.phase = Phase::Stopped;
    }

    fn finish_stream(&mut self) {
        self.leave_region();
        self.emitter.finish();
    }
}

fn record(events: &[OutputEvent], started: Instant) {
    for event in events {
        metrics::counter!("streamsift_events_total", "kind" => event.kind_name()).increment(1);
    }
    metrics::histogram!("streamsift_write_latency_us").record(started.elapsed().as_micros() as f64);
}

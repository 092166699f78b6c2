//! Trim and chunk pipeline
//!
//! The [`Emitter`] is the last stage before events leave the engine. It
//! applies prefix, left, and right trimming to channel text, counts the
//! characters it commits so citation offsets always index the text that was
//! actually emitted, groups text into chunks of `chunk_size` writes, and
//! attaches pending token log-probabilities to the next content event.

use crate::config::FilterConfig;
use crate::extract::SearchQueryTracker;
use streamsift_core::{
    Citation, EventKind, OutputEvent, SearchQueryDelta, Source, TokenLogProbs, ToolCallDelta,
};
use tracing::trace;

/// Output channel of committed text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Answer,
    Thinking,
    SearchQuery,
}

/// Literal prefix still waiting to be matched against the first answer text
#[derive(Debug)]
struct PrefixTrim {
    literal: String,
    buffer: String,
}

#[derive(Debug)]
struct OpenCitation {
    channel: Channel,
    start: usize,
    text: String,
}

#[derive(Debug)]
struct Chunk {
    text: String,
    writes: usize,
    is_thinking: bool,
    is_post_answer: bool,
}

/// Turns channel text and structure into output events
#[derive(Debug)]
pub struct Emitter {
    chunk_size: usize,
    left_pending: bool,
    right_trim: bool,
    prefix: Option<PrefixTrim>,
    channel: Option<Channel>,
    held_ws: String,
    answer_chars: usize,
    thinking_chars: usize,
    citation: Option<OpenCitation>,
    chunk: Option<Chunk>,
    chunk_touched: bool,
    logprobs: TokenLogProbs,
    post_answer: bool,
    queries: SearchQueryTracker,
    out: Vec<OutputEvent>,
}

impl Emitter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            left_pending: config.left_trim,
            right_trim: config.right_trim,
            prefix: config.trim_prefix.clone().map(|literal| PrefixTrim {
                literal,
                buffer: String::new(),
            }),
            channel: None,
            held_ws: String::new(),
            answer_chars: 0,
            thinking_chars: 0,
            citation: None,
            chunk: None,
            chunk_touched: false,
            logprobs: TokenLogProbs::default(),
            post_answer: false,
            queries: SearchQueryTracker::new(),
            out: Vec::new(),
        }
    }

    /// Tokens of the current call; they ride on the next content event
    pub fn add_logprobs(&mut self, logprobs: TokenLogProbs) {
        self.logprobs.append(logprobs);
    }

    /// Forget tokens that no event will carry
    pub fn discard_logprobs(&mut self) {
        self.logprobs = TokenLogProbs::default();
    }

    /// Strip leading whitespace of the next committed text
    pub fn arm_left_trim(&mut self) {
        self.left_pending = true;
    }

    /// Hold trailing whitespace for the rest of the stream
    pub fn enable_right_trim(&mut self) {
        self.right_trim = true;
    }

    /// Flag everything but thinking as following a closed answer
    pub fn set_post_answer(&mut self) {
        self.post_answer = true;
    }

    /// Restart answer offsets at zero
    pub fn reset_answer_offsets(&mut self) {
        self.answer_chars = 0;
    }

    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    pub fn search_query_index(&self) -> usize {
        self.queries.index()
    }

    /// Route following text to `channel`
    pub fn begin(&mut self, channel: Channel) {
        self.end();
        self.channel = Some(channel);
    }

    /// Close the current channel, dropping whitespace held by right-trim
    pub fn end(&mut self) {
        self.resolve_prefix();
        self.held_ws.clear();
        if let Some(citation) = self.citation.take() {
            trace!(start = citation.start, "dropping citation left open at channel end");
        }
        self.flush_chunk();
        self.channel = None;
    }

    /// Start the next search query
    ///
    /// Used both when a query section starts and at each separator.
    pub fn next_search_query(&mut self) {
        self.end();
        self.queries.next();
        self.left_pending = true;
        self.channel = Some(Channel::SearchQuery);
    }

    /// Text for the current channel; ignored when no channel is open
    pub fn text(&mut self, text: &str) {
        let Some(channel) = self.channel else {
            return;
        };

        if channel == Channel::Answer {
            if let Some(prefix) = self.prefix.as_mut() {
                prefix.buffer.push_str(text);
                if prefix.buffer.starts_with(&prefix.literal) {
                    let rest = prefix.buffer[prefix.literal.len()..].to_string();
                    self.prefix = None;
                    self.trim_and_commit(channel, &rest);
                } else if !prefix.literal.starts_with(&prefix.buffer) {
                    let released = std::mem::take(&mut prefix.buffer);
                    self.prefix = None;
                    self.trim_and_commit(channel, &released);
                }
                return;
            }
        }

        self.trim_and_commit(channel, text);
    }

    /// A citation span opened in the current channel
    pub fn open_citation(&mut self) {
        let Some(channel) = self.channel else {
            return;
        };
        self.resolve_prefix();

        // Held whitespace is committed before any cited text
        let start = self.counter(channel) + self.held_ws.chars().count();
        self.citation = Some(OpenCitation {
            channel,
            start,
            text: String::new(),
        });
    }

    /// The open citation closed with `sources`
    pub fn close_citation(&mut self, sources: Vec<Source>) {
        self.resolve_prefix();
        let Some(open) = self.citation.take() else {
            return;
        };

        let end_index = self.counter(open.channel);
        let start_index = open.start.min(end_index);
        let is_thinking = open.channel == Channel::Thinking;

        self.flush_chunk();
        let citation = Citation {
            start_index,
            end_index,
            text: open.text,
            sources,
            is_thinking,
        };
        let text = citation.text.clone();
        let mut event = OutputEvent::new(EventKind::Citation(citation), text);
        event.is_thinking = is_thinking;
        event.is_post_answer = self.post_answer && !is_thinking;
        self.out.push(event);
    }

    /// Forget an open citation whose sources never arrived
    pub fn cancel_citation(&mut self) {
        self.citation = None;
    }

    /// Emit a tool-call delta after any buffered text
    pub fn tool_call(&mut self, delta: ToolCallDelta) {
        self.flush_chunk();
        let mut event = OutputEvent::new(EventKind::ToolCallDelta(delta), String::new());
        event.logprobs = self.logprobs.take();
        event.is_post_answer = self.post_answer;
        self.out.push(event);
    }

    /// One `write` call is done
    ///
    /// A chunk is emitted once `chunk_size` writes have added text to it.
    /// An open citation keeps its chunk buffered until it closes.
    pub fn end_write(&mut self) {
        let Some(chunk) = self.chunk.as_mut() else {
            return;
        };
        if std::mem::take(&mut self.chunk_touched) {
            chunk.writes += 1;
        }
        if chunk.writes >= self.chunk_size.max(1) && self.citation.is_none() {
            self.flush_chunk();
        }
    }

    /// End of stream: release everything
    pub fn finish(&mut self) {
        self.end();
    }

    /// Events produced since the last call
    pub fn take_events(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.out)
    }

    /// A partially matched prefix stops waiting and becomes text
    fn resolve_prefix(&mut self) {
        if self.channel != Some(Channel::Answer) {
            return;
        }
        let buffered = match self.prefix.as_mut() {
            Some(prefix) if !prefix.buffer.is_empty() => std::mem::take(&mut prefix.buffer),
            _ => return,
        };
        self.prefix = None;
        self.trim_and_commit(Channel::Answer, &buffered);
    }

    fn trim_and_commit(&mut self, channel: Channel, text: &str) {
        let mut text = text;
        if self.left_pending {
            text = text.trim_start();
            if text.is_empty() {
                return;
            }
            self.left_pending = false;
        }

        if !self.right_trim {
            self.commit(channel, text);
            return;
        }

        let mut joined = std::mem::take(&mut self.held_ws);
        joined.push_str(text);
        let body = joined.trim_end().len();
        if body == 0 {
            self.held_ws = joined;
            return;
        }
        self.held_ws = joined.split_off(body);
        self.commit(channel, &joined);
    }

    fn counter(&self, channel: Channel) -> usize {
        match channel {
            Channel::Answer => self.answer_chars,
            Channel::Thinking => self.thinking_chars,
            Channel::SearchQuery => 0,
        }
    }

    fn commit(&mut self, channel: Channel, text: &str) {
        if text.is_empty() {
            return;
        }
        let chars = text.chars().count();
        let position = self.counter(channel);

        if let Some(citation) = self.citation.as_mut() {
            if citation.channel == channel {
                let skip = citation.start.saturating_sub(position);
                citation.text.extend(text.chars().skip(skip));
            }
        }

        match channel {
            Channel::Answer => self.answer_chars += chars,
            Channel::Thinking => self.thinking_chars += chars,
            Channel::SearchQuery => {
                self.flush_chunk();
                self.queries.note_text();
                let delta = SearchQueryDelta {
                    index: self.queries.index(),
                    text: text.to_string(),
                };
                let mut event = OutputEvent::new(EventKind::SearchQuery(delta), text);
                event.logprobs = self.logprobs.take();
                event.is_post_answer = self.post_answer;
                self.out.push(event);
                return;
            }
        }

        let is_thinking = channel == Channel::Thinking;
        let is_post_answer = self.post_answer && !is_thinking;
        let flags_changed = self
            .chunk
            .as_ref()
            .is_some_and(|c| c.is_thinking != is_thinking || c.is_post_answer != is_post_answer);
        if flags_changed {
            self.flush_chunk();
        }

        let chunk = self.chunk.get_or_insert_with(|| Chunk {
            text: String::new(),
            writes: 0,
            is_thinking,
            is_post_answer,
        });
        chunk.text.push_str(text);
        self.chunk_touched = true;
    }

    fn flush_chunk(&mut self) {
        self.chunk_touched = false;
        let Some(chunk) = self.chunk.take() else {
            return;
        };
        if chunk.text.is_empty() {
            return;
        }
        let mut event = OutputEvent::text_chunk(chunk.text);
        event.logprobs = self.logprobs.take();
        event.is_thinking = chunk.is_thinking;
        event.is_post_answer = chunk.is_post_answer;
        self.out.push(event);
    }
}

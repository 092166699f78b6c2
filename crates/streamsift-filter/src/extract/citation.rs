//! Citation span recognition
//!
//! Runs over the text of a grounded answer or thinking region. Cited text is
//! released as soon as it is known not to be markup, so citations never add
//! latency to the answer stream; the span's sources only arrive with the
//! closing tag.

use crate::dialect::CitationSyntax;
use crate::literal::held_prefix_len;
use regex::Regex;
use std::sync::OnceLock;
use streamsift_core::Source;
use tracing::{trace, warn};

const GROUPED_OPEN: &str = "<co>";
const LEGACY_OPEN: &str = "<co: ";
const CLOSE: &str = "</co: ";

/// Output of the citation scanner, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationItem {
    /// Text, cited or not depending on the preceding open/close
    Text(String),

    /// A citation span opened
    Open,

    /// The open span closed with these sources
    Close(Vec<Source>),
}

/// Incremental citation scanner for one region
#[derive(Debug)]
pub struct CitationScanner {
    syntax: CitationSyntax,
    buffer: String,
    inside: bool,
}

impl CitationScanner {
    pub fn new(syntax: CitationSyntax) -> Self {
        Self {
            syntax,
            buffer: String::new(),
            inside: false,
        }
    }

    /// Whether a span is open
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Feed region text and collect everything that can be decided
    pub fn push(&mut self, text: &str) -> Vec<CitationItem> {
        self.buffer.push_str(text);
        let mut items = Vec::new();

        loop {
            let progressed = if self.inside {
                self.scan_close(&mut items)
            } else {
                self.scan_open(&mut items)
            };
            if !progressed {
                break;
            }
        }
        items
    }

    /// End of region: unresolved markup becomes plain text
    ///
    /// Returns the released items and whether a span was left open.
    pub fn finish(&mut self) -> (Vec<CitationItem>, bool) {
        let mut items = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            items.push(CitationItem::Text(rest));
        }
        let unclosed = std::mem::replace(&mut self.inside, false);
        (items, unclosed)
    }

    /// Look for an opening tag. Returns true if a span opened.
    fn scan_open(&mut self, items: &mut Vec<CitationItem>) -> bool {
        let opener = match self.syntax {
            CitationSyntax::Grouped => GROUPED_OPEN,
            CitationSyntax::Legacy => LEGACY_OPEN,
        };

        let Some(at) = self.buffer.find(opener) else {
            let held = held_prefix_len(&self.buffer, opener);
            self.release(self.buffer.len() - held, items);
            return false;
        };

        let tag_end = match self.syntax {
            CitationSyntax::Grouped => Some(at + opener.len()),
            // The legacy opener repeats the document list; only the close counts
            CitationSyntax::Legacy => self.buffer[at..].find('>').map(|gt| at + gt + 1),
        };

        self.release(at, items);
        match tag_end {
            Some(end) => {
                self.buffer.drain(..end - at);
                items.push(CitationItem::Open);
                self.inside = true;
                true
            }
            None => false,
        }
    }

    /// Look for the closing tag. Returns true if the span closed.
    fn scan_close(&mut self, items: &mut Vec<CitationItem>) -> bool {
        let Some(at) = self.buffer.find(CLOSE) else {
            let held = held_prefix_len(&self.buffer, CLOSE);
            self.release(self.buffer.len() - held, items);
            return false;
        };

        self.release(at, items);
        let gt = match self.buffer[CLOSE.len()..].find(|c: char| !is_payload_char(c)) {
            Some(offset) if self.buffer[CLOSE.len() + offset..].starts_with('>') => {
                CLOSE.len() + offset
            }
            Some(offset) => {
                // Not a document list: the tag so far is cited text
                let end = CLOSE.len() + offset;
                trace!(tag = &self.buffer[..end], "malformed closing tag");
                self.release(end, items);
                return true;
            }
            None => return false,
        };

        let tag: String = self.buffer.drain(..=gt).collect();
        let payload = &tag[CLOSE.len()..tag.len() - 1];
        items.push(CitationItem::Close(parse_sources(self.syntax, payload)));
        self.inside = false;
        true
    }

    /// Move the first `len` bytes of the buffer out as text
    fn release(&mut self, len: usize, items: &mut Vec<CitationItem>) {
        if len == 0 {
            return;
        }
        let rest = self.buffer.split_off(len);
        let text = std::mem::replace(&mut self.buffer, rest);
        match items.last_mut() {
            Some(CitationItem::Text(prev)) => prev.push_str(&text),
            _ => items.push(CitationItem::Text(text)),
        }
    }
}

fn is_payload_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ':' | '[' | ']' | ',' | ' ')
}

/// Parse the document list of a closing tag
pub fn parse_sources(syntax: CitationSyntax, payload: &str) -> Vec<Source> {
    match syntax {
        CitationSyntax::Legacy => {
            let indices = parse_indices(payload);
            if indices.is_empty() {
                Vec::new()
            } else {
                vec![Source {
                    tool_call_index: 0,
                    tool_result_indices: indices,
                }]
            }
        }
        CitationSyntax::Grouped => parse_grouped(payload),
    }
}

fn parse_indices(list: &str) -> Vec<usize> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<usize>() {
            Ok(i) => Some(i),
            Err(_) => {
                warn!(entry = s, "skipping unparseable citation document index");
                None
            }
        })
        .collect()
}

fn group_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s*:\s*\[([^\]]*)$").ok())
        .as_ref()
}

/// `0:[1,2],1:[3,4]` → one source per tool call
fn parse_grouped(payload: &str) -> Vec<Source> {
    let Some(pattern) = group_pattern() else {
        return Vec::new();
    };

    payload
        .split(']')
        .map(|group| group.trim().trim_start_matches(',').trim())
        .filter(|group| !group.is_empty())
        .filter_map(|group| {
            let caps = match pattern.captures(group) {
                Some(caps) => caps,
                None => {
                    warn!(group, "skipping malformed citation source group");
                    return None;
                }
            };
            let tool_call_index = caps[1].parse::<usize>().ok()?;
            Some(Source {
                tool_call_index,
                tool_result_indices: parse_indices(&caps[2]),
            })
        })
        .collect()
}

//! Streaming tool-call extraction
//!
//! Tool-call sections carry JSON: either a single call object or an array of
//! them. The extractor walks the text one character at a time, tracking
//! nesting depth and string boundaries, so parameter text can be forwarded
//! while the object is still being generated. Text outside the JSON (code
//! fences, prose) is skipped.

use crate::config::{ParamFormat, ToolCallStreaming};
use crate::dialect::ToolCallKeys;
use streamsift_core::{ParamDelta, ToolCallDelta};
use tracing::{debug, warn};

/// What a captured value is used for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Id,
    Name,
    RawParams,
    Param(String),
    Skip,
}

impl Target {
    fn streams(&self) -> bool {
        matches!(self, Target::RawParams | Target::Param(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    String,
    Container,
    Scalar,
}

/// Result of offering a character to a value capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Consumed; the value continues
    Continue,

    /// Consumed; the value is complete
    Complete,

    /// Not part of the value, which ended just before it
    Ended,
}

/// One JSON value being read, at any nesting depth
#[derive(Debug)]
struct Capture {
    target: Target,
    kind: ValueKind,
    depth: usize,
    in_string: bool,
    escape: bool,
    text: String,
}

impl Capture {
    fn start(target: Target, first: char) -> Self {
        let kind = match first {
            '"' => ValueKind::String,
            '{' | '[' => ValueKind::Container,
            _ => ValueKind::Scalar,
        };
        Self {
            target,
            kind,
            depth: usize::from(kind == ValueKind::Container),
            in_string: first == '"',
            escape: false,
            text: first.to_string(),
        }
    }

    fn accept(&mut self, c: char) -> Step {
        match self.kind {
            ValueKind::Scalar => {
                if c.is_whitespace() || matches!(c, ',' | '}' | ']') {
                    return Step::Ended;
                }
                self.text.push(c);
                Step::Continue
            }
            ValueKind::String => {
                self.text.push(c);
                if self.escape {
                    self.escape = false;
                } else if c == '\\' {
                    self.escape = true;
                } else if c == '"' {
                    return Step::Complete;
                }
                Step::Continue
            }
            ValueKind::Container => {
                self.text.push(c);
                if self.in_string {
                    if self.escape {
                        self.escape = false;
                    } else if c == '\\' {
                        self.escape = true;
                    } else if c == '"' {
                        self.in_string = false;
                    }
                    return Step::Continue;
                }
                match c {
                    '"' => self.in_string = true,
                    '{' | '[' => self.depth += 1,
                    '}' | ']' => {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            return Step::Complete;
                        }
                    }
                    _ => {}
                }
                Step::Continue
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectRole {
    Call,
    Params,
}

#[derive(Debug)]
enum ObjectState {
    ExpectKey,
    Key { text: String, escape: bool },
    ExpectColon(String),
    ExpectValue(String),
    AfterValue,
}

#[derive(Debug)]
enum Frame {
    CallList,
    Object { role: ObjectRole, state: ObjectState },
}

/// What the frame walk decided for the current character
enum Action {
    Nothing,
    OpenList,
    OpenCall,
    CloseList,
    CloseObject(ObjectRole),
    StartValue { role: ObjectRole, key: String, first: char },
}

/// Incremental tool-call parser for one stream
///
/// Call indices are assigned when a call object opens and keep increasing
/// across regions for the lifetime of the extractor.
#[derive(Debug)]
pub struct ToolCallExtractor {
    keys: ToolCallKeys,
    format: ParamFormat,
    streaming: ToolCallStreaming,
    stack: Vec<Frame>,
    capture: Option<Capture>,
    piece: String,
    current: Option<usize>,
    next_index: usize,
    held: Vec<ToolCallDelta>,
    out: Vec<ToolCallDelta>,
}

impl ToolCallExtractor {
    pub fn new(keys: ToolCallKeys, format: ParamFormat, streaming: ToolCallStreaming) -> Self {
        Self {
            keys,
            format,
            streaming,
            stack: Vec::new(),
            capture: None,
            piece: String::new(),
            current: None,
            next_index: 0,
            held: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Feed tool-call text and collect the deltas it completes
    pub fn push(&mut self, text: &str) -> Vec<ToolCallDelta> {
        for c in text.chars() {
            self.step(c);
        }
        self.flush_piece();
        std::mem::take(&mut self.out)
    }

    /// End of the tool-call region
    ///
    /// Releases everything still held back and resets the parser. Returns
    /// the remaining deltas and whether a call object was left unclosed.
    pub fn finish(&mut self) -> (Vec<ToolCallDelta>, bool) {
        self.flush_piece();
        self.capture = None;
        self.stack.clear();

        let unclosed = match self.current.take() {
            Some(index) => {
                warn!(index, "tool call not closed before the end of its section");
                self.next_index = index + 1;
                true
            }
            None => false,
        };
        self.out.append(&mut self.held);
        (std::mem::take(&mut self.out), unclosed)
    }

    fn step(&mut self, c: char) {
        if let Some(capture) = self.capture.as_mut() {
            let streams = capture.target.streams();
            match capture.accept(c) {
                Step::Continue => {
                    if streams {
                        self.piece.push(c);
                    }
                    return;
                }
                Step::Complete => {
                    if streams {
                        self.piece.push(c);
                    }
                    self.complete_capture();
                    return;
                }
                // The terminator belongs to the enclosing object
                Step::Ended => self.complete_capture(),
            }
        }

        match self.walk(c) {
            Action::Nothing => {}
            Action::OpenList => self.stack.push(Frame::CallList),
            Action::OpenCall => self.open_call(),
            Action::CloseList => {
                self.stack.pop();
            }
            Action::CloseObject(role) => {
                self.stack.pop();
                if role == ObjectRole::Call {
                    self.close_call();
                }
            }
            Action::StartValue { role, key, first } => self.start_value(role, key, first),
        }
    }

    /// Advance the innermost frame over `c`
    fn walk(&mut self, c: char) -> Action {
        let Some(frame) = self.stack.last_mut() else {
            return match c {
                '[' => Action::OpenList,
                '{' => Action::OpenCall,
                _ => Action::Nothing,
            };
        };

        match frame {
            Frame::CallList => match c {
                '{' => Action::OpenCall,
                ']' => Action::CloseList,
                _ => Action::Nothing,
            },
            Frame::Object { role, state } => {
                let role = *role;
                match state {
                    ObjectState::ExpectKey => match c {
                        '"' => {
                            *state = ObjectState::Key {
                                text: String::new(),
                                escape: false,
                            };
                            Action::Nothing
                        }
                        '}' => Action::CloseObject(role),
                        _ => Action::Nothing,
                    },
                    ObjectState::Key { text, escape } => {
                        if *escape {
                            *escape = false;
                            text.push(c);
                        } else if c == '\\' {
                            *escape = true;
                            text.push(c);
                        } else if c == '"' {
                            let key = decode_string(&format!("\"{}\"", text));
                            *state = ObjectState::ExpectColon(key);
                        } else {
                            text.push(c);
                        }
                        Action::Nothing
                    }
                    ObjectState::ExpectColon(key) => {
                        if c == ':' {
                            *state = ObjectState::ExpectValue(std::mem::take(key));
                        }
                        Action::Nothing
                    }
                    ObjectState::ExpectValue(key) => {
                        if c.is_whitespace() {
                            return Action::Nothing;
                        }
                        let key = std::mem::take(key);
                        *state = ObjectState::AfterValue;
                        Action::StartValue { role, key, first: c }
                    }
                    ObjectState::AfterValue => match c {
                        ',' => {
                            *state = ObjectState::ExpectKey;
                            Action::Nothing
                        }
                        '}' => Action::CloseObject(role),
                        _ => Action::Nothing,
                    },
                }
            }
        }
    }

    fn start_value(&mut self, role: ObjectRole, key: String, first: char) {
        let target = match role {
            ObjectRole::Params => {
                self.emit_param(ParamDelta::Structured {
                    name: key.clone(),
                    value_delta: String::new(),
                });
                Target::Param(key)
            }
            ObjectRole::Call if self.keys.id == Some(key.as_str()) => Target::Id,
            ObjectRole::Call if key == self.keys.name => Target::Name,
            ObjectRole::Call if key == self.keys.parameters => match self.format {
                ParamFormat::Raw => Target::RawParams,
                ParamFormat::Structured if first == '{' => {
                    self.stack.push(Frame::Object {
                        role: ObjectRole::Params,
                        state: ObjectState::ExpectKey,
                    });
                    return;
                }
                ParamFormat::Structured => {
                    warn!("tool call parameters are not an object; skipping them");
                    Target::Skip
                }
            },
            ObjectRole::Call => Target::Skip,
        };

        if target.streams() {
            self.piece.push(first);
        }
        self.capture = Some(Capture::start(target, first));
    }

    fn complete_capture(&mut self) {
        self.flush_piece();
        let Some(capture) = self.capture.take() else {
            return;
        };
        let Some(index) = self.current else {
            return;
        };

        match capture.target {
            Target::Id => self.emit(ToolCallDelta {
                index,
                id: Some(decode_string(&capture.text)),
                ..Default::default()
            }),
            Target::Name => self.emit(ToolCallDelta {
                index,
                name: Some(decode_string(&capture.text)),
                ..Default::default()
            }),
            Target::RawParams | Target::Param(_) | Target::Skip => {}
        }
    }

    /// Turn streamed value text into a parameter delta
    fn flush_piece(&mut self) {
        if self.piece.is_empty() {
            return;
        }
        let piece = std::mem::take(&mut self.piece);
        let param = match self.capture.as_ref().map(|c| &c.target) {
            Some(Target::RawParams) => ParamDelta::Raw { delta: piece },
            Some(Target::Param(name)) => ParamDelta::Structured {
                name: name.clone(),
                value_delta: piece,
            },
            _ => return,
        };
        self.emit_param(param);
    }

    fn emit_param(&mut self, param: ParamDelta) {
        if let Some(index) = self.current {
            self.emit(ToolCallDelta {
                index,
                param: Some(param),
                ..Default::default()
            });
        }
    }

    fn emit(&mut self, delta: ToolCallDelta) {
        match self.streaming {
            ToolCallStreaming::Incremental => self.out.push(delta),
            ToolCallStreaming::OnCompletion => {
                let merged = self
                    .held
                    .last_mut()
                    .map(|last| last.merge(&delta))
                    .unwrap_or(false);
                if !merged {
                    self.held.push(delta);
                }
            }
        }
    }

    fn open_call(&mut self) {
        if let Some(index) = self.current.take() {
            // A call opened inside an unterminated one
            warn!(index, "tool call replaced before it closed");
            self.next_index = index + 1;
            self.out.append(&mut self.held);
        }
        let index = self.next_index;
        debug!(index, "tool call opened");
        self.current = Some(index);
        self.stack.push(Frame::Object {
            role: ObjectRole::Call,
            state: ObjectState::ExpectKey,
        });
    }

    fn close_call(&mut self) {
        self.flush_piece();
        if let Some(index) = self.current.take() {
            debug!(index, "tool call closed");
            self.next_index = index + 1;
            self.out.append(&mut self.held);
        }
    }
}

/// Decode a JSON string literal, keeping the raw text if it is not one
fn decode_string(raw: &str) -> String {
    serde_json::from_str::<String>(raw)
        .unwrap_or_else(|_| raw.trim_matches('"').to_string())
}

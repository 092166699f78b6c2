//! streamsift filter
//!
//! Single-pass post-processing of streamed model output. Decoded fragments
//! go in through [`FilterEngine::write`]; structured [`OutputEvent`]s come
//! out as soon as they can be decided:
//! - Answer and thinking text, trimmed and chunked
//! - Citations with character offsets into the emitted answer
//! - Search queries, one indexed stream per query
//! - Tool calls with streaming parameter deltas
//!
//! Markup, stop strings, and dropped tokens may be split across any number
//! of `write` calls. [`FilterEngine::flush`] ends the stream once.

pub mod config;
pub mod dialect;
pub mod emit;
pub mod engine;
pub mod extract;
pub mod literal;
pub mod presets;
pub mod repetition;
pub mod scanner;
pub mod stop;

pub use config::{
    FilterConfig, FilterConfigBuilder, ParamFormat, RepetitionLimit, ToolCallStreaming,
};
pub use dialect::{CitationSyntax, Dialect, Grammar, Region};
pub use engine::{FilterEngine, FilterState};
pub use stop::{StopKind, StopMatcher, StopSequence};

pub use streamsift_core::{Error, OutputEvent, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{FilterConfig, ParamFormat, ToolCallStreaming};
    pub use crate::dialect::Dialect;
    pub use crate::engine::{FilterEngine, FilterState};
    pub use crate::presets;
    pub use crate::stop::{StopKind, StopSequence};
    pub use streamsift_core::prelude::*;
}

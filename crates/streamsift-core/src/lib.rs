//! streamsift core
//!
//! Types shared between the streaming filter engine and its consumers.
//!
//! This crate provides:
//! - Output events (text chunks, citations, search queries, tool-call deltas)
//! - Token id / log-probability bookkeeping that travels with events
//! - Error types and result handling
//! - Incremental UTF-8 decoding for byte-oriented decoders
//! - A summary accumulator that folds an event stream back into final values

pub mod error;
pub mod stream;
pub mod summary;
pub mod types;

pub use error::{Error, Result};
pub use stream::Utf8Decoder;
pub use summary::{StreamSummary, ToolCallSummary};
pub use types::{
    Citation, EventKind, OutputEvent, ParamDelta, SearchQueryDelta, Source, TokenLogProbs,
    ToolCallDelta,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::summary::StreamSummary;
    pub use crate::types::{
        Citation, EventKind, OutputEvent, ParamDelta, SearchQueryDelta, Source, TokenLogProbs,
        ToolCallDelta,
    };
}

//! Structure extraction from region text
//!
//! - Citation spans inside grounded answers and thinking
//! - Tool-call JSON with streaming parameter deltas
//! - Search-query indexing

pub mod citation;
pub mod search;
pub mod tool_call;

pub use citation::{parse_sources, CitationItem, CitationScanner};
pub use search::SearchQueryTracker;
pub use tool_call::ToolCallExtractor;

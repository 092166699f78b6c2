//! Named configurations for common model families
//!
//! Each preset returns a complete [`FilterConfig`]; adjust it further with
//! [`FilterConfig::into_builder`].

use crate::config::{FilterConfig, ToolCallStreaming};
use crate::dialect::Dialect;

/// Names accepted by [`by_name`]
pub const NAMES: [&str; 6] = ["command3", "command4", "rag", "search_query", "multi_hop", "llama"];

/// Special-token responses with grouped citations and streamed tool calls
pub fn command3() -> FilterConfig {
    FilterConfig::builder()
        .dialect(Dialect::Command3)
        .citations(true)
        .tool_calls(true)
        .tool_call_streaming(ToolCallStreaming::Incremental)
        .right_trim(true)
        .build()
}

/// Like [`command3`] with the `<|START_TEXT|>` response markers
pub fn command4() -> FilterConfig {
    command3().into_builder().dialect(Dialect::Command4).build()
}

/// Retrieval-augmented answers: `Grounded answer:` with legacy citations
pub fn rag() -> FilterConfig {
    FilterConfig::builder()
        .dialect(Dialect::Command2)
        .citations(true)
        .right_trim(true)
        .build()
}

/// Search-query generation: `Search:` sections split on `|||` or newlines
pub fn search_query() -> FilterConfig {
    FilterConfig::builder()
        .dialect(Dialect::Command2)
        .search_queries(true)
        .right_trim(true)
        .build()
}

/// Multi-hop tool use: plans, actions, and a grounded answer
pub fn multi_hop() -> FilterConfig {
    FilterConfig::builder()
        .dialect(Dialect::Command2)
        .citations(true)
        .tool_calls(true)
        .right_trim(true)
        .build()
}

/// `<|python_tag|>` tool calls; `<eom_id>` ends the message
pub fn llama() -> FilterConfig {
    FilterConfig::builder()
        .dialect(Dialect::Llama)
        .tool_calls(true)
        .right_trim(true)
        .exclusive_stop("<eom_id>")
        .build()
}

/// Look a preset up by name
pub fn by_name(name: &str) -> Option<FilterConfig> {
    match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "command3" | "cmd3" => Some(command3()),
        "command4" | "cmd4" => Some(command4()),
        "rag" => Some(rag()),
        "search_query" => Some(search_query()),
        "multi_hop" => Some(multi_hop()),
        "llama" => Some(llama()),
        _ => None,
    }
}

//! Recorded-generation scenarios for each dialect
//!
//! Every scenario is fed both in one piece and one character at a time;
//! the reconstructed output must not depend on fragment boundaries.

mod common;

use common::{run, run_split, summarize, summarize_by_char};
use streamsift_core::{Citation, OutputEvent, Source, StreamSummary};
use streamsift_filter::{presets, FilterConfig, ParamFormat, ToolCallStreaming};

fn source(tool_call_index: usize, results: &[usize]) -> Source {
    Source {
        tool_call_index,
        tool_result_indices: results.to_vec(),
    }
}

fn citation(start: usize, end: usize, text: &str, sources: Vec<Source>) -> Citation {
    Citation {
        start_index: start,
        end_index: end,
        text: text.to_string(),
        sources,
        is_thinking: false,
    }
}

/// Summaries of both feeding strategies, checked equal
fn both(config: FilterConfig, text: &str) -> StreamSummary {
    let whole = summarize(config.clone(), text);
    let by_char = summarize_by_char(config, text);
    assert_eq!(whole.text, by_char.text, "answer differs by fragmenting");
    assert_eq!(whole.thinking, by_char.thinking, "thinking differs by fragmenting");
    assert_eq!(whole.citations, by_char.citations, "citations differ by fragmenting");
    assert_eq!(whole.search_queries, by_char.search_queries);
    assert_eq!(whole.tool_calls, by_char.tool_calls);
    whole
}

/// Answer text split by the post-answer flag
fn split_post_answer(config: FilterConfig, text: &str) -> (String, String) {
    let events = run(config, &[text]);
    let mut before = String::new();
    let mut after = String::new();
    for event in events.iter().filter(|e| e.is_text() && !e.is_thinking) {
        if event.is_post_answer {
            after.push_str(&event.text);
        } else {
            before.push_str(&event.text);
        }
    }
    (before, after)
}

const RAINBOW: &str = "<|START_THINKING|>This is a rainbow <co>emoji: 🌈</co: 0:[1]><|END_THINKING|>\n\
<|START_RESPONSE|>foo <co>bar</co: 0:[1,2],1:[3,4]><|END_RESPONSE|>";

const PENGUINS: &str = "Relevant Documents: 0\nCited Documents: 0\nAnswer: The tallest penguin is the emperor penguin.\n They are 1.2 feet tall.\
Grounded answer: The tallest penguin is the <co: 0>emperor penguin</co: 0>.\n They are <co: 1>1.2 feet</co: 1> tall.";

const PENGUINS_FAST: &str = "Relevant Documents: 0\nCited Documents: 0\n\
Grounded answer: The tallest penguin is the <co: 0>emperor penguin</co: 0>.\n They are <co: 1>1.2 feet</co: 1> tall.";

#[test]
fn test_command3_thinking_and_response_citations() {
    let summary = both(presets::command3(), RAINBOW);

    assert_eq!(summary.text, "foo bar");
    assert_eq!(summary.thinking, "This is a rainbow emoji: 🌈");
    assert_eq!(
        summary.citations,
        vec![
            Citation {
                is_thinking: true,
                ..citation(18, 26, "emoji: 🌈", vec![source(0, &[1])])
            },
            citation(4, 7, "bar", vec![source(0, &[1, 2]), source(1, &[3, 4])]),
        ]
    );
}

#[test]
fn test_command3_overlapping_citation_stays_literal() {
    let input = "<|START_RESPONSE|>foo <co>bar <co>baz</co: 1:[1]> boo</co: 0:[1,2],1:[3,4]><|END_RESPONSE|>";
    let summary = both(presets::command3(), input);

    assert_eq!(summary.text, "foo bar <co>baz boo</co: 0:[1,2],1:[3,4]>");
    assert_eq!(
        summary.citations,
        vec![citation(4, 15, "bar <co>baz", vec![source(1, &[1])])]
    );
}

#[test]
fn test_command3_missing_response_marker() {
    let summary = both(
        presets::command3(),
        "<|START_THINKING|>Plan<|END_THINKING|>Response",
    );
    assert_eq!(summary.thinking, "Plan");
    assert_eq!(summary.text, "Response");
}

#[test]
fn test_command4_uses_text_markers() {
    let input = "<|START_THINKING|>Look it up<|END_THINKING|><|START_TEXT|>It is <co>blue</co: 0:[2]>.<|END_TEXT|>";
    let summary = both(presets::command4(), input);
    assert_eq!(summary.thinking, "Look it up");
    assert_eq!(summary.text, "It is blue.");
    assert_eq!(summary.citations, vec![citation(6, 10, "blue", vec![source(0, &[2])])]);
}

#[test]
fn test_command3_single_tool_call() {
    let input = r#"<|START_THINKING|>I will use the add tool to calculate the sum of 6 and 7.<|END_THINKING|><|START_ACTION|>[{"tool_call_id": "0", "tool_name": "add", "parameters": {"a": 6, "b": 7}}]<|END_ACTION|>"#;
    let summary = both(presets::command3(), input);

    assert_eq!(
        summary.thinking,
        "I will use the add tool to calculate the sum of 6 and 7."
    );
    assert_eq!(summary.text, "");
    assert_eq!(summary.tool_calls.len(), 1);

    let call = &summary.tool_calls[0];
    assert_eq!(call.index, 0);
    assert_eq!(call.id, "0");
    assert_eq!(call.name, "add");
    assert_eq!(call.raw_params, r#"{"a": 6, "b": 7}"#);
}

const TWO_SEARCHES: &str = r#"<|START_THINKING|>I will search for both countries.<|END_THINKING|><|START_ACTION|>[
    {"tool_call_id": "0", "tool_name": "web_search", "parameters": {"query": "United States"}},
    {"tool_call_id": "1", "tool_name": "web_search", "parameters": {"query": "Canada"}}
]<|END_ACTION|>"#;

#[test]
fn test_command3_multiple_tool_calls() {
    let summary = both(presets::command3(), TWO_SEARCHES);

    let calls: Vec<(usize, &str, &str, &str)> = summary
        .tool_calls
        .iter()
        .map(|c| (c.index, c.id.as_str(), c.name.as_str(), c.raw_params.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            (0, "0", "web_search", r#"{"query": "United States"}"#),
            (1, "1", "web_search", r#"{"query": "Canada"}"#),
        ]
    );
}

#[test]
fn test_tool_calls_survive_coarse_fragments() {
    let events = run_split(presets::command3(), TWO_SEARCHES, 10);
    let summary = StreamSummary::from_events(&events);
    assert_eq!(summary.tool_calls.len(), 2);
    assert_eq!(summary.tool_calls[1].raw_params, r#"{"query": "Canada"}"#);

    let indices: Vec<usize> = events
        .iter()
        .filter_map(|e| e.tool_call())
        .map(|d| d.index)
        .collect();
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_on_completion_emits_one_delta_per_call() {
    let config = presets::command3()
        .into_builder()
        .tool_call_streaming(ToolCallStreaming::OnCompletion)
        .build();
    let events = run_split(config, TWO_SEARCHES, 3);
    let deltas: Vec<_> = events.iter().filter_map(|e| e.tool_call()).collect();

    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].id.as_deref(), Some("0"));
    assert_eq!(deltas[1].name.as_deref(), Some("web_search"));
}

#[test]
fn test_disabled_action_markers_pass_through() {
    let action = r#"<|START_ACTION|>[{"tool_call_id": "0", "tool_name": "add", "parameters": {"a": 6}}]<|END_ACTION|>"#;
    let config = presets::command3()
        .into_builder()
        .disable_marker("<|START_ACTION|>")
        .disable_marker("<|END_ACTION|>")
        .build();
    let summary = both(config, action);

    assert_eq!(summary.text, action);
    assert!(summary.tool_calls.is_empty());
}

#[test]
fn test_stop_inside_open_citation() {
    let config = presets::command3()
        .into_builder()
        .exclusive_stop("<|END_OF_TURN_TOKEN|>")
        .build();
    let summary = both(config, "<|START_RESPONSE|>foo <co>bar<|END_OF_TURN_TOKEN|> trailing");
    assert_eq!(summary.text, "foo bar");
    assert!(summary.citations.is_empty());
}

#[test]
fn test_rag_accurate_answer() {
    let config = presets::rag()
        .into_builder()
        .stream_non_grounded_answer(true)
        .left_trim(true)
        .build();
    let expected = "The tallest penguin is the emperor penguin.\n They are 1.2 feet tall.";

    let (before, after) = split_post_answer(config.clone(), PENGUINS);
    assert_eq!(before, expected);
    assert_eq!(after, expected);

    let summary = both(config, PENGUINS);
    assert_eq!(
        summary.citations,
        vec![
            citation(27, 42, "emperor penguin", vec![source(0, &[0])]),
            citation(54, 62, "1.2 feet", vec![source(0, &[1])]),
        ]
    );
}

#[test]
fn test_rag_answer_marker_inside_answer_is_text() {
    let input = "Answer: foo Answer: bar Answer: baz\nGrounded answer: foo Answer: <co: 0>bar</co: 0> Answer: <co: 0>baz</co: 0>";
    let config = presets::rag()
        .into_builder()
        .stream_non_grounded_answer(true)
        .left_trim(true)
        .build();

    let (before, after) = split_post_answer(config.clone(), input);
    assert_eq!(before, "foo Answer: bar Answer: baz");
    assert_eq!(after, "foo Answer: bar Answer: baz");

    let summary = both(config, input);
    assert_eq!(
        summary.citations,
        vec![
            citation(12, 15, "bar", vec![source(0, &[0])]),
            citation(24, 27, "baz", vec![source(0, &[0])]),
        ]
    );
}

#[test]
fn test_rag_fast_answer_keeps_leading_space() {
    let summary = both(presets::rag(), PENGUINS_FAST);
    assert_eq!(
        summary.text,
        " The tallest penguin is the emperor penguin.\n They are 1.2 feet tall."
    );
    assert_eq!(summary.citations[0].start_index, 28);
    assert_eq!(summary.citations[0].end_index, 43);
    assert_eq!(summary.citations[1].start_index, 55);
    assert_eq!(summary.citations[1].end_index, 63);
}

#[test]
fn test_rag_fast_answer_left_trimmed() {
    let config = presets::rag().into_builder().left_trim(true).build();
    let summary = both(config, PENGUINS_FAST);
    assert_eq!(
        summary.text,
        "The tallest penguin is the emperor penguin.\n They are 1.2 feet tall."
    );
    assert_eq!(
        summary.citations,
        vec![
            citation(27, 42, "emperor penguin", vec![source(0, &[0])]),
            citation(54, 62, "1.2 feet", vec![source(0, &[1])]),
        ]
    );
}

#[test]
fn test_rag_non_grounded_answer_hidden_by_default() {
    let summary = both(
        presets::rag(),
        "Answer: foo bar\nGrounded answer: foo <co: 0>bar</co: 0>",
    );
    assert_eq!(summary.text, " foo bar");
    assert_eq!(summary.citations, vec![citation(5, 8, "bar", vec![source(0, &[0])])]);
}

#[test]
fn test_rag_empty_and_missing_answers() {
    assert_eq!(both(presets::rag(), "Grounded answer: ").text, "");
    assert_eq!(both(presets::rag(), "not a grounded generation").text, "");
}

#[test]
fn test_rag_multibyte_offsets_count_characters() {
    let input = "Grounded answer:Fiber is a type of <co: 1>carbohydrate</co: 1> that the body can’t <co: 1,2>digest.</co: 1,2>";
    let summary = both(presets::rag(), input);
    assert_eq!(summary.text, "Fiber is a type of carbohydrate that the body can’t digest.");
    assert_eq!(
        summary.citations,
        vec![
            citation(19, 31, "carbohydrate", vec![source(0, &[1])]),
            citation(52, 59, "digest.", vec![source(0, &[1, 2])]),
        ]
    );
}

#[test]
fn test_search_queries_split_on_separators() {
    let summary = both(
        presets::search_query(),
        "Search: foo bar baz boo|||search query 2\nsearch query 3",
    );
    assert_eq!(
        summary.search_queries,
        vec!["foo bar baz boo", "search query 2", "search query 3"]
    );
}

#[test]
fn test_search_queries_are_trimmed_and_blank_ones_skipped() {
    let summary = both(presets::search_query(), "Search: penguins ||| search query 2\n\nemperor\n");
    assert_eq!(summary.search_queries, vec!["penguins", "search query 2", "emperor"]);
}

#[test]
fn test_multi_hop_plan_and_action() {
    let input = "Plan: I will search for penguins.\nAction: ```json\n[{\"tool_name\": \"internet_search\", \"parameters\": {\"query\": \"penguins\"}}]\n```";
    let summary = both(presets::multi_hop(), input);

    assert_eq!(summary.thinking, "I will search for penguins.");
    assert_eq!(summary.tool_calls.len(), 1);
    assert_eq!(summary.tool_calls[0].name, "internet_search");
    assert_eq!(summary.tool_calls[0].id, "");
    assert_eq!(summary.tool_calls[0].raw_params, r#"{"query": "penguins"}"#);
}

#[test]
fn test_multi_hop_grounded_answer_after_reflection() {
    let input = "Reflection: I found it.\nRelevant Documents: 0\nCited Documents: 0\nGrounded answer: Penguins are <co: 0>tall</co: 0>.";

    let summary = both(presets::multi_hop(), input);
    assert_eq!(summary.thinking, "I found it.");
    assert_eq!(summary.text, " Penguins are tall.");
    assert_eq!(summary.citations, vec![citation(14, 18, "tall", vec![source(0, &[0])])]);

    let streamed = presets::multi_hop()
        .into_builder()
        .stream_non_grounded_answer(true)
        .build();
    let summary = both(streamed, input);
    assert_eq!(summary.text, "Penguins are tall.");
    assert_eq!(summary.citations, vec![citation(13, 17, "tall", vec![source(0, &[0])])]);
}

#[test]
fn test_llama_structured_tool_call() {
    let input = "\n\n<|python_tag|>{\"name\": \"internet_search\", \"parameters\": {\"query\": \"emperor penguin height\"}}<eom_id>";
    let config = presets::llama()
        .into_builder()
        .param_format(ParamFormat::Structured)
        .build();

    let summary = both(config.clone(), input);
    assert_eq!(summary.text, "");
    assert_eq!(summary.tool_calls.len(), 1);
    assert_eq!(summary.tool_calls[0].name, "internet_search");
    assert_eq!(
        summary.tool_calls[0].params,
        vec![("query".to_string(), "\"emperor penguin height\"".to_string())]
    );

    let events = run(config, &[input]);
    let first_param = events
        .iter()
        .filter_map(|e| e.tool_call())
        .find_map(|d| d.param.clone());
    assert_eq!(
        first_param,
        Some(streamsift_core::ParamDelta::Structured {
            name: "query".into(),
            value_delta: String::new(),
        })
    );
}

#[test]
fn test_plain_stops() {
    let text = "The tallest penguin is the emperor penguin. They are 1.2 feet tall.";

    let inclusive = FilterConfig::builder().inclusive_stop("penguin.").build();
    assert_eq!(
        both(inclusive, text).text,
        "The tallest penguin is the emperor penguin."
    );

    let exclusive = FilterConfig::builder().exclusive_stop("emperor").build();
    assert_eq!(both(exclusive, text).text, "The tallest penguin is the ");
}

#[test]
fn test_plain_trims() {
    let text = "\n \tfoo bar baz\t\n ";

    let left = FilterConfig::builder().left_trim(true).build();
    assert_eq!(both(left, text).text, "foo bar baz\t\n ");

    let right = FilterConfig::builder().right_trim(true).build();
    assert_eq!(both(right, text).text, "\n \tfoo bar baz");

    let neither = FilterConfig::default();
    assert_eq!(both(neither, text).text, text);
}

fn text_chunks(events: &[OutputEvent]) -> Vec<&str> {
    events
        .iter()
        .filter(|e| e.is_text())
        .map(|e| e.text.as_str())
        .collect()
}

#[test]
fn test_chunking_by_writes() {
    let config = FilterConfig::builder().chunk_size(2).build();
    let events = run_split(config, "foo bar baz boo bam", 4);
    assert_eq!(text_chunks(&events), vec!["foo bar ", "baz boo ", "bam"]);

    let tokens: Vec<Vec<u32>> = events
        .iter()
        .map(|e| e.logprobs.token_ids.clone())
        .collect();
    assert_eq!(tokens, vec![vec![0, 1], vec![2, 3], vec![4]]);
}

#[test]
fn test_chunking_counts_writes_that_commit_text() {
    // Markers and right-trimmed whitespace do not count on their own
    let config = presets::command3().into_builder().chunk_size(10).build();
    let input = "<|START_RESPONSE|>foo bar baz boo bam<|END_RESPONSE|>";
    let events = run_split(config, input, 1);
    assert_eq!(text_chunks(&events), vec!["foo bar baz b", "oo bam"]);
}

#[test]
fn test_chunks_never_split_a_citation() {
    let config = presets::command3().into_builder().chunk_size(2).build();
    let input = "<|START_RESPONSE|>ab <co>cdef</co: 0:[1]> g";
    let events = run_split(config, input, 1);

    let kinds: Vec<(&str, &str)> = events
        .iter()
        .map(|e| (e.kind_name(), e.text.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("text_chunk", "ab"),
            ("text_chunk", " cdef"),
            ("citation", "cdef"),
            ("text_chunk", " g"),
        ]
    );
    let citation = events.iter().find_map(|e| e.citation()).unwrap();
    assert_eq!((citation.start_index, citation.end_index), (3, 7));
}

#[test]
fn test_tool_calls_after_response_are_post_answer() {
    let input = r#"<|START_RESPONSE|>Let me check.<|END_RESPONSE|><|START_ACTION|>[{"tool_call_id": "0", "tool_name": "add", "parameters": {}}]<|END_ACTION|>"#;
    let events = run(presets::command3(), &[input]);

    assert!(events.iter().filter(|e| e.is_text()).all(|e| !e.is_post_answer));
    let deltas: Vec<_> = events.iter().filter(|e| e.tool_call().is_some()).collect();
    assert!(!deltas.is_empty());
    assert!(deltas.iter().all(|e| e.is_post_answer));
}

//! Markup grammars for the supported model families
//!
//! A [`Dialect`] names one model family's structural conventions: which
//! literal markers switch the generation between regions, how citations are
//! written, and which keys a tool-call object uses. The engine only ever
//! talks to the [`Grammar`] built from a dialect and the enabled features.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Markup grammar of the model whose output is filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// No structural markup; everything is text
    #[default]
    Plain,

    /// Text-prefixed sections (`Grounded answer:`, `Plan:`, `Action:`, `Search:`)
    Command2,

    /// Special-token sections with `<|START_RESPONSE|>`
    Command3,

    /// Special-token sections with `<|START_TEXT|>`
    Command4,

    /// `<|python_tag|>` tool calls
    Llama,
}

/// Region of the generation the scanner is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Unstructured text (plain dialect)
    Text,

    /// Discarded text
    Ignore,

    /// Non-grounded answer
    Answer,

    /// Grounded answer, possibly carrying citations
    GroundedAnswer,

    /// Reasoning / plan text
    Thinking,

    /// Tool-call JSON
    ToolCall,

    /// Search queries
    SearchQuery,
}

impl Region {
    /// Every region, in a fixed order
    pub const ALL: [Region; 7] = [
        Region::Text,
        Region::Ignore,
        Region::Answer,
        Region::GroundedAnswer,
        Region::Thinking,
        Region::ToolCall,
        Region::SearchQuery,
    ];

    /// Position in [`Region::ALL`]
    pub fn index(self) -> usize {
        match self {
            Region::Text => 0,
            Region::Ignore => 1,
            Region::Answer => 2,
            Region::GroundedAnswer => 3,
            Region::Thinking => 4,
            Region::ToolCall => 5,
            Region::SearchQuery => 6,
        }
    }

    /// Whether the region holds (grounded or non-grounded) answer text
    pub fn is_answer(self) -> bool {
        matches!(self, Region::Answer | Region::GroundedAnswer)
    }
}

/// What happens when a marker is recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    /// Switch to another region
    Enter(Region),

    /// Start the next search query
    NextSearchQuery,
}

/// Regions in which a marker is recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Always,
    Within(&'static [Region]),
    Outside(&'static [Region]),
}

impl Scope {
    /// Check whether a marker with this scope is live in `region`
    pub fn allows(self, region: Region) -> bool {
        match self {
            Scope::Always => true,
            Scope::Within(regions) => regions.contains(&region),
            Scope::Outside(regions) => !regions.contains(&region),
        }
    }
}

/// Feature flag a marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Always part of the dialect
    Structure,
    ToolCalls,
    SearchQueries,
}

/// A literal that switches regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub literal: &'static str,
    pub action: MarkerAction,
    pub scope: Scope,
    pub feature: Feature,
}

const fn marker(
    literal: &'static str,
    action: MarkerAction,
    scope: Scope,
    feature: Feature,
) -> Marker {
    Marker {
        literal,
        action,
        scope,
        feature,
    }
}

const ANSWER_REGIONS: &[Region] = &[Region::Answer, Region::GroundedAnswer];
const QUERY_REGIONS: &[Region] = &[Region::SearchQuery];
const BETWEEN_ANSWERS: &[Region] = &[Region::Ignore, Region::ToolCall];

use Feature::{SearchQueries, Structure, ToolCalls};
use MarkerAction::{Enter, NextSearchQuery};
use Scope::{Always, Outside, Within};

static COMMAND2_MARKERS: &[Marker] = &[
    marker("Grounded answer:", Enter(Region::GroundedAnswer), Always, Structure),
    marker("Answer:", Enter(Region::Answer), Outside(ANSWER_REGIONS), Structure),
    marker("Plan:", Enter(Region::Thinking), Always, ToolCalls),
    marker("Reflection:", Enter(Region::Thinking), Always, ToolCalls),
    marker("Action:", Enter(Region::ToolCall), Always, ToolCalls),
    marker("Relevant Documents:", Enter(Region::Ignore), Always, ToolCalls),
    marker("Cited Documents:", Enter(Region::Ignore), Always, ToolCalls),
    marker("Search:", Enter(Region::SearchQuery), Always, SearchQueries),
    marker("|||", NextSearchQuery, Within(QUERY_REGIONS), SearchQueries),
    marker("\n", NextSearchQuery, Within(QUERY_REGIONS), SearchQueries),
];

static COMMAND3_MARKERS: &[Marker] = &[
    marker("<|START_RESPONSE|>", Enter(Region::GroundedAnswer), Always, Structure),
    marker("<|END_RESPONSE|>", Enter(Region::Ignore), Always, Structure),
    marker("<|START_THINKING|>", Enter(Region::Thinking), Always, Structure),
    marker("<|END_THINKING|>", Enter(Region::GroundedAnswer), Always, Structure),
    marker("<|START_ACTION|>", Enter(Region::ToolCall), Always, ToolCalls),
    marker("<|END_ACTION|>", Enter(Region::Ignore), Always, ToolCalls),
];

static COMMAND4_MARKERS: &[Marker] = &[
    marker("<|START_TEXT|>", Enter(Region::GroundedAnswer), Always, Structure),
    marker("<|END_TEXT|>", Enter(Region::Ignore), Always, Structure),
    marker("<|START_THINKING|>", Enter(Region::Thinking), Always, Structure),
    marker("<|END_THINKING|>", Enter(Region::GroundedAnswer), Always, Structure),
    marker("<|START_ACTION|>", Enter(Region::ToolCall), Always, ToolCalls),
    marker("<|END_ACTION|>", Enter(Region::Ignore), Always, ToolCalls),
];

static LLAMA_MARKERS: &[Marker] = &[
    marker("\n\n", Enter(Region::GroundedAnswer), Within(BETWEEN_ANSWERS), Structure),
    marker("<|python_tag|>", Enter(Region::ToolCall), Always, ToolCalls),
];

/// How citation spans are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationSyntax {
    /// `<co: 1,2>text</co: 1,2>`, documents of tool call 0
    Legacy,

    /// `<co>text</co: 0:[1,2],1:[3]>`, grouped by tool call
    Grouped,
}

/// Object keys of a tool call in the dialect's JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCallKeys {
    pub id: Option<&'static str>,
    pub name: &'static str,
    pub parameters: &'static str,
}

impl Dialect {
    /// Every dialect, in declaration order
    pub const ALL: [Dialect; 5] = [
        Dialect::Plain,
        Dialect::Command2,
        Dialect::Command3,
        Dialect::Command4,
        Dialect::Llama,
    ];

    /// Configuration name of the dialect
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Plain => "plain",
            Dialect::Command2 => "command2",
            Dialect::Command3 => "command3",
            Dialect::Command4 => "command4",
            Dialect::Llama => "llama",
        }
    }

    /// Region the generation starts in
    pub fn default_region(self) -> Region {
        match self {
            Dialect::Plain => Region::Text,
            Dialect::Command2 => Region::Ignore,
            // The response opener is frequently stripped as a special token
            Dialect::Command3 | Dialect::Command4 | Dialect::Llama => Region::GroundedAnswer,
        }
    }

    /// Every marker the dialect defines, before feature gating
    pub fn markers(self) -> &'static [Marker] {
        match self {
            Dialect::Plain => &[],
            Dialect::Command2 => COMMAND2_MARKERS,
            Dialect::Command3 => COMMAND3_MARKERS,
            Dialect::Command4 => COMMAND4_MARKERS,
            Dialect::Llama => LLAMA_MARKERS,
        }
    }

    /// Citation syntax, if the dialect has one
    pub fn citation_syntax(self) -> Option<CitationSyntax> {
        match self {
            Dialect::Plain => None,
            Dialect::Command2 | Dialect::Llama => Some(CitationSyntax::Legacy),
            Dialect::Command3 | Dialect::Command4 => Some(CitationSyntax::Grouped),
        }
    }

    /// Tool-call object keys
    pub fn tool_call_keys(self) -> ToolCallKeys {
        match self {
            Dialect::Command3 | Dialect::Command4 => ToolCallKeys {
                id: Some("tool_call_id"),
                name: "tool_name",
                parameters: "parameters",
            },
            Dialect::Llama => ToolCallKeys {
                id: None,
                name: "name",
                parameters: "parameters",
            },
            Dialect::Plain | Dialect::Command2 => ToolCallKeys {
                id: None,
                name: "tool_name",
                parameters: "parameters",
            },
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = streamsift_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| streamsift_core::Error::config(format!("unknown dialect: {}", s)))
    }
}

/// Markers of one dialect narrowed down to the enabled features
#[derive(Debug, Clone)]
pub struct Grammar {
    dialect: Dialect,
    markers: Vec<Marker>,
}

impl Grammar {
    /// Build the grammar for `dialect`, dropping markers of disabled
    /// features and markers the caller asked to treat as literal text
    pub fn new(
        dialect: Dialect,
        tool_calls: bool,
        search_queries: bool,
        disabled: &[String],
    ) -> Self {
        let markers = dialect
            .markers()
            .iter()
            .filter(|m| match m.feature {
                Feature::Structure => true,
                Feature::ToolCalls => tool_calls,
                Feature::SearchQueries => search_queries,
            })
            .filter(|m| !disabled.iter().any(|d| d == m.literal))
            .copied()
            .collect();

        Self { dialect, markers }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// All enabled markers
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Markers recognized while inside `region`
    pub fn active(&self, region: Region) -> impl Iterator<Item = &Marker> + '_ {
        self.markers.iter().filter(move |m| m.scope.allows(region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(grammar: &Grammar, region: Region) -> Vec<&'static str> {
        grammar.active(region).map(|m| m.literal).collect()
    }

    #[test]
    fn test_dialect_names_roundtrip() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
        assert!("command9".parse::<Dialect>().is_err());
        assert_eq!("Command3".parse::<Dialect>().unwrap(), Dialect::Command3);
    }

    #[test]
    fn test_tool_markers_follow_feature_flag() {
        let without = Grammar::new(Dialect::Command3, false, false, &[]);
        assert!(!without.markers().iter().any(|m| m.literal == "<|START_ACTION|>"));

        let with = Grammar::new(Dialect::Command3, true, false, &[]);
        assert!(with.markers().iter().any(|m| m.literal == "<|START_ACTION|>"));
    }

    #[test]
    fn test_answer_marker_is_literal_inside_answers() {
        let grammar = Grammar::new(Dialect::Command2, false, false, &[]);
        assert!(literals(&grammar, Region::Ignore).contains(&"Answer:"));
        assert!(!literals(&grammar, Region::GroundedAnswer).contains(&"Answer:"));
        assert!(!literals(&grammar, Region::Answer).contains(&"Answer:"));
    }

    #[test]
    fn test_query_separators_only_inside_queries() {
        let grammar = Grammar::new(Dialect::Command2, false, true, &[]);
        assert!(literals(&grammar, Region::SearchQuery).contains(&"\n"));
        assert!(!literals(&grammar, Region::GroundedAnswer).contains(&"\n"));
    }

    #[test]
    fn test_disabled_markers_are_removed() {
        let disabled = vec!["<|START_ACTION|>".to_string(), "<|END_ACTION|>".to_string()];
        let grammar = Grammar::new(Dialect::Command3, true, false, &disabled);
        assert_eq!(grammar.markers().len(), 4);
    }

    #[test]
    fn test_region_index_matches_all() {
        for (i, region) in Region::ALL.into_iter().enumerate() {
            assert_eq!(region.index(), i);
        }
    }
}

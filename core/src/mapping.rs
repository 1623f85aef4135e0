// core/src/mapping.rs
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the widget matches an embedding page to a discussion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mapping {
    #[default]
    #[serde(rename = "pathname")]
    Pathname,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "og:title")]
    OgTitle,
    #[serde(rename = "specific")]
    Specific,
    #[serde(rename = "number")]
    Number,
}

impl Mapping {
    pub const ALL: [Mapping; 6] = [
        Mapping::Pathname,
        Mapping::Url,
        Mapping::Title,
        Mapping::OgTitle,
        Mapping::Specific,
        Mapping::Number,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mapping::Pathname => "pathname",
            Mapping::Url => "url",
            Mapping::Title => "title",
            Mapping::OgTitle => "og:title",
            Mapping::Specific => "specific",
            Mapping::Number => "number",
        }
    }

    /// Only `specific` and `number` carry a term.
    pub fn requires_term(&self) -> bool {
        matches!(self, Mapping::Specific | Mapping::Number)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mapping::Pathname => "Discussion title contains page pathname",
            Mapping::Url => "Discussion title contains page URL",
            Mapping::Title => "Discussion title contains page <title>",
            Mapping::OgTitle => "Discussion title contains page og:title",
            Mapping::Specific => "Discussion title contains a specific term",
            Mapping::Number => "Specific discussion number",
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mapping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mapping::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownMapping(s.to_string()))
    }
}

/// Mapping choice plus its term. The term is wiped on every mapping change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSelector {
    mapping: Mapping,
    term: String,
}

impl MappingSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Sets the mapping and clears the term, even if `mapping` is unchanged.
    pub fn set_mapping(&mut self, mapping: Mapping) {
        self.mapping = mapping;
        self.term.clear();
    }

    pub fn set_term(&mut self, term: impl Into<String>) {
        self.term = term.into();
    }

    pub fn requires_term(&self) -> bool {
        self.mapping.requires_term()
    }
}

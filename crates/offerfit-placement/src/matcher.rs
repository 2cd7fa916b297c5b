//! String matchers used by placement rules.
//!
//! A matcher tests one offer field (agent id, hostname, region, zone) or a
//! canonical `name:value` attribute string. Regex matchers are anchored to
//! the whole string and compiled once at construction.

use std::fmt;

use offerfit_core::attribute::NAME_VALUE_SEPARATOR;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A compiled, full-string-anchored regular expression.
///
/// Serializes as its source pattern.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    source: String,
    compiled: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let compiled = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self { source, compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.compiled.is_match(s)
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Pattern::new(source)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.source)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StringMatcher {
    Exact { value: String },
    Regex { pattern: Pattern },
    #[default]
    Any,
}

impl StringMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        StringMatcher::Exact {
            value: value.into(),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(StringMatcher::Regex {
            pattern: Pattern::new(pattern)?,
        })
    }

    pub fn any() -> Self {
        StringMatcher::Any
    }

    /// Exact match on the canonical form `name:value`.
    pub fn attribute_exact(name: &str, value: &str) -> Self {
        Self::exact(format!("{name}{NAME_VALUE_SEPARATOR}{value}"))
    }

    /// Attribute with the literal `name` and a value matching `value_pattern`.
    pub fn attribute_regex(name: &str, value_pattern: &str) -> Result<Self, regex::Error> {
        Self::regex(format!(
            "{}{}{}",
            regex::escape(name),
            NAME_VALUE_SEPARATOR,
            value_pattern
        ))
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            StringMatcher::Exact { value } => value == s,
            StringMatcher::Regex { pattern } => pattern.is_match(s),
            StringMatcher::Any => true,
        }
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatcher::Exact { value } => write!(f, "exact({value})"),
            StringMatcher::Regex { pattern } => write!(f, "regex({})", pattern.as_str()),
            StringMatcher::Any => write!(f, "any"),
        }
    }
}

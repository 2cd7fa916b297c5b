//! Agent attributes and their canonical string form.
//!
//! Placement rules and durable labels both see attributes as `name:value`
//! strings. Scalars render with three decimals, ranges as `[a-b,c-d]`, sets
//! as `{a,b}`, and text verbatim.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Ranges;

/// Separator between an attribute's name and its value.
pub const NAME_VALUE_SEPARATOR: char = ':';

/// Separator between attributes when several are stored in one label.
pub const ATTRIBUTE_LIST_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Scalar(f64),
    Ranges(Ranges),
    Set(BTreeSet<String>),
}

/// A named agent attribute as reported in an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Text(value.into()),
        }
    }

    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: AttributeValue::Scalar(value),
        }
    }

    /// The canonical `name:value` form.
    pub fn canonical(&self) -> AttributeString {
        AttributeString {
            name: self.name.clone(),
            value: self.value.to_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(t) => write!(f, "{t}"),
            AttributeValue::Scalar(v) => write!(f, "{v:.3}"),
            AttributeValue::Ranges(r) => write!(f, "{r}"),
            AttributeValue::Set(s) => {
                write!(f, "{{")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, NAME_VALUE_SEPARATOR, self.value)
    }
}

/// An attribute already in canonical string form.
///
/// Parsing splits on the first `:` and keeps both halves verbatim, so
/// rendering a parsed string reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeString {
    pub name: String,
    pub value: String,
}

impl AttributeString {
    /// Split `name:value`. Returns `None` when no separator is present.
    pub fn parse(s: &str) -> Option<Self> {
        let (name, value) = s.split_once(NAME_VALUE_SEPARATOR)?;
        Some(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Parse a `;`-joined list, skipping empty or malformed entries.
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(ATTRIBUTE_LIST_SEPARATOR)
            .filter(|part| !part.is_empty())
            .filter_map(Self::parse)
            .collect()
    }

    /// Join canonical forms with `;`.
    pub fn join<'a>(attrs: impl IntoIterator<Item = &'a Attribute>) -> String {
        attrs
            .into_iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(&ATTRIBUTE_LIST_SEPARATOR.to_string())
    }
}

impl fmt::Display for AttributeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, NAME_VALUE_SEPARATOR, self.value)
    }
}

//! Field descriptors, the JSON values carried by the constraint field selector.

use std::fmt;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearcherError};

lazy_static! {
    static ref FIELD_PATH: Regex = Regex::new(r"^[^.\s]+(\.[^.\s]+)*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldKind {
    Date,
    Facts,
    FactStrVal,
    FactNumVal,
    /// Anything else is matched as text.
    Text,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Date => "date",
            FieldKind::Facts => "facts",
            FieldKind::FactStrVal => "fact_str_val",
            FieldKind::FactNumVal => "fact_num_val",
            FieldKind::Text => "text",
        }
    }
}

impl TryFrom<String> for FieldKind {
    type Error = SearcherError;

    fn try_from(s: String) -> Result<Self> {
        match s.as_str() {
            "date" => Ok(FieldKind::Date),
            "facts" => Ok(FieldKind::Facts),
            "fact_str_val" => Ok(FieldKind::FactStrVal),
            "fact_num_val" => Ok(FieldKind::FactNumVal),
            other if other.starts_with("fact_") => Err(SearcherError::Descriptor {
                message: format!("unsupported fact field type '{other}'"),
            }),
            _ => Ok(FieldKind::Text),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range a date picker is limited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Date fields may carry their own extremes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DateBounds>,
}

impl FieldDescriptor {
    pub fn parse(json: &str) -> Result<Self> {
        let descriptor: FieldDescriptor =
            serde_json::from_str(json).map_err(|e| SearcherError::Descriptor { message: e.to_string() })?;
        if !FIELD_PATH.is_match(&descriptor.path) {
            return Err(SearcherError::Descriptor {
                message: format!("malformed field path '{}'", descriptor.path),
            });
        }
        Ok(descriptor)
    }
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }
    /// Last path segment, present only for nested paths.
    pub fn sub_field(&self) -> Option<&str> {
        let mut segments = self.path.rsplit('.');
        let last = segments.next()?;
        segments.next().map(|_| last)
    }
    /// `author.name` is shown as `author (name)`.
    pub fn label(&self) -> String {
        match self.sub_field() {
            Some(sub) => format!("{} ({})", self.root(), sub),
            None => self.root().to_string(),
        }
    }
}

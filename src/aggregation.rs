//! Aggregation responses from `POST /aggregate`.
//!
//! The response is a JSON array; each element carries a `type`. `daterange`
//! elements are time series whose points own per-date child groups, all other
//! supported types are grouped counts nested up to three levels deep.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{Result, SearcherError};

// ------------- Bucket -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(deserialize_with = "key_to_string")]
    pub key: String,
    pub val: f64,
    #[serde(default)]
    pub children: Vec<Bucket>,
}

impl Bucket {
    pub fn new(key: &str, val: f64) -> Self {
        Self { key: key.to_string(), val, children: Vec::new() }
    }
    pub fn with_children(mut self, children: Vec<Bucket>) -> Self {
        self.children = children;
        self
    }
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

// Bucket keys are strings, numbers (years, numeric facts) or booleans.
fn key_to_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

// ------------- Grouped counts -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermsKind {
    String,
    Fact,
    FactStrVal,
    FactNumVal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAggregation {
    #[serde(rename = "type")]
    pub kind: TermsKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<Bucket>,
}

// ------------- Timeline -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    #[serde(deserialize_with = "key_to_string")]
    pub date: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

/// One labelled list of buckets shown when a timeline point is clicked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildGroup {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<TimelinePoint>,
    #[serde(default)]
    pub ykeys: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Child groups keyed by point date.
    #[serde(default)]
    pub children: BTreeMap<String, Vec<ChildGroup>>,
}

impl Timeline {
    pub fn groups_for(&self, date: &str) -> &[ChildGroup] {
        self.children.get(date).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ------------- Aggregation -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Timeline(Timeline),
    Terms(TermsAggregation),
}

/// Parse an aggregation response. Elements of unknown type are skipped.
pub fn parse_response(body: &str) -> Result<Vec<Aggregation>> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut aggregations = Vec::with_capacity(elements.len());
    for element in elements {
        let kind = element.get("type").and_then(|t| t.as_str()).unwrap_or_default().to_string();
        let parsed = match kind.as_str() {
            "daterange" => Aggregation::Timeline(from_element(element)?),
            "string" | "fact" | "fact_str_val" | "fact_num_val" => Aggregation::Terms(from_element(element)?),
            other => {
                warn!(kind = other, "skipping aggregation of unknown type");
                continue;
            }
        };
        aggregations.push(parsed);
    }
    Ok(aggregations)
}

fn from_element<T: serde::de::DeserializeOwned>(element: serde_json::Value) -> Result<T> {
    serde_json::from_value(element).map_err(|e| SearcherError::Parse { message: e.to_string() })
}

//! Identifiers for constraint rows.
//!
//! A [`FieldId`] names one top-level constraint. Fact value constraints carry
//! several rules, each addressed by a [`ConstraintId`] whose `value` part is the
//! rule's sub-identifier. Both are handed out by an [`IdAllocator`] that never
//! recycles: gaps after removals are expected.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearcherError;

// Identifier 1 belongs to the constraint row the search page renders up front.
pub const GENESIS: u64 = 1;

// ------------- FieldId -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(u64);

impl FieldId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
    pub fn get(&self) -> u64 {
        self.0
    }
    /// The DOM id of the row element, e.g. `field_4`.
    pub fn element_id(&self) -> String {
        format!("field_{}", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- ConstraintId -------------
/// Either a whole field (`4`) or one value rule of a field (`4_2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId {
    pub field: FieldId,
    pub value: Option<u32>,
}

impl ConstraintId {
    pub fn field(field: FieldId) -> Self {
        Self { field, value: None }
    }
    pub fn rule(field: FieldId, value: u32) -> Self {
        Self { field, value: Some(value) }
    }
    pub fn is_compound(&self) -> bool {
        self.value.is_some()
    }
}

impl From<FieldId> for ConstraintId {
    fn from(field: FieldId) -> Self {
        Self::field(field)
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "{}_{}", self.field, value),
            None => write!(f, "{}", self.field),
        }
    }
}

impl FromStr for ConstraintId {
    type Err = SearcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SearcherError::UnknownConstraint(s.to_string());
        let (field, value) = match s.split_once('_') {
            Some((field, value)) => (field, Some(value)),
            None => (s, None),
        };
        let field = field.parse::<u64>().map_err(|_| invalid())?;
        let value = match value {
            Some(v) => Some(v.parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };
        Ok(Self { field: FieldId(field), value })
    }
}

impl Serialize for ConstraintId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConstraintId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ------------- IdAllocator -------------
#[derive(Debug)]
pub struct IdAllocator {
    counter: u64,
    sub_counters: HashMap<FieldId, u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            counter: GENESIS,
            sub_counters: HashMap::new(),
        }
    }
    /// A fresh top-level identifier, strictly greater than every earlier one.
    pub fn next_field_id(&mut self) -> FieldId {
        self.counter += 1;
        FieldId(self.counter)
    }
    /// The next rule sub-identifier for `field`, starting at 1.
    pub fn next_sub_id(&mut self, field: FieldId) -> u32 {
        let next = self.sub_counters.entry(field).or_insert(1);
        let sub = *next;
        *next += 1;
        sub
    }
    pub fn current(&self) -> FieldId {
        FieldId(self.counter)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

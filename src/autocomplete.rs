//! Autocomplete lookups bound to individual constraint inputs.
//!
//! Every lookup is scoped by the [`ConstraintId`] of the input it was issued for,
//! and its response only ever lands in that input's [`SuggestionPanel`]. There is
//! no cancellation: a late response is still shown if the input exists.

use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifier::ConstraintId;

lazy_static! {
    // everything after the last newline
    static ref PARTIAL_LINE: Regex = Regex::new(r"[^\n]*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupAction {
    Keyup,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LookupType {
    Fact,
    Text,
}

/// Body of `POST /autocomplete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupRequest {
    pub content: String,
    pub id: ConstraintId,
    pub action: LookupAction,
    pub field_name: String,
    pub lookup_type: LookupType,
}

/// A suggestion picked from a panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Suggestion {
    pub term: String,
    #[serde(default)]
    pub concept_id: Option<String>,
    pub lookup_type: LookupType,
}

// ------------- SuggestionPanel -------------
#[derive(Debug, Clone, Default)]
pub struct SuggestionPanel {
    html: String,
    visible: bool,
    hide_at: Option<Instant>,
}

impl SuggestionPanel {
    pub fn new() -> Self {
        Self::default()
    }
    /// Show a lookup response. An empty body hides the panel.
    pub fn apply(&mut self, body: String) {
        self.visible = !body.is_empty();
        self.html = body;
    }
    pub fn hide(&mut self) {
        self.visible = false;
        self.hide_at = None;
    }
    /// Hide after `delay`, giving a click on a suggestion time to register.
    pub fn blur(&mut self, now: Instant, delay: Duration) {
        self.hide_at = Some(now + delay);
    }
    /// Apply a pending hide. Returns true when the panel was hidden.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(at) if at <= now => {
                self.hide();
                true
            }
            _ => false,
        }
    }
    pub fn is_visible(&self) -> bool {
        self.visible
    }
    pub fn is_hide_pending(&self) -> bool {
        self.hide_at.is_some()
    }
    pub fn html(&self) -> &str {
        &self.html
    }
}

// ------------- Insertion -------------
fn strip_partial_line(text: &str) -> String {
    PARTIAL_LINE.replace(text, "").into_owned()
}

/// Replace the line being typed with `term` and start a new line.
pub fn append_term(text: &str, term: &str) -> String {
    let mut result = strip_partial_line(text);
    result.push_str(term);
    result.push('\n');
    result
}

/// Like [`append_term`], but writes a concept reference `@{concept}-{term}`.
pub fn append_concept(text: &str, concept_id: &str, term: &str) -> String {
    append_term(text, &format!("@{concept_id}-{term}"))
}

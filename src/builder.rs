//! The constraint builder: adds, addresses and removes constraint rows.
//!
//! The builder owns its [`IdAllocator`], so identifiers are unique per builder
//! instance (one per page session) and never reused after a removal.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use crate::autocomplete::{
    append_concept, append_term, LookupAction, LookupRequest, LookupType, Suggestion, SuggestionPanel,
};
use crate::constraint::{
    Constraint, DateConstraint, FactConstraint, FactValueConstraint, FormPairs, MatchConstraint, MatchOperator,
    MatchType, ValueOperator, ValueRule, ValueType,
};
use crate::descriptor::{DateBounds, FieldDescriptor, FieldKind};
use crate::error::{Result, SearcherError};
use crate::identifier::{ConstraintId, FieldId, IdAllocator};

#[derive(Debug, Default)]
pub struct ConstraintBuilder {
    ids: IdAllocator,
    constraints: BTreeMap<FieldId, Constraint>,
}

impl ConstraintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint for the field chosen in the selector.
    ///
    /// `selection` is the selector's value, a JSON [`FieldDescriptor`]; an empty
    /// selection is rejected with [`SearcherError::NoFieldSelected`]. `bounds`
    /// limits the date pickers of date fields; when absent the descriptor's own
    /// range is used.
    pub fn add_field(&mut self, selection: &str, bounds: Option<DateBounds>) -> Result<FieldId> {
        if selection.trim().is_empty() {
            return Err(SearcherError::NoFieldSelected);
        }
        let descriptor = FieldDescriptor::parse(selection)?;
        let id = self.ids.next_field_id();
        let path = descriptor.path.clone();
        let label = descriptor.label();

        let constraint = match descriptor.kind {
            FieldKind::Date => Constraint::Date(DateConstraint {
                id,
                path,
                label,
                bounds: bounds.or(descriptor.range),
                from: None,
                to: None,
            }),
            FieldKind::Facts => Constraint::Fact(FactConstraint {
                id,
                path,
                label,
                operator: MatchOperator::default(),
                text: String::new(),
                suggestions: SuggestionPanel::new(),
            }),
            FieldKind::FactStrVal | FieldKind::FactNumVal => {
                let value_type = if descriptor.kind == FieldKind::FactStrVal { ValueType::Str } else { ValueType::Num };
                let sub = self.ids.next_sub_id(id);
                self.add_fact_value_field(ConstraintId::rule(id, sub), path, label, value_type);
                debug!(field = %id, kind = %descriptor.kind, "constraint added");
                return Ok(id);
            }
            FieldKind::Text => Constraint::Match(MatchConstraint {
                id,
                path,
                label,
                operator: MatchOperator::default(),
                match_type: MatchType::default(),
                slop: 0,
                text: String::new(),
                suggestions: SuggestionPanel::new(),
            }),
        };
        self.constraints.insert(id, constraint);
        debug!(field = %id, kind = %descriptor.kind, "constraint added");
        Ok(id)
    }

    /// Create a fact value constraint with its first rule, addressed by `first`.
    fn add_fact_value_field(&mut self, first: ConstraintId, path: String, label: String, value_type: ValueType) {
        let field = first.field;
        self.constraints.insert(
            field,
            Constraint::FactValue(FactValueConstraint {
                id: field,
                path,
                label,
                value_type,
                operator: MatchOperator::default(),
                rules: vec![ValueRule::new(first)],
            }),
        );
    }

    /// Append one more rule to a fact value constraint.
    pub fn add_fact_value_rule(&mut self, field: FieldId) -> Result<ConstraintId> {
        match self.constraints.get(&field) {
            Some(Constraint::FactValue(_)) => {}
            Some(_) => return Err(SearcherError::NotFactValueField(field.get())),
            None => return Err(SearcherError::UnknownConstraint(field.to_string())),
        }
        let id = ConstraintId::rule(field, self.ids.next_sub_id(field));
        if let Some(Constraint::FactValue(c)) = self.constraints.get_mut(&field) {
            c.rules.push(ValueRule::new(id));
        }
        debug!(rule = %id, "value rule added");
        Ok(id)
    }

    /// Drop a whole row and everything it owns.
    pub fn remove_field(&mut self, field: FieldId) -> bool {
        let removed = self.constraints.remove(&field).is_some();
        if removed {
            debug!(field = %field, "constraint removed");
        }
        removed
    }

    /// Drop one value rule, leaving its siblings in place.
    pub fn remove_rule(&mut self, id: ConstraintId) -> Result<()> {
        let unknown = || SearcherError::UnknownConstraint(id.to_string());
        let sub = id.value.ok_or_else(unknown)?;
        match self.constraints.get_mut(&id.field) {
            Some(Constraint::FactValue(c)) => {
                let before = c.rules.len();
                c.rules.retain(|r| r.id.value != Some(sub));
                if c.rules.len() == before {
                    return Err(unknown());
                }
                debug!(rule = %id, "value rule removed");
                Ok(())
            }
            _ => Err(unknown()),
        }
    }

    /// Remove whatever `id` addresses: a rule for compound ids, a row otherwise.
    pub fn remove(&mut self, id: ConstraintId) -> Result<()> {
        if id.is_compound() {
            self.remove_rule(id)
        } else if self.remove_field(id.field) {
            Ok(())
        } else {
            Err(SearcherError::UnknownConstraint(id.to_string()))
        }
    }

    pub fn get(&self, field: FieldId) -> Option<&Constraint> {
        self.constraints.get(&field)
    }
    pub fn get_mut(&mut self, field: FieldId) -> Option<&mut Constraint> {
        self.constraints.get_mut(&field)
    }
    pub fn contains(&self, id: ConstraintId) -> bool {
        match (self.constraints.get(&id.field), id.value) {
            (Some(_), None) => true,
            (Some(Constraint::FactValue(c)), Some(sub)) => c.rule(sub).is_some(),
            _ => false,
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }
    pub fn len(&self) -> usize {
        self.constraints.len()
    }
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
    /// Highest field identifier handed out so far.
    pub fn last_field_id(&self) -> FieldId {
        self.ids.current()
    }

    fn constraint_mut(&mut self, field: FieldId) -> Result<&mut Constraint> {
        self.constraints
            .get_mut(&field)
            .ok_or_else(|| SearcherError::UnknownConstraint(field.to_string()))
    }

    // ------------- Inputs -------------
    /// The text input `id` addresses: match or fact text, or a rule's fact name.
    fn text_mut(&mut self, id: ConstraintId) -> Result<&mut String> {
        let unknown = SearcherError::UnknownConstraint(id.to_string());
        match (self.constraints.get_mut(&id.field), id.value) {
            (Some(Constraint::Fact(c)), None) => Ok(&mut c.text),
            (Some(Constraint::Match(c)), None) => Ok(&mut c.text),
            (Some(Constraint::FactValue(c)), Some(sub)) => c.rule_mut(sub).map(|r| &mut r.fact).ok_or(unknown),
            _ => Err(unknown),
        }
    }

    pub fn text(&self, id: ConstraintId) -> Result<&str> {
        match (self.constraints.get(&id.field), id.value) {
            (Some(Constraint::Fact(c)), None) => Ok(&c.text),
            (Some(Constraint::Match(c)), None) => Ok(&c.text),
            (Some(Constraint::FactValue(c)), Some(sub)) => c
                .rule(sub)
                .map(|r| r.fact.as_str())
                .ok_or_else(|| SearcherError::UnknownConstraint(id.to_string())),
            _ => Err(SearcherError::UnknownConstraint(id.to_string())),
        }
    }

    pub fn set_text(&mut self, id: ConstraintId, text: &str) -> Result<()> {
        *self.text_mut(id)? = text.to_string();
        Ok(())
    }

    pub fn set_date_range(&mut self, field: FieldId, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
        match self.constraint_mut(field)? {
            Constraint::Date(c) => c.set_range(from, to),
            _ => Err(SearcherError::InvalidValue {
                field: field.element_id(),
                message: "not a date constraint".to_string(),
            }),
        }
    }

    pub fn set_match_options(&mut self, field: FieldId, operator: MatchOperator, match_type: MatchType, slop: u32) -> Result<()> {
        match self.constraint_mut(field)? {
            Constraint::Match(c) => {
                c.operator = operator;
                c.match_type = match_type;
                c.slop = slop;
                Ok(())
            }
            _ => Err(SearcherError::InvalidValue {
                field: field.element_id(),
                message: "not a text match constraint".to_string(),
            }),
        }
    }

    pub fn set_fact_operator(&mut self, field: FieldId, operator: MatchOperator) -> Result<()> {
        match self.constraint_mut(field)? {
            Constraint::Fact(c) => c.operator = operator,
            Constraint::FactValue(c) => c.operator = operator,
            _ => {
                return Err(SearcherError::InvalidValue {
                    field: field.element_id(),
                    message: "not a fact constraint".to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn set_rule_value(&mut self, id: ConstraintId, operator: ValueOperator, value: &str) -> Result<()> {
        let sub = id.value.ok_or_else(|| SearcherError::UnknownConstraint(id.to_string()))?;
        match self.constraint_mut(id.field)? {
            Constraint::FactValue(c) => c.set_rule(sub, operator, value),
            _ => Err(SearcherError::NotFactValueField(id.field.get())),
        }
    }

    // ------------- Autocomplete -------------
    /// Build the lookup for input `id`. Value rules look up all fact names, so
    /// they send empty content.
    pub fn lookup_request(&self, id: ConstraintId, action: LookupAction) -> Result<LookupRequest> {
        let constraint = self
            .constraints
            .get(&id.field)
            .filter(|_| self.contains(id))
            .ok_or_else(|| SearcherError::UnknownConstraint(id.to_string()))?;
        let content = match constraint {
            Constraint::FactValue(_) => String::new(),
            Constraint::Date(_) => return Err(SearcherError::UnknownConstraint(id.to_string())),
            _ => self.text(id)?.to_string(),
        };
        Ok(LookupRequest {
            content,
            id,
            action,
            field_name: constraint.path().to_string(),
            lookup_type: constraint.lookup_type(),
        })
    }

    pub fn panel(&self, id: ConstraintId) -> Option<&SuggestionPanel> {
        match (self.constraints.get(&id.field)?, id.value) {
            (Constraint::Fact(c), None) => Some(&c.suggestions),
            (Constraint::Match(c), None) => Some(&c.suggestions),
            (Constraint::FactValue(c), Some(sub)) => c.rule(sub).map(|r| &r.suggestions),
            _ => None,
        }
    }

    pub fn panel_mut(&mut self, id: ConstraintId) -> Option<&mut SuggestionPanel> {
        match (self.constraints.get_mut(&id.field)?, id.value) {
            (Constraint::Fact(c), None) => Some(&mut c.suggestions),
            (Constraint::Match(c), None) => Some(&mut c.suggestions),
            (Constraint::FactValue(c), Some(sub)) => c.rule_mut(sub).map(|r| &mut r.suggestions),
            _ => None,
        }
    }

    /// Show a lookup response in the panel of `id`. Returns false when the
    /// input has been removed in the meantime.
    pub fn apply_lookup(&mut self, id: ConstraintId, body: String) -> bool {
        match self.panel_mut(id) {
            Some(panel) => {
                panel.apply(body);
                true
            }
            None => {
                debug!(id = %id, "lookup response for a removed input dropped");
                false
            }
        }
    }

    pub fn blur(&mut self, id: ConstraintId, now: Instant, delay: Duration) -> Result<()> {
        let panel = self
            .panel_mut(id)
            .ok_or_else(|| SearcherError::UnknownConstraint(id.to_string()))?;
        panel.blur(now, delay);
        Ok(())
    }

    /// Apply due panel hides, returning how many panels were hidden.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.constraints
            .values_mut()
            .flat_map(|c| c.panels_mut())
            .map(|(_, panel)| panel.tick(now))
            .filter(|hidden| *hidden)
            .count()
    }

    /// Write a chosen suggestion into the input `id`.
    pub fn insert_suggestion(&mut self, id: ConstraintId, suggestion: &Suggestion) -> Result<()> {
        let text = self.text_mut(id)?;
        match (&suggestion.concept_id, suggestion.lookup_type) {
            (Some(concept), _) => *text = append_concept(text, concept, &suggestion.term),
            (None, LookupType::Fact) if id.is_compound() => *text = suggestion.term.clone(),
            (None, _) => *text = append_term(text, &suggestion.term),
        }
        Ok(())
    }

    // ------------- Serialization -------------
    /// The form payload for every current row, in identifier order.
    pub fn form_pairs(&self) -> FormPairs {
        let mut pairs = FormPairs::new();
        for constraint in self.constraints.values() {
            constraint.write_form(&mut pairs);
        }
        pairs
    }
}

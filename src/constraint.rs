//! The in-memory constraint tree.
//!
//! Each top-level constraint is one variant of [`Constraint`]. The rendered
//! view and the form payload sent to the backend are both derived from it, so
//! removing a node drops everything it owns, suggestion panels included.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::autocomplete::{LookupType, SuggestionPanel};
use crate::descriptor::DateBounds;
use crate::error::{Result, SearcherError};
use crate::identifier::{ConstraintId, FieldId};

/// Flat name/value pairs, the shape a serialized HTML form takes.
pub type FormPairs = Vec<(String, String)>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ------------- Selectors -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    #[default]
    Must,
    Should,
    MustNot,
}

impl MatchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOperator::Must => "must",
            MatchOperator::Should => "should",
            MatchOperator::MustNot => "must_not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Word,
    #[default]
    Phrase,
    PhrasePrefix,
    Regexp,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Word => "word",
            MatchType::Phrase => "phrase",
            MatchType::PhrasePrefix => "phrase_prefix",
            MatchType::Regexp => "regexp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Str,
    Num,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Str => "str",
            ValueType::Num => "num",
        }
    }
    /// Bracketed suffix shown after the field label.
    pub fn heading_suffix(&self) -> &'static str {
        match self {
            ValueType::Str => "[text]",
            ValueType::Num => "[num]",
        }
    }
    pub fn operators(&self) -> &'static [ValueOperator] {
        match self {
            ValueType::Str => &[ValueOperator::Eq, ValueOperator::NotEq],
            ValueType::Num => &[
                ValueOperator::Eq,
                ValueOperator::NotEq,
                ValueOperator::Lt,
                ValueOperator::Lte,
                ValueOperator::Gt,
                ValueOperator::Gte,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
}

impl ValueOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueOperator::Eq => "=",
            ValueOperator::NotEq => "!=",
            ValueOperator::Lt => "<",
            ValueOperator::Lte => "<=",
            ValueOperator::Gt => ">",
            ValueOperator::Gte => ">=",
        }
    }
}

impl fmt::Display for ValueOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------- Date -------------
#[derive(Debug, Clone)]
pub struct DateConstraint {
    pub id: FieldId,
    pub path: String,
    pub label: String,
    pub bounds: Option<DateBounds>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateConstraint {
    fn check(&self, date: NaiveDate) -> Result<NaiveDate> {
        match self.bounds {
            Some(bounds) if !bounds.contains(date) => Err(SearcherError::InvalidValue {
                field: self.id.element_id(),
                message: format!("{date} is outside {} .. {}", bounds.min, bounds.max),
            }),
            _ => Ok(date),
        }
    }
    /// Both ends are validated before either is stored.
    pub fn set_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
        let from = from.map(|d| self.check(d)).transpose()?;
        let to = to.map(|d| self.check(d)).transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(SearcherError::InvalidValue {
                    field: self.id.element_id(),
                    message: format!("{from} is after {to}"),
                });
            }
        }
        self.from = from;
        self.to = to;
        Ok(())
    }
}

// ------------- Fact -------------
#[derive(Debug, Clone)]
pub struct FactConstraint {
    pub id: FieldId,
    pub path: String,
    pub label: String,
    pub operator: MatchOperator,
    pub text: String,
    pub suggestions: SuggestionPanel,
}

// ------------- Fact value -------------
#[derive(Debug, Clone)]
pub struct ValueRule {
    pub id: ConstraintId,
    /// Fact name the rule applies to.
    pub fact: String,
    pub operator: ValueOperator,
    pub value: String,
    pub suggestions: SuggestionPanel,
}

impl ValueRule {
    pub fn new(id: ConstraintId) -> Self {
        Self {
            id,
            fact: String::new(),
            operator: ValueOperator::default(),
            value: String::new(),
            suggestions: SuggestionPanel::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FactValueConstraint {
    pub id: FieldId,
    pub path: String,
    pub label: String,
    pub value_type: ValueType,
    pub operator: MatchOperator,
    pub rules: Vec<ValueRule>,
}

impl FactValueConstraint {
    /// `author [facts] [text]`
    pub fn heading(&self) -> String {
        format!("{} [facts] {}", self.label, self.value_type.heading_suffix())
    }
    pub fn rule(&self, sub: u32) -> Option<&ValueRule> {
        self.rules.iter().find(|r| r.id.value == Some(sub))
    }
    pub fn rule_mut(&mut self, sub: u32) -> Option<&mut ValueRule> {
        self.rules.iter_mut().find(|r| r.id.value == Some(sub))
    }
    pub fn set_rule(&mut self, sub: u32, operator: ValueOperator, value: &str) -> Result<()> {
        let value_type = self.value_type;
        let field = ConstraintId::rule(self.id, sub).to_string();
        if !value_type.operators().contains(&operator) {
            return Err(SearcherError::InvalidValue {
                field,
                message: format!("operator {operator} does not apply to {} values", value_type.as_str()),
            });
        }
        let value = value.trim();
        if value_type == ValueType::Num && !value.is_empty() && value.parse::<f64>().is_err() {
            return Err(SearcherError::InvalidValue {
                field,
                message: format!("'{value}' is not a number"),
            });
        }
        let rule = self
            .rule_mut(sub)
            .ok_or_else(|| SearcherError::UnknownConstraint(field.clone()))?;
        rule.operator = operator;
        rule.value = value.to_string();
        Ok(())
    }
}

// ------------- Match -------------
#[derive(Debug, Clone)]
pub struct MatchConstraint {
    pub id: FieldId,
    pub path: String,
    pub label: String,
    pub operator: MatchOperator,
    pub match_type: MatchType,
    pub slop: u32,
    pub text: String,
    pub suggestions: SuggestionPanel,
}

// ------------- Constraint -------------
#[derive(Debug, Clone)]
pub enum Constraint {
    Date(DateConstraint),
    Fact(FactConstraint),
    FactValue(FactValueConstraint),
    Match(MatchConstraint),
}

impl Constraint {
    pub fn id(&self) -> FieldId {
        match self {
            Constraint::Date(c) => c.id,
            Constraint::Fact(c) => c.id,
            Constraint::FactValue(c) => c.id,
            Constraint::Match(c) => c.id,
        }
    }
    pub fn path(&self) -> &str {
        match self {
            Constraint::Date(c) => &c.path,
            Constraint::Fact(c) => &c.path,
            Constraint::FactValue(c) => &c.path,
            Constraint::Match(c) => &c.path,
        }
    }
    pub fn label(&self) -> &str {
        match self {
            Constraint::Date(c) => &c.label,
            Constraint::Fact(c) => &c.label,
            Constraint::FactValue(c) => &c.label,
            Constraint::Match(c) => &c.label,
        }
    }
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Date(_) => "date",
            Constraint::Fact(_) => "facts",
            Constraint::FactValue(c) => match c.value_type {
                ValueType::Str => "fact_str_val",
                ValueType::Num => "fact_num_val",
            },
            Constraint::Match(_) => "text",
        }
    }
    /// Autocomplete flavour of the row's text input(s).
    pub fn lookup_type(&self) -> LookupType {
        match self {
            Constraint::Match(_) => LookupType::Text,
            _ => LookupType::Fact,
        }
    }
    /// Every suggestion panel the row owns, keyed by the id it answers to.
    pub fn panels_mut(&mut self) -> Vec<(ConstraintId, &mut SuggestionPanel)> {
        match self {
            Constraint::Date(_) => Vec::new(),
            Constraint::Fact(c) => vec![(ConstraintId::field(c.id), &mut c.suggestions)],
            Constraint::Match(c) => vec![(ConstraintId::field(c.id), &mut c.suggestions)],
            Constraint::FactValue(c) => c.rules.iter_mut().map(|r| (r.id, &mut r.suggestions)).collect(),
        }
    }
    /// Append this row's inputs, named uniquely by identifier.
    pub fn write_form(&self, out: &mut FormPairs) {
        let mut push = |name: String, value: &str| out.push((name, value.to_string()));
        match self {
            Constraint::Date(c) => {
                let n = c.id;
                let format = |d: Option<NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default();
                push(format!("daterange_field_{n}"), &c.path);
                push(format!("daterange_from_{n}"), &format(c.from));
                push(format!("daterange_to_{n}"), &format(c.to));
            }
            Constraint::Fact(c) => {
                let n = c.id;
                push(format!("fact_operator_{n}"), c.operator.as_str());
                push(format!("fact_field_{n}"), &c.path);
                push(format!("fact_txt_{n}"), &c.text);
            }
            Constraint::FactValue(c) => {
                let n = c.id;
                push(format!("fact_operator_{n}"), c.operator.as_str());
                push(format!("fact_field_{n}"), &c.path);
                push(format!("fact_constraint_type_{n}"), c.value_type.as_str());
                for rule in &c.rules {
                    let r = rule.id;
                    push(format!("fact_txt_{r}"), &rule.fact);
                    push(format!("fact_constraint_op_{r}"), rule.operator.as_str());
                    push(format!("fact_constraint_val_{r}"), &rule.value);
                }
            }
            Constraint::Match(c) => {
                let n = c.id;
                push(format!("match_operator_{n}"), c.operator.as_str());
                push(format!("match_field_{n}"), &c.path);
                push(format!("match_type_{n}"), c.match_type.as_str());
                push(format!("match_slop_{n}"), &c.slop.to_string());
                push(format!("match_txt_{n}"), &c.text);
            }
        }
    }
}

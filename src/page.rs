//! Page-level form inputs outside the constraint rows: the aggregation
//! fields, more-like-this document feedback, the mapping field checkboxes and
//! the saved searches ticked for reuse.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::SavedSearch;
use crate::constraint::{FormPairs, DATE_FORMAT};
use crate::descriptor::{FieldDescriptor, FieldKind};
use crate::error::{Result, SearcherError};

// ------------- Aggregation settings -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Terms,
    SignificantTerms,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Terms => "terms",
            SortBy::SignificantTerms => "significant_terms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Day => "day",
            Interval::Week => "week",
            Interval::Month => "month",
            Interval::Quarter => "quarter",
            Interval::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreqNorm {
    #[default]
    RawFrequency,
    RelativeFrequency,
}

impl FreqNorm {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreqNorm::RawFrequency => "raw_frequency",
            FreqNorm::RelativeFrequency => "relative_frequency",
        }
    }
}

/// Options applying to one aggregation field. Date fields use the interval,
/// normalisation and range; the others use the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggOptions {
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub freq_norm: FreqNorm,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// One "aggregate by" selector.
#[derive(Debug, Clone, PartialEq)]
pub struct AggField {
    /// The descriptor JSON as selected, posted unchanged.
    pub selection: String,
    pub descriptor: FieldDescriptor,
    pub options: AggOptions,
}

impl AggField {
    /// Selecting a date field resets its range to the field's extremes.
    pub fn select(selection: &str) -> Result<Self> {
        if selection.trim().is_empty() {
            return Err(SearcherError::NoFieldSelected);
        }
        let descriptor = FieldDescriptor::parse(selection)?;
        let mut options = AggOptions::default();
        if let (FieldKind::Date, Some(range)) = (descriptor.kind, descriptor.range) {
            options.from = Some(range.min);
            options.to = Some(range.max);
        }
        Ok(Self {
            selection: selection.to_string(),
            descriptor,
            options,
        })
    }
    pub fn is_date(&self) -> bool {
        self.descriptor.kind == FieldKind::Date
    }

    /// Replace the options; a date range must lie within the field's extremes
    /// and run forwards.
    pub fn set_options(&mut self, nr: u8, options: AggOptions) -> Result<()> {
        let invalid = |message: String| SearcherError::InvalidValue {
            field: format!("agg_daterange_{nr}"),
            message,
        };
        if let Some(range) = self.descriptor.range {
            for date in [options.from, options.to].into_iter().flatten() {
                if !range.contains(date) {
                    return Err(invalid(format!("{date} is outside {} .. {}", range.min, range.max)));
                }
            }
        }
        if let (Some(from), Some(to)) = (options.from, options.to) {
            if from > to {
                return Err(invalid(format!("{from} is after {to}")));
            }
        }
        self.options = options;
        Ok(())
    }

    /// Hidden inputs are still part of the form, so every option is written.
    fn write_form(&self, nr: u8, out: &mut FormPairs) {
        let o = &self.options;
        let format = |d: Option<NaiveDate>| d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default();
        out.push((format!("agg_field_{nr}"), self.selection.clone()));
        out.push((format!("sort_by_{nr}"), o.sort_by.as_str().to_string()));
        out.push((format!("interval_{nr}"), o.interval.as_str().to_string()));
        out.push((format!("freq_norm_{nr}"), o.freq_norm.as_str().to_string()));
        out.push((format!("agg_daterange_from_{nr}"), format(o.from)));
        out.push((format!("agg_daterange_to_{nr}"), format(o.to)));
    }
}

/// The first aggregation field and the optional second one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationForm {
    first: Option<AggField>,
    second: Option<AggField>,
    second_selected: bool,
}

impl AggregationForm {
    pub fn field(&self, nr: u8) -> Result<Option<&AggField>> {
        match nr {
            1 => Ok(self.first.as_ref()),
            2 => Ok(self.second.as_ref()),
            _ => Err(SearcherError::UnknownConstraint(format!("agg_field_{nr}"))),
        }
    }
    fn slot(&mut self, nr: u8) -> Result<&mut Option<AggField>> {
        match nr {
            1 => Ok(&mut self.first),
            2 => Ok(&mut self.second),
            _ => Err(SearcherError::UnknownConstraint(format!("agg_field_{nr}"))),
        }
    }
    pub fn select(&mut self, nr: u8, selection: &str) -> Result<&AggField> {
        let field = AggField::select(selection)?;
        let slot = self.slot(nr)?;
        Ok(&*slot.insert(field))
    }
    pub fn set_options(&mut self, nr: u8, options: AggOptions) -> Result<()> {
        match self.slot(nr)? {
            Some(field) => field.set_options(nr, options),
            None => Err(SearcherError::UnknownConstraint(format!("agg_field_{nr}"))),
        }
    }
    /// Show or hide the second selector. Its settings survive being hidden.
    pub fn toggle_second(&mut self, selected: bool) {
        self.second_selected = selected;
    }
    pub fn is_second_selected(&self) -> bool {
        self.second_selected
    }
    /// There is something to aggregate by.
    pub fn is_ready(&self) -> bool {
        self.first.is_some()
    }

    pub fn write_form(&self, out: &mut FormPairs) {
        if let Some(field) = &self.first {
            field.write_form(1, out);
        }
        if let Some(field) = &self.second {
            field.write_form(2, out);
        }
        out.push(("agg_field_2_selected".to_string(), self.second_selected.to_string()));
    }
}

// ------------- More like this -------------
/// Documents the user accepted or rejected from a more-like-this listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MltFeedback {
    accepted: Vec<String>,
    rejected: Vec<String>,
}

impl MltFeedback {
    /// A document is judged once; later clicks on it are ignored.
    fn judge(&mut self, id: &str, accept: bool) -> bool {
        if id.is_empty() || self.accepted.iter().chain(&self.rejected).any(|d| d == id) {
            return false;
        }
        let list = if accept { &mut self.accepted } else { &mut self.rejected };
        list.push(id.to_string());
        true
    }
    pub fn accept(&mut self, id: &str) -> bool {
        self.judge(id, true)
    }
    pub fn reject(&mut self, id: &str) -> bool {
        self.judge(id, false)
    }
    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn write_form(&self, out: &mut FormPairs) {
        let lines = |ids: &[String]| ids.iter().map(|id| format!("{id}\n")).collect::<String>();
        out.push(("docs".to_string(), lines(&self.accepted[..])));
        out.push(("docs_rejected".to_string(), lines(&self.rejected[..])));
    }
}

// ------------- Mapping fields -------------
/// The `mapping_field_*` checkboxes choosing which fields results show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingFields {
    available: Vec<String>,
    checked: BTreeSet<String>,
}

impl MappingFields {
    /// Replace the offered fields; checks on fields still offered are kept.
    pub fn set_available(&mut self, fields: Vec<String>) {
        self.checked.retain(|f| fields.contains(f));
        self.available = fields;
    }
    pub fn set_checked(&mut self, field: &str, checked: bool) -> Result<()> {
        if !self.available.iter().any(|f| f == field) {
            return Err(SearcherError::UnknownConstraint(format!("mapping_field_{field}")));
        }
        if checked {
            self.checked.insert(field.to_string());
        } else {
            self.checked.remove(field);
        }
        Ok(())
    }
    /// The "check all" box: every offered field follows it.
    pub fn select_all(&mut self, checked: bool) {
        self.checked = if checked { self.available.iter().cloned().collect() } else { BTreeSet::new() };
    }
    pub fn is_checked(&self, field: &str) -> bool {
        self.checked.contains(field)
    }
    pub fn checked(&self) -> Vec<&str> {
        self.available.iter().filter(|f| self.checked.contains(*f)).map(String::as_str).collect()
    }

    /// Unchecked boxes are not submitted.
    pub fn write_form(&self, out: &mut FormPairs) {
        for field in self.checked() {
            out.push((format!("mapping_field_{field}"), field.to_string()));
        }
    }
}

// ------------- PageOptions -------------
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub aggregation: AggregationForm,
    pub mlt: MltFeedback,
    pub mapping_fields: MappingFields,
    /// Saved searches ticked in the listing.
    pub saved_selection: BTreeSet<u64>,
}

impl PageOptions {
    /// Ticked saved searches are named by their position in the listing.
    pub fn write_form(&self, saved: &[SavedSearch], out: &mut FormPairs) {
        self.aggregation.write_form(out);
        self.mlt.write_form(out);
        self.mapping_fields.write_form(out);
        for (i, search) in saved.iter().enumerate() {
            if self.saved_selection.contains(&search.id) {
                out.push((format!("saved_search_{i}"), search.id.to_string()));
            }
        }
    }
}

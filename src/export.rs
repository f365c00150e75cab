//! CSV export of aggregations or example rows.
//!
//! The backend reads a JSON array of `{name, value}` pairs from the `args`
//! query parameter: the serialized form followed by the export options.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constraint::FormPairs;
use crate::error::{Result, SearcherError};
use crate::preferences::HiddenFeatures;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

impl NamedValue {
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

pub fn named_values(form: &FormPairs) -> Vec<NamedValue> {
    form.iter().map(|(name, value)| NamedValue::new(name, value.as_str())).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Agg,
    Examples,
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Agg => "agg",
            ExportType::Examples => "examples",
        }
    }
}

/// Paging state of the examples table: first row shown and rows per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PagingInfo {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "extent", rename_all = "lowercase")]
pub enum Extent {
    /// The page currently shown.
    Page,
    /// An inclusive range of 1-based page numbers.
    Pages { start_page: usize, end_page: usize },
    All,
    /// The first `rows` examples.
    Rows { rows: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    All,
    #[default]
    Visible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub export_type: ExportType,
    /// File name without the `.csv` extension.
    pub filename: String,
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub features: FeatureSelection,
}

impl ExportRequest {
    pub fn args(
        &self,
        form: &FormPairs,
        paging: PagingInfo,
        columns: &[String],
        hidden: &HiddenFeatures,
    ) -> Result<Vec<NamedValue>> {
        let mut args = named_values(form);
        args.push(NamedValue::new("export_type", self.export_type.as_str()));
        args.push(NamedValue::new("filename", format!("{}.csv", self.filename)));
        if self.export_type == ExportType::Agg {
            return Ok(args);
        }

        match self.extent.unwrap_or(Extent::Page) {
            Extent::Page => {
                args.push(NamedValue::new("examples_start", paging.start));
                args.push(NamedValue::new("num_examples", paging.length));
            }
            Extent::Pages { start_page, end_page } => {
                if start_page == 0 || end_page < start_page {
                    return Err(SearcherError::InvalidValue {
                        field: "export-pages".to_string(),
                        message: format!("invalid page range {start_page}..{end_page}"),
                    });
                }
                let pages = end_page - start_page + 1;
                let start = (start_page - 1).checked_mul(paging.length);
                let count = pages.checked_mul(paging.length);
                let (Some(start), Some(count)) = (start, count) else {
                    return Err(SearcherError::InvalidValue {
                        field: "export-pages".to_string(),
                        message: format!("page range {start_page}..{end_page} is too large"),
                    });
                };
                args.push(NamedValue::new("examples_start", start));
                args.push(NamedValue::new("num_examples", count));
            }
            Extent::All => args.push(NamedValue::new("num_examples", "*")),
            Extent::Rows { rows } => {
                args.push(NamedValue::new("examples_start", 0));
                args.push(NamedValue::new("num_examples", rows));
            }
        }

        let features: Vec<&String> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| self.features == FeatureSelection::All || !hidden.is_hidden(*i))
            .map(|(_, name)| name)
            .collect();
        args.push(NamedValue::new("features", json!(features)));
        Ok(args)
    }
}

/// `{backend}/export?args=<json>`, url-encoded.
pub fn export_url(backend: &str, args: &[NamedValue]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/export", backend.trim_end_matches('/')))
        .map_err(|e| SearcherError::Config(format!("backend url '{backend}': {e}")))?;
    url.query_pairs_mut().append_pair("args", &serde_json::to_string(args)?);
    Ok(url)
}

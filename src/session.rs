//! One user's search page.
//!
//! [`SearchSession`] is the synchronous page state: constraints, the results
//! pane, hidden columns and saved searches. [`SessionHandle`] runs the backend
//! round-trips. It never holds the session lock across an await, so lookups
//! and edits on other inputs proceed while a request is in flight.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregation::parse_response;
use crate::autocomplete::{LookupAction, Suggestion};
use crate::backend::{Backend, SavedSearch};
use crate::builder::ConstraintBuilder;
use crate::config::Timing;
use crate::constraint::{Constraint, FormPairs};
use crate::descriptor::DateBounds;
use crate::drilldown::{AggregationView, TimelineSelection};
use crate::error::{Result, SearcherError};
use crate::export::{export_url, ExportRequest, PagingInfo};
use crate::identifier::{ConstraintId, FieldId};
use crate::notify::{resource_update_outcome, Notification, Resource, DELETION_STARTED};
use crate::page::{AggField, PageOptions};
use crate::preferences::{HiddenFeatures, Preferences};
use crate::render;
use crate::timing::Debouncer;

lazy_static! {
    static ref HEADER_CELL: Regex = Regex::new(r"(?s)<th[^>]*>(.*?)</th>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Column names of a rendered table header, in order.
pub fn header_columns(html: &str) -> Vec<String> {
    HEADER_CELL
        .captures_iter(html)
        .map(|cap| TAG.replace_all(&cap[1], "").trim().to_string())
        .collect()
}

// ------------- ResultsPane -------------
#[derive(Debug, Clone, Default)]
pub enum ResultsPane {
    #[default]
    Empty,
    Loading,
    Html(String),
    Aggregations(AggregationView),
    /// The last request failed; shown where results were expected.
    Failed(String),
}

impl ResultsPane {
    pub fn render(&self) -> String {
        match self {
            ResultsPane::Empty => String::new(),
            ResultsPane::Loading => "Loading...".to_string(),
            ResultsPane::Html(html) => html.clone(),
            ResultsPane::Aggregations(view) => render::aggregation_view(view),
            ResultsPane::Failed(message) => render::failed_row(message),
        }
    }
    pub fn is_failed(&self) -> bool {
        matches!(self, ResultsPane::Failed(_))
    }
}

/// What a keystroke in an input led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyupOutcome {
    /// A text match input: a query runs once typing pauses.
    QueryScheduled,
    /// A fact input: the lookup ran and its panel is visible or not.
    LookedUp { visible: bool },
}

// ------------- SearchSession -------------
pub struct SearchSession {
    pub dataset: String,
    pub mapping: String,
    builder: ConstraintBuilder,
    results: ResultsPane,
    timing: Timing,
    debouncer: Debouncer,
    columns: Vec<String>,
    hidden: HiddenFeatures,
    paging: PagingInfo,
    saved: Vec<SavedSearch>,
    page: PageOptions,
    query_json: Option<String>,
}

impl SearchSession {
    pub fn new(dataset: &str, mapping: &str, timing: Timing) -> Self {
        Self {
            dataset: dataset.to_string(),
            mapping: mapping.to_string(),
            builder: ConstraintBuilder::new(),
            results: ResultsPane::Empty,
            timing,
            debouncer: Debouncer::new(timing.debounce),
            columns: Vec::new(),
            hidden: HiddenFeatures::new(),
            paging: PagingInfo::default(),
            saved: Vec::new(),
            page: PageOptions::default(),
            query_json: None,
        }
    }
    pub fn builder(&self) -> &ConstraintBuilder {
        &self.builder
    }
    pub fn builder_mut(&mut self) -> &mut ConstraintBuilder {
        &mut self.builder
    }
    pub fn results(&self) -> &ResultsPane {
        &self.results
    }
    pub fn timing(&self) -> Timing {
        self.timing
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn hidden(&self) -> &HiddenFeatures {
        &self.hidden
    }
    pub fn paging(&self) -> PagingInfo {
        self.paging
    }
    pub fn saved_searches(&self) -> &[SavedSearch] {
        &self.saved
    }
    pub fn page(&self) -> &PageOptions {
        &self.page
    }
    pub fn page_mut(&mut self) -> &mut PageOptions {
        &mut self.page
    }
    /// Tick or untick a saved search for reuse in the next query.
    pub fn select_saved_search(&mut self, id: u64, selected: bool) -> Result<()> {
        if !self.saved.iter().any(|s| s.id == id) {
            return Err(SearcherError::UnknownConstraint(format!("search_{id}")));
        }
        if selected {
            self.page.saved_selection.insert(id);
        } else {
            self.page.saved_selection.remove(&id);
        }
        Ok(())
    }
    pub fn query_json(&self) -> Option<&str> {
        self.query_json.as_deref()
    }
    pub fn is_query_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Constraint pairs plus the page-level inputs.
    pub fn form(&self) -> FormPairs {
        let mut pairs = self.builder.form_pairs();
        pairs.push(("dataset".to_string(), self.dataset.clone()));
        pairs.push(("mapping".to_string(), self.mapping.clone()));
        self.page.write_form(&self.saved, &mut pairs);
        pairs
    }

    pub fn blur(&mut self, id: ConstraintId, now: Instant) -> Result<()> {
        self.builder.blur(id, now, self.timing.hide_delay)
    }

    /// Due panel hides are applied; returns true when a debounced query is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        let hidden = self.builder.tick(now);
        if hidden > 0 {
            debug!(hidden, "suggestion panels hidden");
        }
        self.debouncer.poll(now)
    }

    pub fn expand(&mut self, panel: usize, level: usize, row: usize) -> Result<()> {
        self.aggregations_mut()?.expand(panel, level, row)
    }
    pub fn select_date(&mut self, panel: usize, date: &str) -> Result<TimelineSelection> {
        Ok(self.aggregations_mut()?.select_date(panel, date)?.clone())
    }
    pub fn show_values(&mut self, panel: usize, group: usize, row: usize) -> Result<()> {
        self.aggregations_mut()?.show_values(panel, group, row)
    }
    fn aggregations_mut(&mut self) -> Result<&mut AggregationView> {
        match &mut self.results {
            ResultsPane::Aggregations(view) => Ok(view),
            _ => Err(SearcherError::UnknownConstraint("aggregation view".to_string())),
        }
    }

    pub fn column_toggles(&self) -> String {
        render::column_toggles(&self.columns, &self.hidden)
    }
}

// ------------- SessionHandle -------------
#[derive(Clone)]
pub struct SessionHandle {
    pub id: u64,
    state: Arc<Mutex<SearchSession>>,
    backend: Arc<dyn Backend>,
    preferences: Preferences,
}

impl SessionHandle {
    pub fn new(id: u64, session: SearchSession, backend: Arc<dyn Backend>, preferences: Preferences) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(session)),
            backend,
            preferences,
        }
    }

    /// Run `f` with the session locked.
    pub async fn with<T>(&self, f: impl FnOnce(&mut SearchSession) -> T) -> T {
        let mut session = self.state.lock().await;
        f(&mut session)
    }

    async fn form(&self) -> FormPairs {
        self.state.lock().await.form()
    }

    /// Preference stores may block on SQLite, so they run off the executor.
    async fn with_preferences<T: Send + 'static>(
        &self,
        f: impl FnOnce(&Preferences) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let preferences = self.preferences.clone();
        tokio::task::spawn_blocking(move || f(&preferences))
            .await
            .map_err(|e| SearcherError::Persistence(format!("preference task failed: {e}")))?
    }

    /// Results-pane requests share the same failure handling: the pane shows
    /// the error and the error is returned.
    async fn fail(&self, endpoint: &str, error: SearcherError) -> SearcherError {
        warn!(session = self.id, endpoint, error = %error, "request failed");
        self.state.lock().await.results = ResultsPane::Failed(error.to_string());
        error
    }

    // ------------- Constraints -------------
    /// Add a row and return its rendered markup.
    pub async fn add_field(&self, selection: &str, bounds: Option<DateBounds>) -> Result<String> {
        let mut session = self.state.lock().await;
        let field = session.builder.add_field(selection, bounds)?;
        let constraint = session
            .builder
            .get(field)
            .ok_or_else(|| SearcherError::UnknownConstraint(field.to_string()))?;
        info!(session = self.id, field = %field, kind = constraint.kind_name(), "field added");
        Ok(render::constraint_row(constraint))
    }

    pub async fn add_rule(&self, field: FieldId) -> Result<String> {
        let mut session = self.state.lock().await;
        let id = session.builder.add_fact_value_rule(field)?;
        match session.builder.get(field) {
            Some(Constraint::FactValue(c)) => c
                .rule(id.value.unwrap_or_default())
                .map(|rule| render::value_rule_row(c, rule))
                .ok_or_else(|| SearcherError::UnknownConstraint(id.to_string())),
            _ => Err(SearcherError::NotFactValueField(field.get())),
        }
    }

    pub async fn remove(&self, id: ConstraintId) -> Result<()> {
        self.state.lock().await.builder.remove(id)?;
        info!(session = self.id, id = %id, "constraint removed");
        Ok(())
    }

    // ------------- Autocomplete -------------
    /// Issue a lookup for input `id`. Returns whether its panel is visible.
    pub async fn lookup(&self, id: ConstraintId, action: LookupAction) -> Result<bool> {
        let request = self.state.lock().await.builder.lookup_request(id, action)?;
        debug!(session = self.id, id = %id, ?action, "lookup issued");
        match self.backend.autocomplete(&request).await {
            Ok(body) => {
                let mut session = self.state.lock().await;
                session.builder.apply_lookup(id, body);
                Ok(session.builder.panel(id).is_some_and(|p| p.is_visible()))
            }
            Err(e) => {
                warn!(session = self.id, id = %id, error = %e, "lookup failed");
                if let Some(panel) = self.state.lock().await.builder.panel_mut(id) {
                    panel.hide();
                }
                Err(e)
            }
        }
    }

    /// New text in input `id`. Match inputs re-query after a pause in typing,
    /// the others look up suggestions.
    pub async fn keyup(&self, id: ConstraintId, text: &str, now: Instant) -> Result<KeyupOutcome> {
        let is_match = {
            let mut session = self.state.lock().await;
            session.builder.set_text(id, text)?;
            let is_match = matches!(session.builder.get(id.field), Some(Constraint::Match(_)));
            if is_match {
                session.debouncer.touch(now);
            }
            is_match
        };
        if is_match {
            return Ok(KeyupOutcome::QueryScheduled);
        }
        let visible = self.lookup(id, LookupAction::Keyup).await?;
        Ok(KeyupOutcome::LookedUp { visible })
    }

    pub async fn blur(&self, id: ConstraintId, now: Instant) -> Result<()> {
        self.state.lock().await.blur(id, now)
    }

    /// Insert a chosen suggestion and hide the panel it came from.
    pub async fn insert_suggestion(&self, id: ConstraintId, suggestion: &Suggestion) -> Result<String> {
        let mut session = self.state.lock().await;
        session.builder.insert_suggestion(id, suggestion)?;
        if let Some(panel) = session.builder.panel_mut(id) {
            panel.hide();
        }
        Ok(session.builder.text(id)?.to_string())
    }

    // ------------- Results -------------
    /// Load the examples table header and replay the stored hidden columns.
    /// An unreadable preference is logged and every column stays visible.
    pub async fn query(&self) -> Result<String> {
        let (form, dataset, mapping) = {
            let mut session = self.state.lock().await;
            session.debouncer.cancel();
            session.results = ResultsPane::Loading;
            (session.form(), session.dataset.clone(), session.mapping.clone())
        };
        let html = match self.backend.table_header(&form).await {
            Ok(html) => html,
            Err(e) => return Err(self.fail("table_header", e).await),
        };
        let hidden = self
            .with_preferences(move |p| p.load_hidden(&dataset, &mapping, Utc::now()))
            .await
            .unwrap_or_else(|e| {
                warn!(session = self.id, error = %e, "hidden columns not restored");
                HiddenFeatures::new()
            });
        let mut session = self.state.lock().await;
        session.columns = header_columns(&html);
        session.hidden = hidden;
        session.paging = PagingInfo { start: 0, length: session.paging.length.max(10) };
        session.results = ResultsPane::Html(html.clone());
        info!(session = self.id, columns = session.columns.len(), "query executed");
        Ok(html)
    }

    pub async fn table_content(&self, paging: PagingInfo) -> Result<String> {
        let form = {
            let mut session = self.state.lock().await;
            session.paging = paging;
            session.form()
        };
        self.backend.table_content(&form, paging).await
    }

    /// Choose the field aggregation selector `nr` (1 or 2) groups by.
    pub async fn select_agg_field(&self, nr: u8, selection: &str) -> Result<AggField> {
        let mut session = self.state.lock().await;
        let field = session.page.aggregation.select(nr, selection)?.clone();
        info!(session = self.id, nr, path = %field.descriptor.path, "aggregation field selected");
        Ok(field)
    }

    /// Aggregate by the selected aggregation fields. Nothing is requested
    /// until the first one is chosen.
    pub async fn aggregate(&self) -> Result<String> {
        let (depth, ready) = {
            let session = self.state.lock().await;
            (session.timing.drilldown_depth, session.page.aggregation.is_ready())
        };
        if !ready {
            return Err(SearcherError::NoFieldSelected);
        }
        let form = self.start_loading().await;
        let body = match self.backend.aggregate(&form).await {
            Ok(body) => body,
            Err(e) => return Err(self.fail("aggregate", e).await),
        };
        let aggregations = match parse_response(&body) {
            Ok(aggregations) => aggregations,
            Err(e) => return Err(self.fail("aggregate", e).await),
        };
        let view = AggregationView::display(aggregations, depth);
        info!(session = self.id, timelines = view.timelines.len(), terms = view.terms.len(), "aggregation rendered");
        let mut session = self.state.lock().await;
        session.results = ResultsPane::Aggregations(view);
        Ok(session.results.render())
    }

    pub async fn cluster_query(&self) -> Result<String> {
        let form = self.start_loading().await;
        let result = self.backend.cluster_query(&form).await;
        self.show_html("cluster_query", result).await
    }
    pub async fn mlt_query(&self) -> Result<String> {
        let form = self.start_loading().await;
        let result = self.backend.mlt_query(&form).await;
        self.show_html("mlt_query", result).await
    }
    async fn start_loading(&self) -> FormPairs {
        let mut session = self.state.lock().await;
        session.results = ResultsPane::Loading;
        session.form()
    }
    async fn show_html(&self, endpoint: &str, result: Result<String>) -> Result<String> {
        match result {
            Ok(html) => {
                self.state.lock().await.results = ResultsPane::Html(html.clone());
                Ok(html)
            }
            Err(e) => Err(self.fail(endpoint, e).await),
        }
    }

    /// Start deleting every matching document. An empty answer means nothing
    /// was started.
    pub async fn remove_by_query(&self) -> Result<Option<Notification>> {
        let form = self.form().await;
        let body = self.backend.remove_by_query(&form).await?;
        Ok((!body.is_empty()).then(|| Notification::info(DELETION_STARTED)))
    }

    /// The backend's query for the current form, pretty-printed.
    pub async fn get_query(&self) -> Result<Option<String>> {
        let form = self.form().await;
        let body = self.backend.get_query(&form).await?;
        if body.is_empty() {
            return Ok(None);
        }
        let value: serde_json::Value = serde_json::from_str(&body)?;
        let pretty = serde_json::to_string_pretty(&value)?;
        self.state.lock().await.query_json = Some(pretty.clone());
        Ok(Some(pretty))
    }

    pub async fn update_resource(&self, resource: Resource, params: FormPairs) -> Notification {
        match self.backend.update_resource(resource, &params).await {
            Ok(body) => resource_update_outcome(resource, &body),
            Err(e) => {
                warn!(session = self.id, ?resource, error = %e, "resource update failed");
                resource_update_outcome(resource, "")
            }
        }
    }

    // ------------- Saved searches -------------
    pub async fn save(&self, description: &str) -> Result<Vec<SavedSearch>> {
        let mut form = self.form().await;
        form.push(("search_description".to_string(), description.to_string()));
        self.backend.save(&form).await?;
        info!(session = self.id, description, "search saved");
        self.searches().await
    }

    /// Refresh the listing. Ticks on searches no longer listed are dropped.
    pub async fn searches(&self) -> Result<Vec<SavedSearch>> {
        let form = self.form().await;
        let searches = self.backend.listing(&form).await?;
        let mut session = self.state.lock().await;
        session.page.saved_selection.retain(|id| searches.iter().any(|s| s.id == *id));
        session.saved = searches.clone();
        Ok(searches)
    }

    /// Delete a saved search and drop its row from the listing.
    pub async fn delete_search(&self, id: u64) -> Result<Vec<SavedSearch>> {
        let known = self.state.lock().await.saved.iter().any(|s| s.id == id);
        if !known {
            return Err(SearcherError::UnknownConstraint(format!("search_{id}")));
        }
        let body = self.backend.delete_search(id).await?;
        debug!(session = self.id, search = id, response = body.trim(), "saved search deleted");
        let mut session = self.state.lock().await;
        session.saved.retain(|s| s.id != id);
        session.page.saved_selection.remove(&id);
        info!(session = self.id, search = id, "search deleted");
        Ok(session.saved.clone())
    }

    // ------------- Columns and export -------------
    pub async fn toggle_column(&self, column: usize) -> Result<HiddenFeatures> {
        let (dataset, mapping) = {
            let session = self.state.lock().await;
            (session.dataset.clone(), session.mapping.clone())
        };
        let hidden = self
            .with_preferences(move |p| p.toggle_column(&dataset, &mapping, column, Utc::now()))
            .await?;
        self.state.lock().await.hidden = hidden.clone();
        Ok(hidden)
    }

    pub async fn export(&self, request: &ExportRequest, backend_url: &str) -> Result<Url> {
        let args = {
            let session = self.state.lock().await;
            request.args(&session.form(), session.paging, &session.columns, &session.hidden)?
        };
        export_url(backend_url, &args)
    }

    /// Apply due panel hides. Returns true when a debounced query is due;
    /// the caller runs it.
    pub async fn tick(&self, now: Instant) -> bool {
        let due = self.state.lock().await.tick(now);
        if due {
            debug!(session = self.id, "search-as-you-type query due");
        }
        due
    }
}

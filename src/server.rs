use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::autocomplete::{LookupAction, Suggestion};
use crate::constraint::{MatchOperator, MatchType, ValueOperator};
use crate::descriptor::DateBounds;
use crate::error::SearcherError;
use crate::export::{named_values, ExportRequest, PagingInfo};
use crate::identifier::{ConstraintId, FieldId};
use crate::notify::{Notification, Resource};
use crate::page::AggOptions;
use crate::registry::SessionRegistry;
use crate::session::{KeyupOutcome, SessionHandle};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Browser-facing prefix of the backend, used for export links.
    pub backend_url: String,
}

// ------------- Requests -------------
#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub dataset: String,
    pub mapping: String,
}

#[derive(Deserialize)]
pub struct AddFieldRequest {
    /// The descriptor JSON of the selected field; empty when nothing is selected.
    #[serde(default)]
    pub selection: String,
    #[serde(default)]
    pub bounds: Option<DateBounds>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSettings {
    DateRange {
        #[serde(default)]
        from: Option<NaiveDate>,
        #[serde(default)]
        to: Option<NaiveDate>,
    },
    Match {
        operator: MatchOperator,
        match_type: MatchType,
        #[serde(default)]
        slop: u32,
    },
    FactOperator {
        operator: MatchOperator,
    },
    Rule {
        operator: ValueOperator,
        value: String,
    },
}

#[derive(Deserialize)]
pub struct InputRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct ExpandRequest {
    pub level: usize,
    pub row: usize,
}

#[derive(Deserialize)]
pub struct SelectRequest {
    pub date: String,
}

#[derive(Deserialize)]
pub struct ValuesRequest {
    pub group: usize,
    pub row: usize,
}

#[derive(Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct AggFieldRequest {
    #[serde(default)]
    pub selection: String,
}

#[derive(Deserialize)]
pub struct SecondAggRequest {
    pub second: bool,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MappingFieldsUpdate {
    Offer { fields: Vec<String> },
    SelectAll { checked: bool },
    Check { field: String, checked: bool },
}

#[derive(Deserialize)]
pub struct CheckRequest {
    pub checked: bool,
}

#[derive(Deserialize)]
pub struct ResourceRequest {
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

// ------------- Errors -------------
pub struct ApiError(SearcherError);

impl From<SearcherError> for ApiError {
    fn from(e: SearcherError) -> Self {
        Self(e)
    }
}

pub fn status_for(error: &SearcherError) -> StatusCode {
    match error {
        SearcherError::NoFieldSelected
        | SearcherError::Descriptor { .. }
        | SearcherError::InvalidValue { .. }
        | SearcherError::NotFactValueField(_)
        | SearcherError::Parse { .. } => StatusCode::BAD_REQUEST,
        SearcherError::UnknownSession(_) | SearcherError::UnknownConstraint(_) => StatusCode::NOT_FOUND,
        SearcherError::Inert { .. } => StatusCode::CONFLICT,
        SearcherError::Backend { .. } | SearcherError::Transport(_) => StatusCode::BAD_GATEWAY,
        SearcherError::Config(_) | SearcherError::Persistence(_) | SearcherError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let msg = self.0.to_string();
        warn!(%msg, code = %status.as_u16(), "request error");
        let body = json!({
            "status": "error",
            "error": msg,
            "notification": Notification::from_error(&self.0),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = std::result::Result<Json<Value>, ApiError>;

fn ok(mut body: Value) -> ApiResult {
    if let Some(map) = body.as_object_mut() {
        map.insert("status".to_string(), json!("ok"));
    }
    Ok(Json(body))
}

fn session(state: &AppState, sid: u64) -> Result<SessionHandle, ApiError> {
    Ok(state.registry.get(sid)?)
}

fn constraint_id(raw: &str) -> Result<ConstraintId, ApiError> {
    Ok(raw.parse::<ConstraintId>()?)
}

// ------------- Router -------------
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);
    Router::new()
        .route("/v1/sessions", post(open_session))
        .route("/v1/sessions/:sid", axum::routing::delete(close_session))
        .route("/v1/sessions/:sid/fields", post(add_field))
        .route("/v1/sessions/:sid/fields/:id", axum::routing::delete(remove_constraint).put(update_field))
        .route("/v1/sessions/:sid/fields/:id/rules", post(add_rule))
        .route("/v1/sessions/:sid/inputs/:id", put(input))
        .route("/v1/sessions/:sid/lookup/:id", post(lookup))
        .route("/v1/sessions/:sid/blur/:id", post(blur))
        .route("/v1/sessions/:sid/suggestions/:id", post(insert_suggestion))
        .route("/v1/sessions/:sid/form", get(form))
        .route("/v1/sessions/:sid/query", post(query))
        .route("/v1/sessions/:sid/table", post(table_content))
        .route("/v1/sessions/:sid/aggregate", post(aggregate))
        .route("/v1/sessions/:sid/aggregation", put(toggle_second_agg))
        .route("/v1/sessions/:sid/aggregation/:nr", post(select_agg_field).put(set_agg_options))
        .route("/v1/sessions/:sid/aggregations/:panel/expand", post(expand))
        .route("/v1/sessions/:sid/timelines/:panel/select", post(select_date))
        .route("/v1/sessions/:sid/timelines/:panel/values", post(show_values))
        .route("/v1/sessions/:sid/cluster", post(cluster_query))
        .route("/v1/sessions/:sid/mlt", post(mlt_query))
        .route("/v1/sessions/:sid/mlt/documents/:doc/:verdict", post(judge_document))
        .route("/v1/sessions/:sid/mapping_fields", put(mapping_fields))
        .route("/v1/sessions/:sid/remove_by_query", post(remove_by_query))
        .route("/v1/sessions/:sid/get_query", post(get_query))
        .route("/v1/sessions/:sid/columns/:column/toggle", post(toggle_column))
        .route("/v1/sessions/:sid/save", post(save))
        .route("/v1/sessions/:sid/searches", get(searches))
        .route("/v1/sessions/:sid/searches/:id", axum::routing::delete(delete_search).put(tick_search))
        .route("/v1/sessions/:sid/export", post(export))
        .route("/v1/sessions/:sid/resources/:resource", post(update_resource))
        .with_state(state)
        .layer(cors)
}

// ------------- Handlers -------------
async fn open_session(State(state): State<AppState>, Json(req): Json<OpenSessionRequest>) -> ApiResult {
    let handle = state.registry.open(&req.dataset, &req.mapping)?;
    ok(json!({ "id": handle.id }))
}

async fn close_session(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    if !state.registry.close(sid)? {
        return Err(SearcherError::UnknownSession(sid).into());
    }
    ok(json!({}))
}

async fn add_field(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
    Json(req): Json<AddFieldRequest>,
) -> ApiResult {
    let html = session(&state, sid)?.add_field(&req.selection, req.bounds).await?;
    ok(json!({ "html": html }))
}

async fn update_field(
    State(state): State<AppState>,
    Path((sid, id)): Path<(u64, String)>,
    Json(settings): Json<FieldSettings>,
) -> ApiResult {
    let id = constraint_id(&id)?;
    let handle = session(&state, sid)?;
    handle
        .with(|s| {
            let builder = s.builder_mut();
            match settings {
                FieldSettings::DateRange { from, to } => builder.set_date_range(id.field, from, to),
                FieldSettings::Match { operator, match_type, slop } => {
                    builder.set_match_options(id.field, operator, match_type, slop)
                }
                FieldSettings::FactOperator { operator } => builder.set_fact_operator(id.field, operator),
                FieldSettings::Rule { operator, value } => builder.set_rule_value(id, operator, &value),
            }
        })
        .await?;
    ok(json!({}))
}

async fn remove_constraint(State(state): State<AppState>, Path((sid, id)): Path<(u64, String)>) -> ApiResult {
    let id = constraint_id(&id)?;
    session(&state, sid)?.remove(id).await?;
    ok(json!({ "removed": id }))
}

async fn add_rule(State(state): State<AppState>, Path((sid, field)): Path<(u64, u64)>) -> ApiResult {
    let html = session(&state, sid)?.add_rule(FieldId::new(field)).await?;
    ok(json!({ "html": html }))
}

async fn input(
    State(state): State<AppState>,
    Path((sid, id)): Path<(u64, String)>,
    Json(req): Json<InputRequest>,
) -> ApiResult {
    let id = constraint_id(&id)?;
    match session(&state, sid)?.keyup(id, &req.text, Instant::now()).await? {
        KeyupOutcome::QueryScheduled => ok(json!({ "outcome": "query_scheduled" })),
        KeyupOutcome::LookedUp { visible } => ok(json!({ "outcome": "looked_up", "visible": visible })),
    }
}

async fn lookup(State(state): State<AppState>, Path((sid, id)): Path<(u64, String)>) -> ApiResult {
    let id = constraint_id(&id)?;
    let handle = session(&state, sid)?;
    let visible = handle.lookup(id, LookupAction::Focus).await?;
    let html = handle
        .with(|s| s.builder().panel(id).map(|p| p.html().to_string()).unwrap_or_default())
        .await;
    ok(json!({ "visible": visible, "html": html }))
}

async fn blur(State(state): State<AppState>, Path((sid, id)): Path<(u64, String)>) -> ApiResult {
    let id = constraint_id(&id)?;
    session(&state, sid)?.blur(id, Instant::now()).await?;
    ok(json!({}))
}

async fn insert_suggestion(
    State(state): State<AppState>,
    Path((sid, id)): Path<(u64, String)>,
    Json(suggestion): Json<Suggestion>,
) -> ApiResult {
    let id = constraint_id(&id)?;
    let text = session(&state, sid)?.insert_suggestion(id, &suggestion).await?;
    ok(json!({ "text": text }))
}

async fn form(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let pairs = session(&state, sid)?.with(|s| s.form()).await;
    ok(json!({ "pairs": named_values(&pairs) }))
}

async fn query(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let handle = session(&state, sid)?;
    let html = handle.query().await?;
    let toggles = handle.with(|s| s.column_toggles()).await;
    ok(json!({ "html": html, "toggles": toggles }))
}

async fn table_content(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
    Json(paging): Json<PagingInfo>,
) -> ApiResult {
    let body = session(&state, sid)?.table_content(paging).await?;
    ok(json!({ "body": body }))
}

async fn aggregate(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let html = session(&state, sid)?.aggregate().await?;
    ok(json!({ "html": html }))
}

async fn select_agg_field(
    State(state): State<AppState>,
    Path((sid, nr)): Path<(u64, u8)>,
    Json(req): Json<AggFieldRequest>,
) -> ApiResult {
    let field = session(&state, sid)?.select_agg_field(nr, &req.selection).await?;
    ok(json!({ "date": field.is_date(), "options": field.options }))
}

async fn set_agg_options(
    State(state): State<AppState>,
    Path((sid, nr)): Path<(u64, u8)>,
    Json(options): Json<AggOptions>,
) -> ApiResult {
    session(&state, sid)?
        .with(|s| s.page_mut().aggregation.set_options(nr, options))
        .await?;
    ok(json!({}))
}

async fn toggle_second_agg(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
    Json(req): Json<SecondAggRequest>,
) -> ApiResult {
    session(&state, sid)?
        .with(|s| s.page_mut().aggregation.toggle_second(req.second))
        .await;
    ok(json!({ "second": req.second }))
}

async fn expand(
    State(state): State<AppState>,
    Path((sid, panel)): Path<(u64, usize)>,
    Json(req): Json<ExpandRequest>,
) -> ApiResult {
    let html = session(&state, sid)?
        .with(|s| s.expand(panel, req.level, req.row).map(|_| s.results().render()))
        .await?;
    ok(json!({ "html": html }))
}

async fn select_date(
    State(state): State<AppState>,
    Path((sid, panel)): Path<(u64, usize)>,
    Json(req): Json<SelectRequest>,
) -> ApiResult {
    let (groups, html) = session(&state, sid)?
        .with(|s| s.select_date(panel, &req.date).map(|sel| (sel.groups.len(), s.results().render())))
        .await?;
    ok(json!({ "groups": groups, "html": html }))
}

async fn show_values(
    State(state): State<AppState>,
    Path((sid, panel)): Path<(u64, usize)>,
    Json(req): Json<ValuesRequest>,
) -> ApiResult {
    let html = session(&state, sid)?
        .with(|s| s.show_values(panel, req.group, req.row).map(|_| s.results().render()))
        .await?;
    ok(json!({ "html": html }))
}

async fn cluster_query(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let html = session(&state, sid)?.cluster_query().await?;
    ok(json!({ "html": html }))
}

async fn mlt_query(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let html = session(&state, sid)?.mlt_query().await?;
    ok(json!({ "html": html }))
}

async fn judge_document(
    State(state): State<AppState>,
    Path((sid, doc, verdict)): Path<(u64, String, Verdict)>,
) -> ApiResult {
    let (judged, docs, rejected) = session(&state, sid)?
        .with(|s| {
            let mlt = &mut s.page_mut().mlt;
            let judged = match verdict {
                Verdict::Accept => mlt.accept(&doc),
                Verdict::Reject => mlt.reject(&doc),
            };
            (judged, mlt.accepted().to_vec(), mlt.rejected().to_vec())
        })
        .await;
    ok(json!({ "judged": judged, "docs": docs, "docs_rejected": rejected }))
}

async fn mapping_fields(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
    Json(update): Json<MappingFieldsUpdate>,
) -> ApiResult {
    let checked = session(&state, sid)?
        .with(|s| {
            let fields = &mut s.page_mut().mapping_fields;
            match update {
                MappingFieldsUpdate::Offer { fields: offered } => fields.set_available(offered),
                MappingFieldsUpdate::SelectAll { checked } => fields.select_all(checked),
                MappingFieldsUpdate::Check { field, checked } => fields.set_checked(&field, checked)?,
            }
            Ok::<_, SearcherError>(fields.checked().into_iter().map(str::to_string).collect::<Vec<_>>())
        })
        .await?;
    ok(json!({ "checked": checked }))
}

async fn remove_by_query(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let notification = session(&state, sid)?.remove_by_query().await?;
    ok(json!({ "notification": notification }))
}

async fn get_query(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let query = session(&state, sid)?.get_query().await?;
    ok(json!({ "query": query }))
}

async fn toggle_column(State(state): State<AppState>, Path((sid, column)): Path<(u64, usize)>) -> ApiResult {
    let handle = session(&state, sid)?;
    let hidden = handle.toggle_column(column).await?;
    let toggles = handle.with(|s| s.column_toggles()).await;
    ok(json!({ "hidden": hidden.columns(), "toggles": toggles }))
}

async fn save(State(state): State<AppState>, Path(sid): Path<u64>, Json(req): Json<SaveRequest>) -> ApiResult {
    let searches = session(&state, sid)?.save(&req.description).await?;
    ok(json!({ "searches": searches }))
}

async fn searches(State(state): State<AppState>, Path(sid): Path<u64>) -> ApiResult {
    let searches = session(&state, sid)?.searches().await?;
    ok(json!({ "searches": searches }))
}

async fn delete_search(State(state): State<AppState>, Path((sid, id)): Path<(u64, u64)>) -> ApiResult {
    let searches = session(&state, sid)?.delete_search(id).await?;
    ok(json!({ "searches": searches }))
}

async fn tick_search(
    State(state): State<AppState>,
    Path((sid, id)): Path<(u64, u64)>,
    Json(req): Json<CheckRequest>,
) -> ApiResult {
    session(&state, sid)?
        .with(|s| s.select_saved_search(id, req.checked))
        .await?;
    ok(json!({}))
}

async fn export(State(state): State<AppState>, Path(sid): Path<u64>, Json(req): Json<ExportRequest>) -> ApiResult {
    let url = session(&state, sid)?.export(&req, &state.backend_url).await?;
    ok(json!({ "url": url.as_str() }))
}

async fn update_resource(
    State(state): State<AppState>,
    Path((sid, resource)): Path<(u64, Resource)>,
    Json(req): Json<ResourceRequest>,
) -> ApiResult {
    let notification = session(&state, sid)?.update_resource(resource, req.params).await;
    ok(json!({ "notification": notification }))
}

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{registry, FakeBackend};
use searcher::autocomplete::{LookupAction, LookupType, Suggestion};
use searcher::config::Timing;
use searcher::error::SearcherError;
use searcher::export::{ExportRequest, ExportType, FeatureSelection};
use searcher::identifier::{ConstraintId, FieldId};
use searcher::notify::{Notification, Resource, DELETION_STARTED};
use searcher::preferences::{storage_key, MemoryStore, PreferenceStore, Preferences};
use searcher::registry::SessionRegistry;
use searcher::session::{header_columns, KeyupOutcome, ResultsPane};

const FACTS: &str = r#"{"path":"texta_facts","type":"facts"}"#;
const TEXT: &str = r#"{"path":"body","type":"text"}"#;
const AUTHOR: &str = r#"{"path":"author","type":"string"}"#;

#[tokio::test]
async fn lookup_shows_and_hides_the_panel() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(FACTS, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));

    backend.suggest("<li>PER</li>");
    assert!(session.lookup(id, LookupAction::Focus).await.unwrap());
    backend.suggest("");
    let outcome = session.keyup(id, "zz", Instant::now()).await.unwrap();
    assert_eq!(outcome, KeyupOutcome::LookedUp { visible: false });

    let lookups = backend.lookups.lock().unwrap().clone();
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[1].content, "zz");
    assert_eq!(lookups[1].lookup_type, LookupType::Fact);
}

#[tokio::test]
async fn failed_lookup_leaves_the_panel_hidden() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(FACTS, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));
    backend.suggest("<li>PER</li>");
    session.lookup(id, LookupAction::Focus).await.unwrap();

    backend.fail(Some(500));
    let err = session.lookup(id, LookupAction::Keyup).await.unwrap_err();
    assert!(matches!(err, SearcherError::Backend { status: 500, .. }));
    let visible = session.with(|s| s.builder().panel(id).unwrap().is_visible()).await;
    assert!(!visible);
}

#[tokio::test]
async fn blurred_panel_hides_on_sweep() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(FACTS, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));
    backend.suggest("<li>PER</li>");
    session.lookup(id, LookupAction::Focus).await.unwrap();

    let t0 = Instant::now();
    session.blur(id, t0).await.unwrap();
    registry.sweep(t0 + Duration::from_millis(100)).await;
    assert!(session.with(|s| s.builder().panel(id).unwrap().is_visible()).await);
    registry.sweep(t0 + Duration::from_millis(500)).await;
    assert!(!session.with(|s| s.builder().panel(id).unwrap().is_visible()).await);
}

#[tokio::test]
async fn typing_in_a_match_input_queries_once_after_a_pause() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(TEXT, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));

    let t0 = Instant::now();
    assert_eq!(session.keyup(id, "c", t0).await.unwrap(), KeyupOutcome::QueryScheduled);
    session.keyup(id, "ca", t0 + Duration::from_millis(300)).await.unwrap();
    session.keyup(id, "cat", t0 + Duration::from_millis(600)).await.unwrap();
    assert!(registry.sweep(t0 + Duration::from_millis(1000)).await.is_empty());
    let queries = registry.sweep(t0 + Duration::from_millis(1100)).await;
    assert_eq!(queries.len(), 1);
    for query in queries {
        query.await.unwrap();
    }
    assert!(registry.sweep(t0 + Duration::from_millis(2000)).await.is_empty());

    let queries = backend.calls("table_header");
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains(&("match_txt_2".to_string(), "cat".to_string())));
    assert!(backend.lookups.lock().unwrap().is_empty(), "match inputs never look up");
}

#[tokio::test]
async fn query_reads_columns_and_replays_hidden_ones() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.toggle_column(1).await.unwrap();

    let other = registry.open("news", "articles").unwrap();
    other.query().await.unwrap();
    let (columns, hidden) = other.with(|s| (s.columns().to_vec(), s.hidden().columns())).await;
    assert_eq!(columns, vec!["id", "title", "text"]);
    assert_eq!(hidden, vec![1], "preferences are shared per dataset and mapping");
    assert!(other.with(|s| s.column_toggles()).await.contains("feature-invisible"));

    let form = &backend.calls("table_header")[0];
    assert!(form.contains(&("dataset".to_string(), "news".to_string())));
    assert!(form.contains(&("mapping".to_string(), "articles".to_string())));
}

#[tokio::test]
async fn unreadable_preference_leaves_every_column_visible() {
    let backend = Arc::new(FakeBackend::new());
    let store = Arc::new(MemoryStore::new());
    let expires = Utc::now() + chrono::Duration::days(30);
    store.set(&storage_key("news", "articles"), "not json", expires).unwrap();
    let registry = SessionRegistry::new(backend, Preferences::new(store, 1), Timing::default());
    let session = registry.open("news", "articles").unwrap();

    let html = session.query().await.unwrap();
    assert_eq!(html, common::HEADER);
    let (pane, hidden) = session.with(|s| (s.results().clone(), s.hidden().clone())).await;
    assert!(matches!(pane, ResultsPane::Html(_)));
    assert!(hidden.is_empty());
}

#[tokio::test]
async fn panels_hide_while_another_session_is_querying() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let typing = registry.open("news", "articles").unwrap();
    typing.add_field(TEXT, None).await.unwrap();
    let browsing = registry.open("news", "articles").unwrap();
    browsing.add_field(FACTS, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));
    backend.suggest("<li>PER</li>");
    browsing.lookup(id, LookupAction::Focus).await.unwrap();

    let t0 = Instant::now();
    typing.keyup(id, "cat", t0).await.unwrap();
    browsing.blur(id, t0).await.unwrap();
    backend.stall();
    let queries = registry.sweep(t0 + Duration::from_millis(1000)).await;
    assert_eq!(queries.len(), 1);
    assert!(!browsing.with(|s| s.builder().panel(id).unwrap().is_visible()).await);

    backend.release();
    for query in queries {
        query.await.unwrap();
    }
    assert!(matches!(typing.with(|s| s.results().clone()).await, ResultsPane::Html(_)));
}

#[tokio::test]
async fn aggregation_failure_shows_in_the_results_pane() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    assert!(matches!(session.aggregate().await, Err(SearcherError::NoFieldSelected)));
    assert!(backend.calls("aggregate").is_empty());
    session.select_agg_field(1, AUTHOR).await.unwrap();

    let html = session.aggregate().await.unwrap();
    assert!(backend.calls("aggregate")[0].contains(&("agg_field_1".to_string(), AUTHOR.to_string())));
    assert!(html.contains("<h3>Author</h3>"));
    session.with(|s| s.expand(0, 0, 0)).await.unwrap();
    assert!(matches!(
        session.with(|s| s.expand(0, 1, 0)).await,
        Err(SearcherError::Inert { .. })
    ));

    backend.fail(Some(503));
    assert!(session.aggregate().await.is_err());
    let pane = session.with(|s| s.results().clone()).await;
    assert!(pane.is_failed());
    assert!(pane.render().contains("Request failed"));
    assert!(matches!(session.with(|s| s.expand(0, 0, 0)).await, Err(SearcherError::UnknownConstraint(_))));
}

#[tokio::test]
async fn malformed_aggregation_is_a_failed_pane() {
    let backend = Arc::new(FakeBackend::new());
    *backend.aggregation.lock().unwrap() = "<html>".to_string();
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.select_agg_field(1, AUTHOR).await.unwrap();
    assert!(matches!(session.aggregate().await, Err(SearcherError::Parse { .. })));
    assert!(session.with(|s| s.results().is_failed()).await);
}

#[tokio::test]
async fn saving_refreshes_the_listing() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.save("cats").await.unwrap();
    let searches = session.save("dogs").await.unwrap();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[1].desc, "dogs");
    assert_eq!(session.with(|s| s.saved_searches().len()).await, 2);
    assert!(backend.calls("save")[0].contains(&("search_description".to_string(), "cats".to_string())));
}

#[tokio::test]
async fn deleted_search_leaves_the_listing() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.save("cats").await.unwrap();
    session.save("dogs").await.unwrap();
    session.with(|s| s.select_saved_search(2, true)).await.unwrap();
    let form = session.with(|s| s.form()).await;
    assert!(form.contains(&("saved_search_1".to_string(), "2".to_string())));

    let searches = session.delete_search(1).await.unwrap();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].desc, "dogs");
    assert_eq!(backend.calls("corpus_tool/delete")[0], vec![("pk".to_string(), "1".to_string())]);
    let form = session.with(|s| s.form()).await;
    assert!(form.contains(&("saved_search_0".to_string(), "2".to_string())));

    assert!(matches!(session.delete_search(1).await, Err(SearcherError::UnknownConstraint(_))));
    assert!(session.with(|s| s.select_saved_search(7, true)).await.is_err());
}

#[tokio::test]
async fn judged_documents_go_with_the_similar_documents_query() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session
        .with(|s| {
            let mlt = &mut s.page_mut().mlt;
            mlt.accept("doc-1");
            mlt.reject("doc-2");
        })
        .await;
    session.mlt_query().await.unwrap();
    let form = &backend.calls("mlt_query")[0];
    assert!(form.contains(&("docs".to_string(), "doc-1\n".to_string())));
    assert!(form.contains(&("docs_rejected".to_string(), "doc-2\n".to_string())));
}

#[tokio::test]
async fn auxiliary_requests() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();

    assert_eq!(session.remove_by_query().await.unwrap(), Some(Notification::info(DELETION_STARTED)));
    let pretty = session.get_query().await.unwrap().unwrap();
    assert!(pretty.contains("\n"), "query JSON is pretty-printed");
    assert_eq!(session.with(|s| s.query_json().map(str::to_string)).await, Some(pretty));
    assert_eq!(session.cluster_query().await.unwrap(), "<div>clusters</div>");
    assert_eq!(session.mlt_query().await.unwrap(), "<div>similar</div>");
    assert!(matches!(
        session.update_resource(Resource::Datasets, Vec::new()).await,
        Notification::Toast { .. }
    ));
    assert_eq!(backend.calls("update_dataset").len(), 1);
}

#[tokio::test]
async fn export_url_uses_session_state() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(TEXT, None).await.unwrap();
    let request = ExportRequest {
        export_type: ExportType::Agg,
        filename: "counts".to_string(),
        extent: None,
        features: FeatureSelection::Visible,
    };
    let url = session.export(&request, "http://backend/searcher").await.unwrap();
    let args = url.query_pairs().next().unwrap().1.into_owned();
    assert!(args.contains("counts.csv"));
    assert!(args.contains("match_field_2"));
}

#[tokio::test]
async fn suggestions_are_inserted_and_the_panel_closes() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(Arc::clone(&backend));
    let session = registry.open("news", "articles").unwrap();
    session.add_field(FACTS, None).await.unwrap();
    let id = ConstraintId::field(FieldId::new(2));
    backend.suggest("<li>PER</li>");
    session.keyup(id, "PE", Instant::now()).await.unwrap();
    let suggestion = Suggestion { term: "PER".to_string(), concept_id: None, lookup_type: LookupType::Fact };
    assert_eq!(session.insert_suggestion(id, &suggestion).await.unwrap(), "PER\n");
    assert!(!session.with(|s| s.builder().panel(id).unwrap().is_visible()).await);
}

#[tokio::test]
async fn unknown_sessions_and_rows() {
    let backend = Arc::new(FakeBackend::new());
    let registry = registry(backend);
    assert!(matches!(registry.get(7), Err(SearcherError::UnknownSession(7))));
    let session = registry.open("news", "articles").unwrap();
    assert!(matches!(session.add_field("", None).await, Err(SearcherError::NoFieldSelected)));
    assert!(session.remove(ConstraintId::field(FieldId::new(2))).await.is_err());
    assert!(registry.close(session.id).unwrap());
    assert!(registry.is_empty());
}

#[test]
fn header_columns_strip_markup() {
    assert_eq!(header_columns(common::HEADER), vec!["id", "title", "text"]);
    assert!(matches!(ResultsPane::default(), ResultsPane::Empty));
}

use searcher::backend::filter_params;
use searcher::error::SearcherError;
use searcher::export::{export_url, ExportRequest, ExportType, Extent, FeatureSelection, NamedValue, PagingInfo};
use searcher::notify::{resource_update_outcome, Notification, Resource, TOAST_TIMER_MS};
use searcher::preferences::HiddenFeatures;
use serde_json::json;

fn form() -> Vec<(String, String)> {
    vec![
        ("match_txt_2".to_string(), "cats".to_string()),
        ("dataset".to_string(), "news".to_string()),
    ]
}

fn columns() -> Vec<String> {
    vec!["id".to_string(), "title".to_string(), "text".to_string()]
}

fn arg<'a>(args: &'a [NamedValue], name: &str) -> Option<&'a serde_json::Value> {
    args.iter().find(|a| a.name == name).map(|a| &a.value)
}

fn examples(extent: Extent, features: FeatureSelection) -> ExportRequest {
    ExportRequest {
        export_type: ExportType::Examples,
        filename: "out".to_string(),
        extent: Some(extent),
        features,
    }
}

#[test]
fn aggregation_export_has_no_paging() {
    let request = ExportRequest {
        export_type: ExportType::Agg,
        filename: "counts".to_string(),
        extent: None,
        features: FeatureSelection::All,
    };
    let args = request.args(&form(), PagingInfo::default(), &columns(), &HiddenFeatures::new()).unwrap();
    assert_eq!(arg(&args, "export_type"), Some(&json!("agg")));
    assert_eq!(arg(&args, "filename"), Some(&json!("counts.csv")));
    assert_eq!(arg(&args, "match_txt_2"), Some(&json!("cats")));
    assert!(arg(&args, "num_examples").is_none());
    assert!(arg(&args, "features").is_none());
}

#[test]
fn extents_follow_the_table_paging() {
    let paging = PagingInfo { start: 20, length: 10 };
    let hidden = HiddenFeatures::new();

    let args = examples(Extent::Page, FeatureSelection::All).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "examples_start"), Some(&json!(20)));
    assert_eq!(arg(&args, "num_examples"), Some(&json!(10)));

    let pages = Extent::Pages { start_page: 2, end_page: 4 };
    let args = examples(pages, FeatureSelection::All).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "examples_start"), Some(&json!(10)));
    assert_eq!(arg(&args, "num_examples"), Some(&json!(30)));

    let args = examples(Extent::All, FeatureSelection::All).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "num_examples"), Some(&json!("*")));
    assert!(arg(&args, "examples_start").is_none());

    let rows = Extent::Rows { rows: 250 };
    let args = examples(rows, FeatureSelection::All).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "examples_start"), Some(&json!(0)));
    assert_eq!(arg(&args, "num_examples"), Some(&json!(250)));
}

#[test]
fn invalid_page_range_is_rejected() {
    let pages = Extent::Pages { start_page: 3, end_page: 2 };
    let err = examples(pages, FeatureSelection::All)
        .args(&form(), PagingInfo { start: 0, length: 10 }, &columns(), &HiddenFeatures::new())
        .unwrap_err();
    assert!(matches!(err, SearcherError::InvalidValue { .. }));
}

#[test]
fn oversized_page_range_is_rejected() {
    let paging = PagingInfo { start: 0, length: 10 };
    let huge = usize::MAX / 4;
    for pages in [
        Extent::Pages { start_page: huge, end_page: huge },
        Extent::Pages { start_page: 1, end_page: usize::MAX },
    ] {
        let err = examples(pages, FeatureSelection::All)
            .args(&form(), paging, &columns(), &HiddenFeatures::new())
            .unwrap_err();
        assert!(matches!(err, SearcherError::InvalidValue { .. }));
    }
}

#[test]
fn visible_feature_selection_skips_hidden_columns() {
    let mut hidden = HiddenFeatures::new();
    hidden.toggle(1);
    let paging = PagingInfo { start: 0, length: 10 };
    let args = examples(Extent::Page, FeatureSelection::Visible).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "features"), Some(&json!(["id", "text"])));
    let args = examples(Extent::Page, FeatureSelection::All).args(&form(), paging, &columns(), &hidden).unwrap();
    assert_eq!(arg(&args, "features"), Some(&json!(["id", "title", "text"])));
}

#[test]
fn export_url_encodes_the_arguments() {
    let args = vec![NamedValue::new("export_type", "agg"), NamedValue::new("filename", "a b.csv")];
    let url = export_url("http://localhost:8000/searcher/", &args).unwrap();
    assert_eq!(url.path(), "/searcher/export");
    let (key, value) = url.query_pairs().next().unwrap();
    assert_eq!(key, "args");
    let decoded: Vec<NamedValue> = serde_json::from_str(&value).unwrap();
    assert_eq!(decoded, args);
    assert!(export_url("not a url", &args).is_err());
}

#[test]
fn filter_params_is_a_name_value_array() {
    let params = filter_params(&form()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&params).unwrap();
    assert_eq!(value, json!([{"name":"match_txt_2","value":"cats"},{"name":"dataset","value":"news"}]));
}

#[test]
fn resource_updates_toast_on_success_and_warn_otherwise() {
    assert_eq!(
        resource_update_outcome(Resource::Model, r#"{"status":"success"}"#),
        Notification::Toast { title: "Model updated!".to_string(), timer_ms: TOAST_TIMER_MS }
    );
    assert_eq!(
        resource_update_outcome(Resource::Datasets, r#"{"status":"success"}"#),
        Notification::Toast { title: "Datasets updated!".to_string(), timer_ms: TOAST_TIMER_MS }
    );
    match resource_update_outcome(Resource::Resources, r#"{"status":"failed"}"#) {
        Notification::Warning { title, text } => {
            assert_eq!(title, "An error occurred!");
            assert!(text.contains("resource update"));
        }
        other => panic!("expected a warning, got {other:?}"),
    }
    assert!(matches!(resource_update_outcome(Resource::Model, "not json"), Notification::Warning { .. }));
}

#[test]
fn missing_selection_is_a_blocking_alert() {
    assert_eq!(
        Notification::from_error(&SearcherError::NoFieldSelected),
        Notification::Alert { message: "No field selected.".to_string() }
    );
}

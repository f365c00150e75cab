use chrono::NaiveDate;
use searcher::aggregation::parse_response;
use searcher::builder::ConstraintBuilder;
use searcher::descriptor::DateBounds;
use searcher::drilldown::{AggregationView, MAX_DEPTH};
use searcher::identifier::ConstraintId;
use searcher::preferences::HiddenFeatures;
use searcher::render::{aggregation_view, column_toggles, constraint_row, constraint_rows, failed_row, html_escape};

const CHEVRON: &str = "glyphicon-menu-right";

#[test]
fn escaping_covers_markup_characters() {
    assert_eq!(html_escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
}

#[test]
fn date_row_carries_picker_bounds() {
    let mut builder = ConstraintBuilder::new();
    let bounds = DateBounds {
        min: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        max: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
    };
    let id = builder.add_field(r#"{"path":"publish_date","type":"date"}"#, Some(bounds)).unwrap();
    let html = constraint_row(builder.get(id).unwrap());
    assert!(html.contains(r#"id="field_2""#));
    assert!(html.contains(r#"<span id="selected_field_2">publish_date</span>"#));
    assert!(html.contains(r#"name="daterange_from_2""#));
    assert!(html.contains(r#"name="daterange_to_2""#));
    assert!(html.contains(r#"data-date-start-date="2020-01-01""#));
    assert!(html.contains(r#"data-date-end-date="2020-12-31""#));
}

#[test]
fn rows_never_share_input_names() {
    let mut builder = ConstraintBuilder::new();
    builder.add_field(r#"{"path":"author.name","type":"text"}"#, None).unwrap();
    builder.add_field(r#"{"path":"author.name","type":"text"}"#, None).unwrap();
    let html = constraint_rows(builder.iter());
    assert_eq!(html.matches("author (name)").count(), 2);
    assert_eq!(html.matches(r#"name="match_txt_2""#).count(), 1);
    assert_eq!(html.matches(r#"name="match_txt_3""#).count(), 1);
}

#[test]
fn fact_value_row_lists_rules_and_allowed_operators() {
    let mut builder = ConstraintBuilder::new();
    let id = builder.add_field(r#"{"path":"texta_facts","type":"fact_str_val"}"#, None).unwrap();
    builder.add_fact_value_rule(id).unwrap();
    let html = constraint_row(builder.get(id).unwrap());
    assert!(html.contains("texta_facts [facts] [text]"));
    assert!(html.contains(r#"id="fact_val_rule_2_1""#));
    assert!(html.contains(r#"id="fact_val_rule_2_2""#));
    assert!(html.contains(r#"id="suggestions_2_2""#));
    assert!(html.contains(r#"name="fact_constraint_type_2" value="str""#));
    assert!(!html.contains("&lt;="), "string rules offer only = and !=");
}

#[test]
fn suggestion_panel_visibility_follows_lookup() {
    let mut builder = ConstraintBuilder::new();
    let id = builder.add_field(r#"{"path":"texta_facts","type":"facts"}"#, None).unwrap();
    let hidden = constraint_row(builder.get(id).unwrap());
    assert!(hidden.contains(r#"id="suggestions_2" name="suggestions_2" class="suggestions" style="display: none;""#));
    builder.apply_lookup(ConstraintId::field(id), "<li>PER</li>".to_string());
    let shown = constraint_row(builder.get(id).unwrap());
    assert!(shown.contains(r#"class="suggestions"><li>PER</li></div>"#));
}

#[test]
fn drilldown_tables_mark_only_expandable_rows() {
    let body = r#"[{"type":"string","label":"Author","data":[
        {"key":"Smith","val":5,"children":[{"key":"2020","val":3,"children":[]}]},
        {"key":"<b>","val":1}
    ]}]"#;
    let mut view = AggregationView::display(parse_response(body).unwrap(), MAX_DEPTH);
    let html = aggregation_view(&view);
    assert!(html.contains(r#"<div id="daterange_agg_container"></div>"#));
    assert!(html.contains("<h3>Author</h3>"));
    assert!(html.contains("Field #1"));
    assert_eq!(html.matches(CHEVRON).count(), 1);
    assert!(html.contains("<td>5</td><td>Smith</td>"));
    assert!(html.contains("&lt;b&gt;"));
    assert!(!html.contains("Field #2"));

    view.expand(0, 0, 0).unwrap();
    let html = aggregation_view(&view);
    assert!(html.contains("Field #2"));
    assert!(html.contains("<td>3</td><td>2020</td><td></td>"));
    assert_eq!(html.matches(CHEVRON).count(), 1, "the childless second level has no chevron");
    assert!(html.contains(r#"class="pointer active""#));
}

#[test]
fn timeline_renders_chart_data_and_hidden_value_tables() {
    let body = r#"[{"type":"daterange","label":"Published","ykeys":["count"],"labels":["Count"],
        "data":[{"date":"2020-01","count":4}],
        "children":{"2020-01":[{"label":"Author","data":[
            {"key":"O'Brien","val":3,"children":[{"key":"PER","val":2}]},
            {"key":"Jones Jr","val":1,"children":[{"key":"LOC","val":1}]}
        ]}]}}]"#;
    let mut view = AggregationView::display(parse_response(body).unwrap(), MAX_DEPTH);
    let html = aggregation_view(&view);
    assert!(html.contains("data-chart="));
    assert!(html.contains("&quot;ykeys&quot;"));
    assert!(!html.contains("fact-val-table-0"), "nothing below the chart before a click");

    view.select_date(0, "2020-01").unwrap();
    view.show_values(0, 0, 1).unwrap();
    let html = aggregation_view(&view);
    assert_eq!(html.matches("fact-val-table-0").count(), 2);
    assert_eq!(html.matches(r#"fact-val-table-0" style="display: none;""#).count(), 1);
    assert!(html.contains(r#"id="0-1-table" class="table table-striped table-hover fact-val-table-0">"#));
    assert!(html.contains(r#"id="0-0-table""#), "row indexes keep ids valid for any key");
    assert!(html.contains("<td>1</td><td>Jones Jr</td>"));
}

#[test]
fn failure_and_column_toggles() {
    assert!(failed_row("backend down <500>").contains("Request failed: backend down &lt;500&gt;"));
    let mut hidden = HiddenFeatures::new();
    hidden.toggle(1);
    let html = column_toggles(&["id".to_string(), "text".to_string()], &hidden);
    assert!(html.contains(r#"<a id="feature-0" class="toggle-visibility" data-column="0">id</a>"#));
    assert!(html.contains(r#"<a id="feature-1" class="toggle-visibility feature-invisible" data-column="1">text</a>"#));
}

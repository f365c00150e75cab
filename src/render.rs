//! HTML fragments for the search page.
//!
//! Every input carries an `id`/`name` that embeds its constraint identifier, so
//! a serialized form stays flat and unambiguous no matter how many rows exist.

use serde_json::json;

use crate::autocomplete::SuggestionPanel;
use crate::constraint::{
    Constraint, DateConstraint, FactConstraint, FactValueConstraint, MatchConstraint, MatchOperator, MatchType,
    ValueRule, ValueType, DATE_FORMAT,
};
use crate::drilldown::{AggregationView, DrilldownPanel, TermsView, TimelineSelection, TimelineView};
use crate::identifier::ConstraintId;
use crate::preferences::HiddenFeatures;

const CHEVRON: &str = "<span class='glyphicon glyphicon-menu-right'></span>";
const MAX_SLOP: u32 = 10;

pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn select(name: &str, options: &[(&str, &str)], selected: &str) -> String {
    let options: String = options
        .iter()
        .map(|(value, text)| {
            let mark = if *value == selected { " selected" } else { "" };
            format!(r#"<option value="{}"{mark}>{}</option>"#, html_escape(value), html_escape(text))
        })
        .collect();
    format!(r#"<select id="{name}" name="{name}" class="form-control">{options}</select>"#)
}

fn operator_select(name: &str, selected: MatchOperator) -> String {
    let options = [
        (MatchOperator::Must.as_str(), "AND"),
        (MatchOperator::Should.as_str(), "OR"),
        (MatchOperator::MustNot.as_str(), "NOT"),
    ];
    select(name, &options, selected.as_str())
}

fn remove_link(target: &str) -> String {
    format!(r#"<a class="remove-link pointer" data-remove="{target}"><span class="glyphicon glyphicon-remove"></span></a>"#)
}

/// Lookup wiring for a text input: `keyup` and `focus` look up, `blur` hides.
fn lookup_attributes(id: ConstraintId, path: &str) -> String {
    format!(
        r#"data-lookup-id="{id}" data-lookup-field="{}" data-lookup-type="FACT" data-on-keyup="lookup" data-on-focus="lookup" data-on-blur="hide""#,
        html_escape(path)
    )
}

pub fn suggestion_panel(id: ConstraintId, panel: &SuggestionPanel) -> String {
    let style = if panel.is_visible() { "" } else { r#" style="display: none;""# };
    format!(
        r#"<div id="suggestions_{id}" name="suggestions_{id}" class="suggestions"{style}>{}</div>"#,
        panel.html()
    )
}

// ------------- Constraint rows -------------
pub fn constraint_row(constraint: &Constraint) -> String {
    match constraint {
        Constraint::Date(c) => date_row(c),
        Constraint::Fact(c) => fact_row(c),
        Constraint::FactValue(c) => fact_value_row(c),
        Constraint::Match(c) => match_row(c),
    }
}

pub fn constraint_rows<'a>(constraints: impl IntoIterator<Item = &'a Constraint>) -> String {
    let rows: String = constraints.into_iter().map(constraint_row).collect();
    format!(r#"<div id="constraints">{rows}</div>"#)
}

fn date_row(c: &DateConstraint) -> String {
    let n = c.id;
    let (min, max) = match c.bounds {
        Some(b) => (b.min.format(DATE_FORMAT).to_string(), b.max.format(DATE_FORMAT).to_string()),
        None => (String::new(), String::new()),
    };
    let picker = |name: String, value: Option<chrono::NaiveDate>| {
        let value = value.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default();
        format!(
            r#"<input type="text" id="{name}" name="{name}" value="{value}" class="form-control datepicker" data-date-format="yyyy-mm-dd" data-date-start-view="2" data-date-start-date="{min}" data-date-end-date="{max}">"#
        )
    };
    format!(
        r#"<div id="field_{n}" class="panel panel-default constraint" data-kind="date">
    <div class="panel-heading"><span id="selected_field_{n}">{label}</span>{remove}</div>
    <div class="panel-body">
        <input type="hidden" id="daterange_field_{n}" name="daterange_field_{n}" value="{path}">
        {from}
        {to}
    </div>
</div>"#,
        label = html_escape(&c.label),
        remove = remove_link(&n.element_id()),
        path = html_escape(&c.path),
        from = picker(format!("daterange_from_{n}"), c.from),
        to = picker(format!("daterange_to_{n}"), c.to),
    )
}

fn fact_row(c: &FactConstraint) -> String {
    let n = c.id;
    format!(
        r#"<div id="field_{n}" class="panel panel-default constraint" data-kind="facts">
    <div class="panel-heading"><span id="selected_field_{n}">{label}</span>{remove}</div>
    <div class="panel-body">
        {operator}
        <input type="hidden" id="fact_field_{n}" name="fact_field_{n}" value="{path}">
        <textarea id="fact_txt_{n}" name="fact_txt_{n}" class="form-control" {lookup}>{text}</textarea>
        {suggestions}
    </div>
</div>"#,
        label = html_escape(&c.label),
        remove = remove_link(&n.element_id()),
        operator = operator_select(&format!("fact_operator_{n}"), c.operator),
        path = html_escape(&c.path),
        lookup = lookup_attributes(n.into(), &c.path),
        text = html_escape(&c.text),
        suggestions = suggestion_panel(n.into(), &c.suggestions),
    )
}

pub fn value_rule_row(c: &FactValueConstraint, rule: &ValueRule) -> String {
    let r = rule.id;
    let operators: Vec<(&str, &str)> = c.value_type.operators().iter().map(|o| (o.as_str(), o.as_str())).collect();
    format!(
        r#"<div id="fact_val_rule_{r}" class="fact-val-rule">
    <input type="text" id="fact_txt_{r}" name="fact_txt_{r}" value="{fact}" class="form-control" {lookup}>
    {operator}
    <input type="text" name="fact_constraint_val_{r}" value="{value}" class="form-control">
    {remove}
    {suggestions}
</div>"#,
        fact = html_escape(&rule.fact),
        lookup = lookup_attributes(r, &c.path),
        operator = select(&format!("fact_constraint_op_{r}"), &operators, rule.operator.as_str()),
        value = html_escape(&rule.value),
        remove = remove_link(&format!("fact_val_rule_{r}")),
        suggestions = suggestion_panel(r, &rule.suggestions),
    )
}

fn fact_value_row(c: &FactValueConstraint) -> String {
    let n = c.id;
    let rules: String = c.rules.iter().map(|rule| value_rule_row(c, rule)).collect();
    format!(
        r#"<div id="field_{n}" class="panel panel-default constraint" data-kind="{kind}">
    <div class="panel-heading"><span id="selected_field_{n}">{heading}</span>{remove}</div>
    <div class="panel-body">
        {operator}
        <input type="hidden" id="fact_field_{n}" name="fact_field_{n}" value="{path}">
        <input type="hidden" name="fact_constraint_type_{n}" value="{value_type}">
        <div id="fact_val_rules_{n}">{rules}</div>
        <button type="button" class="btn btn-default btn-sm" data-add-rule="{n}">+</button>
    </div>
</div>"#,
        kind = match c.value_type {
            ValueType::Str => "fact_str_val",
            ValueType::Num => "fact_num_val",
        },
        heading = html_escape(&c.heading()),
        remove = remove_link(&n.element_id()),
        operator = operator_select(&format!("fact_operator_{n}"), c.operator),
        path = html_escape(&c.path),
        value_type = c.value_type.as_str(),
    )
}

fn match_row(c: &MatchConstraint) -> String {
    let n = c.id;
    let match_types = [
        (MatchType::Word.as_str(), "word"),
        (MatchType::Phrase.as_str(), "phrase"),
        (MatchType::PhrasePrefix.as_str(), "phrase prefix"),
        (MatchType::Regexp.as_str(), "regexp"),
    ];
    let slops: Vec<String> = (0..=MAX_SLOP).map(|s| s.to_string()).collect();
    let slop_options: Vec<(&str, &str)> = slops.iter().map(|s| (s.as_str(), s.as_str())).collect();
    format!(
        r#"<div id="field_{n}" class="panel panel-default constraint" data-kind="text">
    <div class="panel-heading"><span id="selected_field_{n}">{label}</span>{remove}</div>
    <div class="panel-body">
        {operator}
        <input type="hidden" id="match_field_{n}" name="match_field_{n}" value="{path}">
        {match_type}
        {slop}
        <textarea id="match_txt_{n}" name="match_txt_{n}" class="form-control" data-on-keyup="search-as-you-type" data-on-blur="hide" data-lookup-id="{n}">{text}</textarea>
        {suggestions}
    </div>
</div>"#,
        label = html_escape(&c.label),
        remove = remove_link(&n.element_id()),
        operator = operator_select(&format!("match_operator_{n}"), c.operator),
        path = html_escape(&c.path),
        match_type = select(&format!("match_type_{n}"), &match_types, c.match_type.as_str()),
        slop = select(&format!("match_slop_{n}"), &slop_options, &c.slop.to_string()),
        text = html_escape(&c.text),
        suggestions = suggestion_panel(n.into(), &c.suggestions),
    )
}

// ------------- Aggregations -------------
pub fn aggregation_view(view: &AggregationView) -> String {
    let timelines: String = view.timelines.iter().enumerate().map(|(i, t)| timeline_view(i, t)).collect();
    let terms: String = view.terms.iter().enumerate().map(|(i, t)| terms_view(i, t)).collect();
    format!(
        r#"<div id="daterange_agg_container">{timelines}</div>
<div id="string_agg_container">{terms}</div>"#
    )
}

fn level_heading(level: usize) -> String {
    match level {
        0 => "Field #1".to_string(),
        1 => "Field #2".to_string(),
        _ => "&nbsp;".to_string(),
    }
}

/// One table per visible level; only rows that can open another level are
/// clickable and carry the chevron.
fn drilldown_panel(panel_index: usize, level: usize, panel: &DrilldownPanel) -> String {
    let expanded_row = panel.expanded().map(|(row, _)| row);
    let rows: String = panel
        .buckets()
        .iter()
        .enumerate()
        .map(|(row, bucket)| {
            let cells = format!("<td>{}</td><td>{}</td>", bucket.val, html_escape(&bucket.key));
            if panel.is_expandable(row) {
                let active = if expanded_row == Some(row) { " active" } else { "" };
                format!(
                    r#"<tr class="pointer{active}" data-panel="{panel_index}" data-level="{level}" data-row="{row}">{cells}<td>{CHEVRON}</td></tr>"#
                )
            } else {
                format!("<tr>{cells}<td></td></tr>")
            }
        })
        .collect();
    format!(
        r#"<div class="drilldown-level" data-level="{level}" style="background-color: white; float: left; min-width: 200px;">
    <table class="table table-striped table-hover"><thead><th colspan='2'>{heading}</th></thead><tbody>{rows}</tbody></table>
</div>"#,
        heading = level_heading(level),
    )
}

pub fn terms_view(index: usize, view: &TermsView) -> String {
    let levels: String = view
        .root
        .visible_levels()
        .into_iter()
        .enumerate()
        .map(|(level, panel)| drilldown_panel(index, level, panel))
        .collect();
    format!(
        r#"<div class="agg-response" data-panel="{index}" style="float: left; padding-left: 20px;">
    <div class="row text-center"><h3>{label}</h3></div>
    {levels}
</div>"#,
        label = html_escape(&view.label),
    )
}

pub fn timeline_view(index: usize, view: &TimelineView) -> String {
    let chart = json!({
        "xkey": "date",
        "data": view.timeline.data,
        "ykeys": view.timeline.ykeys,
        "labels": view.timeline.labels,
    });
    let children = view.selection.as_ref().map(timeline_selection).unwrap_or_default();
    format!(
        r#"<div class="timeline" data-panel="{index}">
    <div class="timeline-chart" data-chart="{chart}"></div>
    <div class="timeline-children">{children}</div>
</div>"#,
        chart = html_escape(&chart.to_string()),
    )
}

fn timeline_selection(selection: &TimelineSelection) -> String {
    let mut html = String::new();
    for (g, group) in selection.groups.iter().enumerate() {
        let mut rows = String::new();
        let mut value_tables = String::new();
        for (r, bucket) in group.rows.iter().enumerate() {
            let cells = format!("<td>{}</td><td>{}</td>", bucket.val, html_escape(&bucket.key));
            if !bucket.has_children() {
                rows.push_str(&format!("<tr>{cells}</tr>"));
                continue;
            }
            rows.push_str(&format!(r#"<tr class="pointer" data-group="{g}" data-row="{r}">{cells}</tr>"#));
            let style = if group.shown == Some(r) { "" } else { r#" style="display: none;""# };
            let values: String = bucket
                .children
                .iter()
                .map(|child| format!("<tr><td>{}</td><td>{}</td></tr>", child.val, html_escape(&child.key)))
                .collect();
            value_tables.push_str(&format!(
                r#"<div style="float: left; padding-left: 20px;"><table id="{g}-{r}-table" class="table table-striped table-hover fact-val-table-{g}"{style}><thead><th colspan='2'>&nbsp;</th></thead><tbody>{values}</tbody></table></div>"#
            ));
        }
        html.push_str(&format!(
            r#"<div style="float: left; padding-left: 20px;"><table class="table table-striped table-hover"><thead><th colspan='2'>{label}</th></thead><tbody>{rows}</tbody></table></div>{value_tables}"#,
            label = html_escape(&group.label),
        ));
    }
    html
}

// ------------- Results -------------
/// Shown where results were expected when the backend could not be reached.
pub fn failed_row(message: &str) -> String {
    format!(
        r#"<div class="alert alert-danger request-failed">Request failed: {}</div>"#,
        html_escape(message)
    )
}

pub fn column_toggles(columns: &[String], hidden: &HiddenFeatures) -> String {
    let links: String = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let class = if hidden.is_hidden(i) { "toggle-visibility feature-invisible" } else { "toggle-visibility" };
            format!(
                r#"<a id="feature-{i}" class="{class}" data-column="{i}">{}</a>"#,
                html_escape(name)
            )
        })
        .collect();
    format!(r#"<div class="column-toggles">{links}</div>"#)
}

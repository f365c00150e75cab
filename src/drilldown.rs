//! Drilldown state for rendered aggregations.
//!
//! A [`DrilldownPanel`] lists buckets and shows at most one expanded row. The
//! expanded row's children form the next panel, so expanding another row in a
//! panel replaces everything below it while panels of other aggregations are
//! left alone. Rows without children never expand.

use tracing::debug;

use crate::aggregation::{Aggregation, Bucket, ChildGroup, TermsAggregation, TermsKind, Timeline};
use crate::error::{Result, SearcherError};

/// Levels shown for grouped counts: top, children, grandchildren.
pub const MAX_DEPTH: usize = 3;

// ------------- DrilldownPanel -------------
#[derive(Debug, Clone, PartialEq)]
pub struct DrilldownPanel {
    buckets: Vec<Bucket>,
    depth_remaining: usize,
    expanded: Option<(usize, Box<DrilldownPanel>)>,
}

impl DrilldownPanel {
    /// A panel whose rows may open `depth - 1` further levels.
    pub fn new(buckets: Vec<Bucket>, depth: usize) -> Self {
        Self {
            buckets,
            depth_remaining: depth.max(1),
            expanded: None,
        }
    }
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }
    pub fn depth_remaining(&self) -> usize {
        self.depth_remaining
    }
    pub fn is_expandable(&self, row: usize) -> bool {
        self.depth_remaining > 1 && self.buckets.get(row).is_some_and(Bucket::has_children)
    }
    pub fn expanded(&self) -> Option<(usize, &DrilldownPanel)> {
        self.expanded.as_ref().map(|(row, panel)| (*row, panel.as_ref()))
    }
    pub fn collapse(&mut self) {
        self.expanded = None;
    }

    /// Show the children of `row`, replacing whatever was expanded before.
    pub fn expand(&mut self, row: usize) -> Result<&DrilldownPanel> {
        self.expand_at(0, row)?;
        match &self.expanded {
            Some((_, panel)) => Ok(panel.as_ref()),
            None => Err(SearcherError::Inert { level: 0, row }),
        }
    }

    /// Expand `row` of the panel shown `level` steps below this one.
    pub fn expand_at(&mut self, level: usize, row: usize) -> Result<()> {
        let mut panel = self;
        for depth in 0..level {
            panel = match panel.expanded.as_mut() {
                Some((_, child)) => child.as_mut(),
                None => return Err(SearcherError::Inert { level: depth, row }),
            };
        }
        if !panel.is_expandable(row) {
            return Err(SearcherError::Inert { level, row });
        }
        let children = panel.buckets[row].children.clone();
        panel.expanded = Some((row, Box::new(DrilldownPanel::new(children, panel.depth_remaining - 1))));
        debug!(level, row, "drilldown expanded");
        Ok(())
    }

    /// This panel followed by every expanded panel below it.
    pub fn visible_levels(&self) -> Vec<&DrilldownPanel> {
        let mut levels = vec![self];
        let mut current = self;
        while let Some((_, child)) = current.expanded() {
            levels.push(child);
            current = child;
        }
        levels
    }
}

// ------------- Views -------------
#[derive(Debug, Clone, PartialEq)]
pub struct TermsView {
    pub kind: TermsKind,
    pub label: String,
    pub root: DrilldownPanel,
}

impl TermsView {
    pub fn new(aggregation: TermsAggregation, depth: usize) -> Self {
        Self {
            kind: aggregation.kind,
            label: aggregation.label,
            root: DrilldownPanel::new(aggregation.data, depth),
        }
    }
}

/// One child group of a selected timeline point, with at most one of its
/// rows showing its value table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildGroupView {
    pub label: String,
    pub rows: Vec<Bucket>,
    pub shown: Option<usize>,
}

impl ChildGroupView {
    fn new(group: &ChildGroup) -> Self {
        Self {
            label: group.label.clone(),
            rows: group.data.clone(),
            shown: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSelection {
    pub date: String,
    pub groups: Vec<ChildGroupView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineView {
    pub timeline: Timeline,
    pub selection: Option<TimelineSelection>,
}

impl TimelineView {
    pub fn new(timeline: Timeline) -> Self {
        Self { timeline, selection: None }
    }

    /// Replace the children panel with the groups of the clicked point. A date
    /// without groups leaves an empty panel.
    pub fn select(&mut self, date: &str) -> &TimelineSelection {
        let groups = self.timeline.groups_for(date).iter().map(ChildGroupView::new).collect();
        debug!(date, "timeline point selected");
        self.selection.insert(TimelineSelection { date: date.to_string(), groups })
    }

    /// Show the value table of `row` in `group`, hiding its siblings.
    pub fn show_values(&mut self, group: usize, row: usize) -> Result<()> {
        let inert = || SearcherError::Inert { level: group, row };
        let group_view = self
            .selection
            .as_mut()
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(inert)?;
        match group_view.rows.get(row) {
            Some(bucket) if bucket.has_children() => {
                group_view.shown = Some(row);
                Ok(())
            }
            _ => Err(inert()),
        }
    }
}

// ------------- AggregationView -------------
/// Everything rendered for one aggregation response. A new response builds a
/// new view; nothing carries over from the previous one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregationView {
    pub timelines: Vec<TimelineView>,
    pub terms: Vec<TermsView>,
}

impl AggregationView {
    pub fn display(aggregations: Vec<Aggregation>, depth: usize) -> Self {
        let mut view = Self::default();
        for aggregation in aggregations {
            match aggregation {
                Aggregation::Timeline(timeline) => view.timelines.push(TimelineView::new(timeline)),
                Aggregation::Terms(terms) => view.terms.push(TermsView::new(terms, depth)),
            }
        }
        debug!(timelines = view.timelines.len(), terms = view.terms.len(), "aggregation view built");
        view
    }
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty() && self.terms.is_empty()
    }
    pub fn expand(&mut self, panel: usize, level: usize, row: usize) -> Result<()> {
        self.terms
            .get_mut(panel)
            .ok_or(SearcherError::Inert { level, row })?
            .root
            .expand_at(level, row)
    }
    pub fn select_date(&mut self, panel: usize, date: &str) -> Result<&TimelineSelection> {
        let view = self
            .timelines
            .get_mut(panel)
            .ok_or_else(|| SearcherError::UnknownConstraint(format!("timeline {panel}")))?;
        Ok(view.select(date))
    }
    pub fn show_values(&mut self, panel: usize, group: usize, row: usize) -> Result<()> {
        self.timelines
            .get_mut(panel)
            .ok_or(SearcherError::Inert { level: group, row })?
            .show_values(group, row)
    }
}

//! Searcher – the interactive side of a document search page.
//!
//! A user builds a query out of constraints, one row per selected field:
//! * a date range for `date` fields,
//! * fact existence for `facts` fields, with autocomplete,
//! * fact value rules (`fact_str_val`, `fact_num_val`), each rule addressed by
//!   a compound identifier `N_S`,
//! * a text match for everything else, re-queried as the user types.
//!
//! Aggregation responses render as timelines and as grouped-count tables that
//! drill down up to three levels, one expanded row per level.
//!
//! ## Modules
//! * [`identifier`] – field and rule identifiers and their allocator.
//! * [`builder`] – the [`builder::ConstraintBuilder`] owning every row, and
//!   [`constraint`] – the row types and their form serialization.
//! * [`autocomplete`] – lookup requests and suggestion panels.
//! * [`aggregation`] / [`drilldown`] – aggregation responses and their views.
//! * [`page`] – page inputs outside the rows: aggregation fields,
//!   more-like-this feedback, mapping fields and ticked saved searches.
//! * [`render`] – HTML fragments for rows and views.
//! * [`session`] / [`registry`] / [`server`] – per-user state, the async
//!   backend round-trips and the HTTP surface over both.
//!
//! ## Timing
//! A blurred suggestion panel hides after a delay; a text match input queries
//! once typing has paused. Both are deadlines applied by a periodic sweep (see
//! [`registry::SessionRegistry::sweep`]), so every component stays testable
//! with explicit instants.

pub mod aggregation;
pub mod autocomplete;
pub mod backend;
pub mod builder;
pub mod config;
pub mod constraint;
pub mod descriptor;
pub mod drilldown;
pub mod error;
pub mod export;
pub mod identifier;
pub mod notify;
pub mod page;
pub mod preferences;
pub mod registry;
pub mod render;
pub mod server;
pub mod session;
pub mod timing;

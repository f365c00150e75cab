//! Runtime settings.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `SEARCHER_*` environment variables (e.g. `SEARCHER_BACKEND_URL`).

use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_CONFIG_FILE: &str = "searcher.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Address the presentation server binds to.
    pub listen: String,
    /// Prefix of the search backend endpoints (`/autocomplete`, `/aggregate`, ...).
    pub backend_url: String,
    pub lookup_hide_delay_ms: u64,
    pub search_debounce_ms: u64,
    pub sweep_interval_ms: u64,
    /// Nesting levels shown for string aggregations (top, children, grandchildren).
    pub drilldown_depth: usize,
    /// SQLite file holding user preferences. In-memory when absent.
    #[serde(default)]
    pub preference_db: Option<String>,
    pub preference_ttl_months: u32,
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Load settings, reading `path` (or `searcher.toml`) when it exists.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("listen", "127.0.0.1:8080")?
            .set_default("backend_url", "http://127.0.0.1:8000/searcher")?
            .set_default("lookup_hide_delay_ms", 500_i64)?
            .set_default("search_debounce_ms", 500_i64)?
            .set_default("sweep_interval_ms", 100_i64)?
            .set_default("drilldown_depth", 3_i64)?
            .set_default("preference_ttl_months", 1_i64)?
            .set_default("request_timeout_secs", 30_i64)?
            .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(false))
            .add_source(Environment::with_prefix("SEARCHER"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn lookup_hide_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_hide_delay_ms)
    }
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
    /// The timing part of the settings, handed to each session.
    pub fn timing(&self) -> Timing {
        Timing {
            hide_delay: self.lookup_hide_delay(),
            debounce: self.search_debounce(),
            drilldown_depth: self.drilldown_depth,
        }
    }
}

/// Per-session UI timing and depth parameters.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub hide_delay: Duration,
    pub debounce: Duration,
    pub drilldown_depth: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            hide_delay: Duration::from_millis(500),
            debounce: Duration::from_millis(500),
            drilldown_depth: crate::drilldown::MAX_DEPTH,
        }
    }
}

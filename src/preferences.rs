//! Hidden result columns, remembered per dataset and mapping.
//!
//! A preference is a JSON object mapping column index to `true`. Toggling a
//! hidden column removes its entry. Stored values expire a configured number
//! of months after they were last written.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Months, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SearcherError};

pub fn storage_key(dataset: &str, mapping: &str) -> String {
    format!("hiddenFeatures_{dataset}_{mapping}")
}

// ------------- HiddenFeatures -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HiddenFeatures(BTreeMap<String, bool>);

impl HiddenFeatures {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn is_hidden(&self, column: usize) -> bool {
        self.0.get(&column.to_string()).copied().unwrap_or(false)
    }
    /// Flip a column and return whether it is now hidden.
    pub fn toggle(&mut self, column: usize) -> bool {
        let key = column.to_string();
        if self.0.remove(&key).is_some() {
            false
        } else {
            self.0.insert(key, true);
            true
        }
    }
    pub fn columns(&self) -> Vec<usize> {
        self.0
            .iter()
            .filter(|(_, hidden)| **hidden)
            .filter_map(|(column, _)| column.parse().ok())
            .collect()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ------------- Stores -------------
pub trait PreferenceStore: Send + Sync {
    /// The stored value, unless it has expired by `now`.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str, expires: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let mut entries = self.entries.lock().map_err(|e| SearcherError::Persistence(e.to_string()))?;
        match entries.get(key) {
            Some((_, expires)) if *expires <= now => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
    fn set(&self, key: &str, value: &str, expires: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|e| SearcherError::Persistence(e.to_string()))?;
        entries.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }
}

/// Preferences kept in a SQLite file so they survive restarts.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }
    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Preference (
                Preference_Key text not null,
                Preference_Value text not null,
                ExpiresAt text not null,
                constraint referenceable_Preference_Key primary key (
                    Preference_Key
                )
            );
            ",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl PreferenceStore for SqliteStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let connection = self.connection.lock().map_err(|e| SearcherError::Persistence(e.to_string()))?;
        let row = connection
            .query_row(
                "select Preference_Value, ExpiresAt from Preference where Preference_Key = ?",
                params![key],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, DateTime<Utc>>(1)?)),
            )
            .optional()?;
        match row {
            Some((_, expires)) if expires <= now => {
                connection.execute("delete from Preference where Preference_Key = ?", params![key])?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }
    fn set(&self, key: &str, value: &str, expires: DateTime<Utc>) -> Result<()> {
        let connection = self.connection.lock().map_err(|e| SearcherError::Persistence(e.to_string()))?;
        connection.execute(
            "
            insert into Preference (
                Preference_Key,
                Preference_Value,
                ExpiresAt
            ) values (?, ?, ?)
            on conflict (Preference_Key) do update set
                Preference_Value = excluded.Preference_Value,
                ExpiresAt = excluded.ExpiresAt
            ",
            params![key, value, expires],
        )?;
        Ok(())
    }
}

// ------------- Preferences -------------
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
    ttl: Months,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>, ttl_months: u32) -> Self {
        Self {
            store,
            ttl: Months::new(ttl_months),
        }
    }
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), 1)
    }
    /// Open the configured SQLite file, or keep preferences in memory.
    pub fn from_settings(path: Option<&str>, ttl_months: u32) -> Result<Self> {
        let store: Arc<dyn PreferenceStore> = match path {
            Some(path) => {
                info!(path, "storing preferences in sqlite");
                Arc::new(SqliteStore::open(path)?)
            }
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(store, ttl_months))
    }

    pub fn load_hidden(&self, dataset: &str, mapping: &str, now: DateTime<Utc>) -> Result<HiddenFeatures> {
        match self.store.get(&storage_key(dataset, mapping), now)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(HiddenFeatures::new()),
        }
    }

    /// Toggle one column and write the whole set back with a fresh expiry.
    pub fn toggle_column(
        &self,
        dataset: &str,
        mapping: &str,
        column: usize,
        now: DateTime<Utc>,
    ) -> Result<HiddenFeatures> {
        let mut hidden = self.load_hidden(dataset, mapping, now)?;
        let now_hidden = hidden.toggle(column);
        let expires = now
            .checked_add_months(self.ttl)
            .ok_or_else(|| SearcherError::Persistence(format!("expiry overflow from {now}")))?;
        self.store
            .set(&storage_key(dataset, mapping), &serde_json::to_string(&hidden)?, expires)?;
        debug!(dataset, mapping, column, hidden = now_hidden, "column visibility toggled");
        Ok(hidden)
    }
}

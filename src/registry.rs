//! Registry of open search sessions.
//!
//! Sessions are addressed by an opaque id handed out from a counter. A
//! periodic [`SessionRegistry::sweep`] applies the timed UI effects: due
//! suggestion-panel hides and debounced search-as-you-type queries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::Timing;
use crate::error::{Result, SearcherError};
use crate::preferences::Preferences;
use crate::session::{SearchSession, SessionHandle};

pub struct SessionRegistry {
    backend: Arc<dyn Backend>,
    preferences: Preferences,
    timing: Timing,
    next_id: Mutex<u64>,
    active: Mutex<HashMap<u64, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn Backend>, preferences: Preferences, timing: Timing) -> Self {
        Self {
            backend,
            preferences,
            timing,
            next_id: Mutex::new(0),
            active: Mutex::new(HashMap::new()),
        }
    }

    fn allocate_id(&self) -> Result<u64> {
        let mut g = self.next_id.lock().map_err(poisoned)?;
        *g += 1;
        Ok(*g)
    }

    pub fn open(&self, dataset: &str, mapping: &str) -> Result<SessionHandle> {
        let id = self.allocate_id()?;
        let session = SearchSession::new(dataset, mapping, self.timing);
        let handle = SessionHandle::new(id, session, Arc::clone(&self.backend), self.preferences.clone());
        self.active.lock().map_err(poisoned)?.insert(id, handle.clone());
        info!(session = id, dataset, mapping, "session opened");
        Ok(handle)
    }

    pub fn get(&self, id: u64) -> Result<SessionHandle> {
        self.active
            .lock()
            .map_err(poisoned)?
            .get(&id)
            .cloned()
            .ok_or(SearcherError::UnknownSession(id))
    }

    pub fn close(&self, id: u64) -> Result<bool> {
        let removed = self.active.lock().map_err(poisoned)?.remove(&id).is_some();
        if removed {
            info!(session = id, "session closed");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tick every session once. Due panel hides are applied in place; each
    /// due debounced query is spawned so a slow backend never holds up the
    /// other sessions. A failing query is logged and shows in its session's
    /// results pane. Returns the spawned queries.
    pub async fn sweep(&self, now: Instant) -> Vec<JoinHandle<()>> {
        let handles: Vec<SessionHandle> = match self.active.lock() {
            Ok(active) => active.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        let mut queries = Vec::new();
        for handle in handles {
            if !handle.tick(now).await {
                continue;
            }
            queries.push(tokio::spawn(async move {
                if let Err(e) = handle.query().await {
                    warn!(session = handle.id, error = %e, "debounced query failed");
                }
            }));
        }
        queries
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> SearcherError {
    SearcherError::Persistence(format!("session registry lock poisoned: {e}"))
}

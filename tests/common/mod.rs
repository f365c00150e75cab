#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use searcher::autocomplete::LookupRequest;
use searcher::backend::{Backend, SavedSearch};
use searcher::config::Timing;
use searcher::constraint::FormPairs;
use searcher::error::{Result, SearcherError};
use searcher::export::PagingInfo;
use searcher::notify::Resource;
use searcher::preferences::Preferences;
use searcher::registry::SessionRegistry;
use tokio::sync::Notify;

pub const AGGREGATION: &str = r#"[{"type":"string","label":"Author","data":[{"key":"Smith","val":5,"children":[{"key":"2020","val":3,"children":[]}]}]}]"#;
pub const HEADER: &str = "<table id='examples'><thead><tr><th>id</th><th><b>title</b></th><th>text</th></tr></thead></table>";

/// Canned backend recording every request it receives.
#[derive(Default)]
pub struct FakeBackend {
    pub suggestions: Mutex<String>,
    pub aggregation: Mutex<String>,
    pub fail_with: Mutex<Option<u16>>,
    pub lookups: Mutex<Vec<LookupRequest>>,
    pub forms: Mutex<Vec<(String, FormPairs)>>,
    pub saved: Mutex<Vec<SavedSearch>>,
    /// While set, table header requests wait until released.
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        *backend.aggregation.lock().unwrap() = AGGREGATION.to_string();
        backend
    }
    pub fn suggest(&self, html: &str) {
        *self.suggestions.lock().unwrap() = html.to_string();
    }
    pub fn fail(&self, status: Option<u16>) {
        *self.fail_with.lock().unwrap() = status;
    }
    pub fn stall(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }
    pub fn calls(&self, endpoint: &str) -> Vec<FormPairs> {
        self.forms
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, f)| f.clone())
            .collect()
    }
    fn record(&self, endpoint: &str, form: &FormPairs) -> Result<()> {
        self.forms.lock().unwrap().push((endpoint.to_string(), form.clone()));
        match *self.fail_with.lock().unwrap() {
            Some(status) => Err(SearcherError::Backend { endpoint: endpoint.to_string(), status }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn autocomplete(&self, request: &LookupRequest) -> Result<String> {
        self.lookups.lock().unwrap().push(request.clone());
        self.record("autocomplete", &FormPairs::new())?;
        Ok(self.suggestions.lock().unwrap().clone())
    }
    async fn table_header(&self, form: &FormPairs) -> Result<String> {
        self.record("table_header", form)?;
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(HEADER.to_string())
    }
    async fn table_content(&self, form: &FormPairs, paging: PagingInfo) -> Result<String> {
        self.record("table_content", form)?;
        Ok(format!(r#"{{"iDisplayStart":{}}}"#, paging.start))
    }
    async fn aggregate(&self, form: &FormPairs) -> Result<String> {
        self.record("aggregate", form)?;
        Ok(self.aggregation.lock().unwrap().clone())
    }
    async fn cluster_query(&self, form: &FormPairs) -> Result<String> {
        self.record("cluster_query", form)?;
        Ok("<div>clusters</div>".to_string())
    }
    async fn mlt_query(&self, form: &FormPairs) -> Result<String> {
        self.record("mlt_query", form)?;
        Ok("<div>similar</div>".to_string())
    }
    async fn remove_by_query(&self, form: &FormPairs) -> Result<String> {
        self.record("remove_by_query", form)?;
        Ok("started".to_string())
    }
    async fn save(&self, form: &FormPairs) -> Result<()> {
        self.record("save", form)?;
        let desc = form
            .iter()
            .find(|(n, _)| n == "search_description")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let mut saved = self.saved.lock().unwrap();
        let id = saved.len() as u64 + 1;
        saved.push(SavedSearch { id, desc });
        Ok(())
    }
    async fn listing(&self, form: &FormPairs) -> Result<Vec<SavedSearch>> {
        self.record("listing", form)?;
        Ok(self.saved.lock().unwrap().clone())
    }
    async fn get_query(&self, form: &FormPairs) -> Result<String> {
        self.record("get_query", form)?;
        Ok(r#"{"query":{"bool":{"must":[]}}}"#.to_string())
    }
    async fn update_resource(&self, resource: Resource, form: &FormPairs) -> Result<String> {
        self.record(resource.endpoint(), form)?;
        Ok(r#"{"status":"success"}"#.to_string())
    }
    async fn delete_search(&self, id: u64) -> Result<String> {
        self.record("corpus_tool/delete", &vec![("pk".to_string(), id.to_string())])?;
        self.saved.lock().unwrap().retain(|s| s.id != id);
        Ok(id.to_string())
    }
}

pub fn registry(backend: Arc<FakeBackend>) -> SessionRegistry {
    SessionRegistry::new(backend, Preferences::in_memory(), Timing::default())
}

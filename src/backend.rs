//! Collaborator endpoints of the search backend.
//!
//! Bodies are mostly opaque: HTML fragments rendered as-is, or JSON parsed by
//! the caller. Every non-success status becomes [`SearcherError::Backend`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::autocomplete::LookupRequest;
use crate::config::Settings;
use crate::constraint::FormPairs;
use crate::error::{Result, SearcherError};
use crate::export::{named_values, PagingInfo};
use crate::notify::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: u64,
    pub desc: String,
}

/// `filterParams` for the datatable source: the form as a JSON array of
/// `{name, value}` objects.
pub fn filter_params(form: &FormPairs) -> Result<String> {
    Ok(serde_json::to_string(&named_values(form))?)
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Suggestion list items; empty when nothing matches.
    async fn autocomplete(&self, request: &LookupRequest) -> Result<String>;
    async fn table_header(&self, form: &FormPairs) -> Result<String>;
    async fn table_content(&self, form: &FormPairs, paging: PagingInfo) -> Result<String>;
    async fn aggregate(&self, form: &FormPairs) -> Result<String>;
    async fn cluster_query(&self, form: &FormPairs) -> Result<String>;
    async fn mlt_query(&self, form: &FormPairs) -> Result<String>;
    async fn remove_by_query(&self, form: &FormPairs) -> Result<String>;
    async fn save(&self, form: &FormPairs) -> Result<()>;
    async fn listing(&self, form: &FormPairs) -> Result<Vec<SavedSearch>>;
    async fn get_query(&self, form: &FormPairs) -> Result<String>;
    async fn update_resource(&self, resource: Resource, form: &FormPairs) -> Result<String>;
    /// Delete a saved search; answers with the deleted id.
    async fn delete_search(&self, id: u64) -> Result<String>;
}

// ------------- HttpBackend -------------
pub struct HttpBackend {
    base: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder().timeout(settings.request_timeout()).build()?;
        Ok(Self {
            base: settings.backend_url.trim_end_matches('/').to_string(),
            client,
        })
    }
    pub fn base(&self) -> &str {
        &self.base
    }
    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base)
    }
    async fn post_form(&self, endpoint: &'static str, form: &FormPairs) -> Result<String> {
        debug!(endpoint, pairs = form.len(), "backend request");
        let response = self.client.post(self.url(endpoint)).form(form).send().await?;
        checked(endpoint, response).await
    }
    async fn get_form(&self, endpoint: &'static str, form: &FormPairs) -> Result<String> {
        debug!(endpoint, pairs = form.len(), "backend request");
        let response = self.client.get(self.url(endpoint)).query(form).send().await?;
        checked(endpoint, response).await
    }
}

async fn checked(endpoint: &str, response: Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        warn!(endpoint, status = status.as_u16(), "backend request failed");
        return Err(SearcherError::Backend {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn autocomplete(&self, request: &LookupRequest) -> Result<String> {
        debug!(id = %request.id, field = %request.field_name, "autocomplete lookup");
        let response = self.client.post(self.url("autocomplete")).form(request).send().await?;
        checked("autocomplete", response).await
    }
    async fn table_header(&self, form: &FormPairs) -> Result<String> {
        self.get_form("table_header", form).await
    }
    async fn table_content(&self, form: &FormPairs, paging: PagingInfo) -> Result<String> {
        let params = [
            ("filterParams".to_string(), filter_params(form)?),
            ("iDisplayStart".to_string(), paging.start.to_string()),
            ("iDisplayLength".to_string(), paging.length.to_string()),
        ];
        let response = self.client.get(self.url("table_content")).query(&params).send().await?;
        checked("table_content", response).await
    }
    async fn aggregate(&self, form: &FormPairs) -> Result<String> {
        self.post_form("aggregate", form).await
    }
    async fn cluster_query(&self, form: &FormPairs) -> Result<String> {
        self.post_form("cluster_query", form).await
    }
    async fn mlt_query(&self, form: &FormPairs) -> Result<String> {
        self.post_form("mlt_query", form).await
    }
    async fn remove_by_query(&self, form: &FormPairs) -> Result<String> {
        self.post_form("remove_by_query", form).await
    }
    async fn save(&self, form: &FormPairs) -> Result<()> {
        self.post_form("save", form).await.map(|_| ())
    }
    async fn listing(&self, form: &FormPairs) -> Result<Vec<SavedSearch>> {
        let body = self.get_form("listing", form).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
    async fn get_query(&self, form: &FormPairs) -> Result<String> {
        self.post_form("get_query", form).await
    }
    async fn update_resource(&self, resource: Resource, form: &FormPairs) -> Result<String> {
        self.post_form(resource.endpoint(), form).await
    }
    async fn delete_search(&self, id: u64) -> Result<String> {
        let params: FormPairs = vec![("pk".to_string(), id.to_string())];
        self.get_form("corpus_tool/delete", &params).await
    }
}

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use greenroom_core::collab::{CollabError, KnowledgeStore, RecordId, RecordStore};
use greenroom_core::config::StoreConfig;
use greenroom_core::fields::FieldMap;

use crate::props;

const API_VERSION: &str = "2022-06-28";

/// HTTP client for the page-database workspace. One instance is shared by
/// both knowledge lookups and record writes.
pub struct PageStore {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl PageStore {
    pub fn new(config: &StoreConfig) -> Result<Self, CollabError> {
        let client = Client::builder()
            .build()
            .map_err(|error| CollabError::transport("store", error.to_string()))?;
        Ok(Self {
            client,
            token: config.token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .header("Notion-Version", API_VERSION)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, CollabError> {
        let response = request
            .send()
            .await
            .map_err(|error| CollabError::transport("store", error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollabError::transport(
                "store",
                format!("endpoint returned {status}: {detail}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|error| CollabError::payload("store", format!("invalid response: {error}")))
    }

    async fn query_pages(
        &self,
        database_id: &str,
        name_contains: &str,
    ) -> Result<Vec<Value>, CollabError> {
        let body = json!({
            "filter": {
                "property": props::TITLE_PROPERTY,
                "title": { "contains": name_contains }
            }
        });
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("databases/{database_id}/query"))
                    .json(&body),
            )
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| CollabError::payload("store", "query response missing results"))?;
        debug!(
            event_name = "store.query_completed",
            database_id,
            hits = results.len(),
            "database query completed"
        );
        Ok(results)
    }
}

#[async_trait]
impl KnowledgeStore for PageStore {
    async fn query(
        &self,
        collection: &str,
        name_contains: &str,
    ) -> Result<Vec<FieldMap>, CollabError> {
        let pages = self.query_pages(collection, name_contains).await?;
        Ok(pages
            .iter()
            .filter_map(|page| page.get("properties"))
            .map(props::parse_properties)
            .collect())
    }
}

#[async_trait]
impl RecordStore for PageStore {
    async fn create(&self, collection: &str, fields: &FieldMap) -> Result<RecordId, CollabError> {
        let mut fields = fields.clone();
        if !fields.contains_key(props::TITLE_PROPERTY) {
            if let Some(title) = props::derive_title(&fields) {
                fields.insert(props::TITLE_PROPERTY.to_string(), title);
            }
        }

        let body = json!({
            "parent": { "database_id": collection },
            "properties": props::build_properties(&fields)
        });
        let response =
            self.send(self.request(reqwest::Method::POST, "pages").json(&body)).await?;

        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CollabError::payload("store", "created page carries no id"))?;
        Ok(RecordId(id.to_string()))
    }

    async fn update(&self, id: &RecordId, fields: &FieldMap) -> Result<(), CollabError> {
        let body = json!({ "properties": props::build_properties(fields) });
        self.send(
            self.request(reqwest::Method::PATCH, &format!("pages/{}", id.0)).json(&body),
        )
        .await?;
        Ok(())
    }

    async fn get(&self, id: &RecordId) -> Result<FieldMap, CollabError> {
        let response =
            self.send(self.request(reqwest::Method::GET, &format!("pages/{}", id.0))).await?;
        let properties = response
            .get("properties")
            .ok_or_else(|| CollabError::payload("store", "page carries no properties"))?;
        Ok(props::parse_properties(properties))
    }

    async fn find_by_name(
        &self,
        collection: &str,
        name: &str,
    ) -> Result<Option<(RecordId, FieldMap)>, CollabError> {
        let pages = self.query_pages(collection, name).await?;
        let Some(page) = pages.first() else {
            return Ok(None);
        };

        let id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CollabError::payload("store", "page carries no id"))?;
        let fields = page
            .get("properties")
            .map(props::parse_properties)
            .unwrap_or_default();
        Ok(Some((RecordId(id.to_string()), fields)))
    }
}

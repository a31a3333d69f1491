use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tracing::debug;

use super::{decode_fields, encode_fields, Document, DocumentStore, Fields, StoreError, Value};
use crate::config::StoreConfig;

const LIST_PAGE_SIZE: usize = 300;

/// Firestore REST v1 クライアント
pub struct FirestoreStore {
    http_client: reqwest::Client,
    config: StoreConfig,
}

/// REST レスポンスのドキュメント
#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Json>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryEntry {
    document: Option<RawDocument>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let fields = match self.fields {
            Some(raw) => decode_fields(&raw)?,
            None => Fields::new(),
        };
        Ok(Document::new(id, fields))
    }
}

impl FirestoreStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.config.documents_url(), collection, id)
    }

    /// ドキュメント名（runQuery のカーソル用）
    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}/{}",
            self.config.project_id, collection, id
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.emulator_host, &self.config.access_token) {
            (None, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn run_query(&self, structured_query: Json) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.config.documents_url());
        debug!("Firestore runQuery: {}", structured_query);

        let response = self
            .authorize(self.http_client.post(&url))
            .json(&json!({ "structuredQuery": structured_query }))
            .send()
            .await?;
        let entries: Vec<RunQueryEntry> = Self::check(response).await?.json().await?;

        entries
            .into_iter()
            .filter_map(|entry| entry.document)
            .map(RawDocument::into_document)
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .authorize(self.http_client.get(self.document_url(collection, id)))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = Self::check(response).await?.json().await?;
        raw.into_document().map(Some)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}/{}", self.config.documents_url(), collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .authorize(self.http_client.get(&url))
                .query(&query)
                .send()
                .await?;
            let page: ListResponse = Self::check(response).await?.json().await?;

            for raw in page.documents {
                documents.push(raw.into_document()?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} documents from {}", documents.len(), collection);
        Ok(documents)
    }

    async fn list_page(
        &self,
        collection: &str,
        limit: usize,
        start_after: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut query = json!({
            "from": [{ "collectionId": collection }],
            "orderBy": [{ "field": { "fieldPath": "__name__" }, "direction": "ASCENDING" }],
            "limit": limit,
        });
        if let Some(after) = start_after {
            query["startAt"] = json!({
                "values": [{ "referenceValue": self.document_name(collection, after) }],
                "before": false,
            });
        }
        self.run_query(query).await
    }

    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let query = json!({
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": value.encode(),
                }
            },
            "limit": limit,
        });
        self.run_query(query).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http_client.patch(self.document_url(collection, id)))
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let response = self
            .authorize(self.http_client.patch(self.document_url(collection, id)))
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.config.documents_url(), collection);
        let response = self
            .authorize(self.http_client.post(&url))
            .json(&json!({ "fields": encode_fields(&fields) }))
            .send()
            .await?;
        let raw: RawDocument = Self::check(response).await?.json().await?;
        Ok(raw.into_document()?.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_document_id_from_name() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/lawgic/databases/(default)/documents/users/abc123",
            "fields": { "zip_code": { "stringValue": "70817" } }
        }))
        .unwrap();

        let doc = raw.into_document().unwrap();
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.get_str("zip_code"), Some("70817"));
    }

    #[test]
    fn test_run_query_entries_without_document_are_skipped() {
        let entries: Vec<RunQueryEntry> = serde_json::from_value(json!([
            { "readTime": "2025-10-01T00:00:00Z" }
        ]))
        .unwrap();
        assert!(entries[0].document.is_none());
    }

    #[test]
    fn test_document_name() {
        let store = FirestoreStore::new(StoreConfig::new("lawgic")).unwrap();
        assert_eq!(
            store.document_name("users", "u1"),
            "projects/lawgic/databases/(default)/documents/users/u1"
        );
        assert!(store
            .document_url("users", "u1")
            .ends_with("/documents/users/u1"));
    }
}

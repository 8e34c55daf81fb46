//! Firestore REST client implementing [`DocumentStore`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::auth::{Credentials, TokenSource};
use super::codec::{RawDocument, encode_fields, encode_value, quote_field_path};
use crate::{
    CollectionPath, Document, DocumentPath, DocumentStore, StoreError, UpdateValue, Write,
    WriteBatch,
};

/// Production API endpoint.
pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Database ID used when none is given.
pub const DEFAULT_DATABASE: &str = "(default)";

const LIST_PAGE_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Client for the Firestore v1 REST API.
///
/// Every call is attempted exactly once; failures are reported to the caller.
pub struct FirestoreClient {
    http: Client,
    endpoint: String,
    project_id: String,
    database_id: String,
    tokens: TokenSource,
}

impl FirestoreClient {
    /// Client for the production endpoint.
    pub fn new(
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self::with_endpoint(FIRESTORE_ENDPOINT, project_id, database_id, credentials)
    }

    /// Client for a local emulator at `host` (e.g. `localhost:8080`).
    pub fn emulator(
        host: &str,
        project_id: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        let endpoint = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        Self::with_endpoint(endpoint, project_id, database_id, Credentials::Emulator)
    }

    /// Client for an arbitrary endpoint.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        database_id: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        let endpoint: String = endpoint.into();

        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            database_id: database_id.into(),
            tokens: TokenSource::new(credentials),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// `projects/{project}/databases/{database}/documents`
    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }

    fn document_name(&self, path: &DocumentPath) -> String {
        format!("{}/{}", self.documents_root(), path)
    }

    /// Request URL for `{endpoint}/v1/projects/{project}/databases/{database}/{segments...}`.
    ///
    /// Each segment is percent-encoded on its own, so IDs containing `?`, `#`
    /// or `%` stay inside their segment.
    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, StoreError> {
        let invalid = || StoreError::InvalidEndpoint(self.endpoint.clone());
        let mut url = Url::parse(&self.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database_id.as_str(),
            ])
            .extend(segments);
        Ok(url)
    }

    fn documents_url(&self, segments: &[String]) -> Result<Url, StoreError> {
        self.url(std::iter::once("documents").chain(segments.iter().map(String::as_str)))
    }

    async fn list_page(
        &self,
        collection: &CollectionPath,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, StoreError> {
        let token = self.tokens.token().await?;
        let url = self.documents_url(collection.segments())?;

        let mut query: Vec<(&str, String)> = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    fn encode_write(&self, write: &Write) -> serde_json::Value {
        match write {
            Write::Update { path, updates } => {
                let mut fields = serde_json::Map::new();
                let mut mask = Vec::new();
                let mut transforms = Vec::new();

                for (name, value) in updates.iter() {
                    match value {
                        UpdateValue::Set(v) => {
                            fields.insert(name.to_string(), encode_value(v));
                            mask.push(quote_field_path(name));
                        }
                        // In the mask but absent from `fields` means delete.
                        UpdateValue::Delete => mask.push(quote_field_path(name)),
                        UpdateValue::ServerTimestamp => transforms.push(json!({
                            "fieldPath": quote_field_path(name),
                            "setToServerValue": "REQUEST_TIME"
                        })),
                    }
                }

                let mut encoded = json!({
                    "update": { "name": self.document_name(path), "fields": fields },
                    "updateMask": { "fieldPaths": mask },
                    "currentDocument": { "exists": true }
                });
                if !transforms.is_empty() {
                    encoded["updateTransforms"] = serde_json::Value::Array(transforms);
                }
                encoded
            }
            Write::Set { path, fields } => json!({
                "update": { "name": self.document_name(path), "fields": encode_fields(fields) }
            }),
            Write::Delete { path } => json!({ "delete": self.document_name(path) }),
        }
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.map_err(|e| {
                StoreError::InvalidResponse(format!(
                    "request failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;

            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) {
                if body.error.status == "NOT_FOUND" {
                    return Err(StoreError::NotFound {
                        path: body.error.message,
                    });
                }
                return Err(StoreError::Api {
                    status: body.error.status,
                    message: body.error.message,
                });
            }

            return Err(StoreError::InvalidResponse(format!(
                "request failed ({}): {}",
                status, text
            )));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn list_documents(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<Document>, StoreError> {
        let root = self.documents_root();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(collection, page_token.as_deref()).await?;
            for raw in page.documents {
                documents.push(raw.into_document(&root)?);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!(collection = %collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let token = self.tokens.token().await?;
        let url = self.documents_url(path.segments())?;

        let response = self.http.get(url).bearer_auth(token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: RawDocument = self.handle_response(response).await?;
        raw.into_document(&self.documents_root()).map(Some)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let max = self.max_batch_size();
        if batch.len() > max {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                max,
            });
        }

        let writes: Vec<_> = batch.writes().iter().map(|w| self.encode_write(w)).collect();
        let token = self.tokens.token().await?;
        let url = self.url(["documents:commit"])?;

        debug!(count = writes.len(), "committing writes");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "writes": writes }))
            .send()
            .await?;

        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }
}

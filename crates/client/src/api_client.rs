//! HTTP API client for the notification endpoints.

use async_trait::async_trait;
use mfgdesk_shared::{ApiError, NotificationId, NotificationPage, NotificationQuery};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::credentials::Credential;

/// The server side of the notification store.
///
/// Every call carries the bearer credential explicitly.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Most recent notifications plus the server's unread total
    async fn fetch_notifications(
        &self,
        credential: &Credential,
        query: NotificationQuery,
    ) -> Result<NotificationPage, ApiError>;

    async fn mark_read(&self, credential: &Credential, id: &NotificationId) -> Result<(), ApiError>;

    async fn mark_all_read(&self, credential: &Credential) -> Result<(), ApiError>;
}

/// HTTP client for the dashboard REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Make an authenticated GET request
    pub async fn get_json<TRes: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<TRes, ApiError> {
        let rb = self
            .client
            .get(self.url(path))
            .query(query)
            .bearer_auth(credential.token());
        let text = send(rb).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make an authenticated POST request without a body, ignoring any response body
    pub async fn post_empty(&self, credential: &Credential, path: &str) -> Result<(), ApiError> {
        let rb = self
            .client
            .post(self.url(path))
            .bearer_auth(credential.token());
        send(rb).await.map(|_| ())
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn send(rb: RequestBuilder) -> Result<String, ApiError> {
    let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    let is_success = resp.status().is_success();

    let text = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

    if !is_success {
        return Err(ApiError::Http { status, body: text });
    }

    Ok(text)
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn fetch_notifications(
        &self,
        credential: &Credential,
        query: NotificationQuery,
    ) -> Result<NotificationPage, ApiError> {
        self.get_json(credential, "/api/notifications", &query.pairs())
            .await
    }

    async fn mark_read(&self, credential: &Credential, id: &NotificationId) -> Result<(), ApiError> {
        let path = format!("/api/notifications/{}/read", urlencoding::encode(id.as_str()));
        self.post_empty(credential, &path).await
    }

    async fn mark_all_read(&self, credential: &Credential) -> Result<(), ApiError> {
        self.post_empty(credential, "/api/notifications/read-all").await
    }
}

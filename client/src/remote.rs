//! Remote record service - the system of record the outbox drains into.

use crate::config::Config;
use crate::error::RemoteError;
use async_trait::async_trait;
use harbor_engine::{OpKind, PendingOperation};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// Header carrying the operation id, so the remote can drop a replay it has
/// already applied.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Per-collection insert/update/delete on the remote system of record.
///
/// Only success or failure matters to the caller. Implementations should be
/// idempotent per `op_id`: after a crash between remote success and local
/// acknowledgement the same operation is replayed.
#[async_trait]
pub trait RemoteRecordService: Send + Sync {
    async fn insert(&self, collection: &str, payload: &Value, op_id: &str)
        -> Result<(), RemoteError>;

    async fn update(&self, collection: &str, payload: &Value, op_id: &str)
        -> Result<(), RemoteError>;

    async fn delete(&self, collection: &str, id: &str, op_id: &str) -> Result<(), RemoteError>;

    /// Replay one pending operation, picking the call by its kind.
    async fn apply(&self, op: &PendingOperation) -> Result<(), RemoteError> {
        match op.kind {
            OpKind::Insert => self.insert(&op.collection, &op.payload, &op.id).await,
            OpKind::Update => self.update(&op.collection, &op.payload, &op.id).await,
            OpKind::Delete => self.delete(&op.collection, &op.record_id, &op.id).await,
        }
    }
}

/// REST implementation of [`RemoteRecordService`].
///
/// - insert: `POST {base}/{collection}` with the record as JSON body
/// - update: `PUT {base}/{collection}/{id}` with the record as JSON body
/// - delete: `DELETE {base}/{collection}/{id}`; a 404 counts as done
#[derive(Debug, Clone)]
pub struct HttpRecordService {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpRecordService {
    /// Create a service for `base_url`. `timeout` bounds each request.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    /// Build from configuration.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let base_url = config
            .remote_url
            .as_deref()
            .ok_or_else(|| RemoteError::InvalidUrl("no remote URL configured".into()))?;
        Self::new(
            base_url,
            config.auth_token.clone(),
            Duration::from_secs(config.remote_timeout_secs),
        )
    }

    /// `{base}/{collection}[/{id}]`, with each segment percent-encoded.
    pub fn url(&self, collection: &str, id: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, op_id: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(IDEMPOTENCY_HEADER, op_id);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn send(builder: RequestBuilder, allow_not_found: bool) -> Result<(), RemoteError> {
    let response = builder.send().await?;
    let status = response.status();

    if status.is_success() || (allow_not_found && status == StatusCode::NOT_FOUND) {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteRecordService for HttpRecordService {
    async fn insert(
        &self,
        collection: &str,
        payload: &Value,
        op_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.url(collection, None)?;
        tracing::debug!(%url, op_id, "POST record");
        send(self.request(Method::POST, url, op_id).json(payload), false).await
    }

    async fn update(
        &self,
        collection: &str,
        payload: &Value,
        op_id: &str,
    ) -> Result<(), RemoteError> {
        let id = harbor_engine::extract_id(payload)
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let url = self.url(collection, Some(&id))?;
        tracing::debug!(%url, op_id, "PUT record");
        send(self.request(Method::PUT, url, op_id).json(payload), false).await
    }

    async fn delete(&self, collection: &str, id: &str, op_id: &str) -> Result<(), RemoteError> {
        let url = self.url(collection, Some(id))?;
        tracing::debug!(%url, op_id, "DELETE record");
        send(self.request(Method::DELETE, url, op_id), true).await
    }
}

//! REST API access
//!
//! Thin client over `/v1`: `find` posts a [`Request`], `last` fetches the
//! newest record. Every call runs under the configured retry strategy;
//! a non-200 status is as retryable as a transport failure.

use dkll_core::{LogEntry, Request};
use reqwest::StatusCode;
use tracing::debug;

use crate::retry::FixedDelay;

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http code {0}")]
    Status(StatusCode),

    #[error("bad response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Access to the dkll REST API.
pub struct ApiClient {
    http: reqwest::Client,
    /// Base endpoint including the version prefix, e.g. `http://host:8080/v1`.
    base: String,
    strategy: FixedDelay,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, strategy: FixedDelay) -> ApiClient {
        ApiClient {
            http: reqwest::Client::new(),
            base: base.into(),
            strategy,
        }
    }

    /// Newest record, for seeding tail mode.
    pub async fn last(&self) -> Result<LogEntry, ClientError> {
        self.strategy
            .run(|| async move {
                let resp = self.http.get(format!("{}/last", self.base)).send().await?;
                if resp.status() != StatusCode::OK {
                    return Err(ClientError::Status(resp.status()));
                }
                let body = resp.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            })
            .await
    }

    /// One page matching the request; an empty body counts as an empty
    /// page, not an error.
    pub async fn find(&self, request: &Request) -> Result<Vec<LogEntry>, ClientError> {
        self.strategy
            .run(|| async move {
                let resp = self
                    .http
                    .post(format!("{}/find", self.base))
                    .json(request)
                    .send()
                    .await?;
                if resp.status() != StatusCode::OK {
                    debug!(status = %resp.status(), "find rejected");
                    return Err(ClientError::Status(resp.status()));
                }
                let body = resp.bytes().await?;
                if body.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(serde_json::from_slice(&body)?)
            })
            .await
    }
}

//! HTTP GET capability
//!
//! Used by REST driver status polling and YARN driver log retrieval. The
//! trait keeps both paths testable without a cluster; production code uses
//! [`ReqwestHttpClient`].

pub mod mock;

pub use mock::MockHttpClient;

use crate::error::{ErrorCode, HookError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<HttpError> for HookError {
    fn from(err: HttpError) -> Self {
        let (code, url) = match &err {
            HttpError::Transport { url, .. } | HttpError::Timeout { url } => {
                (ErrorCode::HTTP_TRANSPORT, Some(url.clone()))
            }
            HttpError::Client(_) => (ErrorCode::HTTP_GENERIC, None),
        };
        HookError::http_with_code(code, err.to_string(), url).with_source(err)
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HookError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;
}

pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        tracing::debug!("GET {}", url);

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                HttpError::Timeout {
                    url: url.to_string(),
                }
            } else {
                HttpError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_err)?;

        tracing::trace!("GET {} returned {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}

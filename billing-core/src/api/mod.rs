//! Typed clients for the remote services the console sits on top of.
//!
//! Every service is an opaque JSON-over-HTTP API; responses are read as text
//! first so that error bodies can be classified by the caller.

pub mod billing;
pub mod catalog;
pub mod receivables;
pub mod security;


use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

pub use billing::BillingClient;
pub use catalog::CatalogClient;
pub use receivables::ReceivablesClient;
pub use security::{LoginResponse, SecurityClient};

/// Failure talking to a remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    /// Response body of a non-success status, if that is what failed.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Builds the HTTP client shared by all service clients.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// JSON client bound to one service's base URL.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let text = self.send(Method::GET, &url, self.http.get(&url)).await?;
        decode(&url, &text)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let text = self.send(Method::POST, &url, self.http.post(&url).json(body)).await?;
        decode(&url, &text)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let text = self.send(Method::PUT, &url, self.http.put(&url).json(body)).await?;
        decode(&url, &text)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send(Method::DELETE, &url, self.http.delete(&url)).await?;
        Ok(())
    }

    /// Sends the request and returns the body text of a 2xx response.
    async fn send(&self, method: Method, url: &str, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| {
            error!("Failed to send {} request to {}: {}", method, url, e);
            ApiError::Transport {
                url: url.to_string(),
                source: e,
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        if !status.is_success() {
            warn!("API error ({}) on {} {}: {}", status.as_u16(), method, url, body);
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Decodes a response body; an empty body decodes as JSON `null`.
fn decode<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

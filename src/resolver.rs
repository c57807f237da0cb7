use crate::http::build_client;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
}

/// Expands a (possibly shortened) link to the URL it finally lands on.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<String, ResolveError>;
}

#[derive(Debug, Clone)]
pub struct HttpResolver {
    http: Client,
}

impl HttpResolver {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        Self {
            http: build_client(timeout, user_agent),
        }
    }
}

#[async_trait]
impl LinkResolver for HttpResolver {
    async fn resolve(&self, url: &str) -> Result<String, ResolveError> {
        let response = self.http.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                ResolveError::Timeout
            } else {
                ResolveError::Request(err.to_string())
            }
        })?;
        Ok(response.url().to_string())
    }
}

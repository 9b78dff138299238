use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::config::Config;
use crate::error::{AppError, Result};

/// A successful subscription response: headers plus a non-blank body.
#[derive(Debug, Clone)]
pub struct FetchedSubscription {
    pub headers: HeaderMap,
    pub body: String,
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_subscription(&self, url: &str) -> Result<FetchedSubscription>;
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.user_agent, config.fetch_timeout())
    }

    async fn send(&self, url: &str) -> Result<FetchedSubscription> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network {
                status: status.as_u16(),
            });
        }

        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(FetchedSubscription { headers, body })
    }

    fn timeout_error(&self) -> AppError {
        AppError::Timeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_subscription(&self, url: &str) -> Result<FetchedSubscription> {
        // The deadline covers connect, headers and body.
        let fetched = match tokio::time::timeout(self.timeout, self.send(url)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(AppError::Http(e))) if e.is_timeout() => return Err(self.timeout_error()),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(self.timeout_error()),
        };

        if fetched.body.trim().is_empty() {
            return Err(AppError::EmptyContent);
        }

        tracing::debug!("Fetched {} bytes from {}", fetched.body.len(), url);
        Ok(fetched)
    }
}

//! HTTP implementation of the remote store, talking to `lumina-server`.

use super::RemoteStore;
use crate::config::SyncConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use lumina_engine::RemoteRecord;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from the initial delay.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Remote store served over HTTP under `<base>/profiles`.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpRemoteStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, RemoteError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            retry,
        })
    }

    /// The configured store, or `None` when no remote URL is set.
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>, RemoteError> {
        let Some(url) = &config.remote_url else {
            return Ok(None);
        };
        let retry = RetryPolicy {
            attempts: config.retry_attempts.max(1),
            ..RetryPolicy::default()
        };
        Self::new(url, config.remote_key.clone(), config.http_timeout, retry).map(Some)
    }

    fn profiles_url(&self, id: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("profiles");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Send a request, retrying transient failures with backoff. Any
    /// non-success status becomes `RemoteError::Status`.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, RemoteError> {
        let mut attempt = 1;
        loop {
            let outcome = match self.authorize(build()).send().await {
                Ok(response) => check_status(response).await,
                Err(e) => Err(RemoteError::from(e)),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(error = %e, attempt, ?delay, "remote request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError> {
        let url = self.profiles_url(Some(&record.id))?;
        self.send(|| self.client.put(url.clone()).json(record)).await?;
        debug!(id = %record.id, "pushed profile");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        let url = self.profiles_url(Some(id))?;
        match self.send(|| self.client.get(url.clone())).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(RemoteError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_by_pin(&self, pin: &str) -> Result<Vec<RemoteRecord>, RemoteError> {
        let url = self.profiles_url(None)?;
        let response = self
            .send(|| self.client.get(url.clone()).query(&[("pin", pin)]))
            .await?;
        Ok(response.json().await?)
    }

    async fn get_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        let url = self.profiles_url(None)?;
        let response = self.send(|| self.client.get(url.clone())).await?;
        let records: Vec<RemoteRecord> = response.json().await?;
        debug!(count = records.len(), "fetched remote profiles");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpRemoteStore {
        HttpRemoteStore::new(base, None, Duration::from_secs(1), RetryPolicy::default()).unwrap()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
        assert_eq!(policy.delay_after(3), Duration::from_secs(1));
        assert_eq!(policy.delay_after(4), Duration::from_secs(2));
        assert_eq!(policy.delay_after(40), Duration::from_secs(2));
    }

    #[test]
    fn profile_urls() {
        let plain = store("https://sync.example.com");
        assert_eq!(
            plain.profiles_url(None).unwrap().as_str(),
            "https://sync.example.com/profiles"
        );

        let nested = store("https://example.com/api/");
        assert_eq!(
            nested.profiles_url(Some("ada")).unwrap().as_str(),
            "https://example.com/api/profiles/ada"
        );
        // ids are path segments, not paths
        assert_eq!(
            nested.profiles_url(Some("a/b c")).unwrap().as_str(),
            "https://example.com/api/profiles/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        let err = HttpRemoteStore::new(
            "not a url",
            None,
            Duration::from_secs(1),
            RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidUrl(_)));
    }

    #[test]
    fn from_config_is_none_offline() {
        assert!(HttpRemoteStore::from_config(&SyncConfig::default())
            .unwrap()
            .is_none());
    }
}

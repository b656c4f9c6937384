//! HTTP transport used for every portal request.
//!
//! [`Transport`] is the seam the keepalive, poller and identity lookup talk
//! through. [`ReqwestTransport`] attaches the stored session cookies, merges
//! rotated `Set-Cookie` values back into the credential store and absorbs
//! connection-level failures with a small fixed-delay retry.

use std::sync::Arc;
use std::time::Duration;

use datawatch_core::credentials::CredentialStore;
use datawatch_core::error::CoreError;
use reqwest::header::{COOKIE, SET_COOKIE};

/// Default number of attempts per request.
const DEFAULT_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Status code and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be built or a request could not be formed.
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),

    /// Every attempt failed before a response arrived.
    #[error("Request to {url} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error(transparent)]
    Credentials(#[from] CoreError),
}

/// Performs authenticated GET requests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Fixed-delay retry applied to connection-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// [`Transport`] over `reqwest`, authenticated from a [`CredentialStore`].
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            retry: RetryPolicy {
                attempts: retry.attempts.max(1),
                ..retry
            },
        })
    }

    /// Issue one request and read the whole body.
    async fn send_once(&self, url: &str) -> Result<(HttpResponse, Vec<String>), reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(header) = self.cookie_header().await {
            request = request.header(COOKIE, header);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response.text().await?;

        Ok((HttpResponse { status, body }, set_cookies))
    }

    async fn cookie_header(&self) -> Option<String> {
        match self.credentials.get().await {
            Ok(credentials) => credentials.and_then(|c| c.cookie_header()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read credentials, sending without cookies");
                None
            }
        }
    }

    /// Merge rotated cookies into the stored jar.
    ///
    /// Only an existing jar is updated so a late response cannot recreate
    /// credentials that a logout already cleared.
    async fn store_cookies(&self, set_cookies: &[String]) -> Result<(), TransportError> {
        if set_cookies.is_empty() {
            return Ok(());
        }
        let Some(mut credentials) = self.credentials.get().await? else {
            return Ok(());
        };

        let mut changed = false;
        for header in set_cookies {
            changed |= credentials.apply_set_cookie(header);
        }
        if changed {
            tracing::debug!(count = set_cookies.len(), "Storing rotated session cookies");
            self.credentials.set(&credentials).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(url).await {
                Ok((response, set_cookies)) => {
                    tracing::debug!(url, status = response.status, "GET completed");
                    if let Err(e) = self.store_cookies(&set_cookies).await {
                        tracing::warn!(error = %e, "Failed to store rotated cookies");
                    }
                    return Ok(response);
                }
                Err(e) if attempt < self.retry.attempts => {
                    tracing::warn!(
                        url,
                        attempt,
                        error = %e,
                        "GET failed, retrying in {}s",
                        self.retry.delay.as_secs(),
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    tracing::error!(url, attempt, error = %e, "GET failed, giving up");
                    return Err(TransportError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use datawatch_core::credentials::{Credentials, MemoryCredentialStore};

    use super::*;

    fn transport(store: Arc<MemoryCredentialStore>, retry: RetryPolicy) -> ReqwestTransport {
        ReqwestTransport::new(store, Duration::from_secs(1), retry).unwrap()
    }

    #[test]
    fn response_ok_only_for_200() {
        assert!(HttpResponse::new(200, "").is_ok());
        assert!(!HttpResponse::new(204, "").is_ok());
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let t = transport(
            Arc::new(MemoryCredentialStore::default()),
            RetryPolicy { attempts: 0, delay: Duration::ZERO },
        );
        assert_eq!(t.retry.attempts, 1);
    }

    #[tokio::test]
    async fn rotated_cookies_update_existing_jar() {
        let store = Arc::new(MemoryCredentialStore::new(Some(Credentials::from_jwt("old"))));
        let t = transport(store.clone(), RetryPolicy::default());

        t.store_cookies(&["JWTTOKEN=new; Path=/; HttpOnly".to_string()])
            .await
            .unwrap();

        assert_eq!(store.get().await.unwrap().unwrap().jwt(), Some("new"));
    }

    #[tokio::test]
    async fn rotated_cookies_do_not_recreate_cleared_jar() {
        let store = Arc::new(MemoryCredentialStore::default());
        let t = transport(store.clone(), RetryPolicy::default());

        t.store_cookies(&["JWTTOKEN=new".to_string()]).await.unwrap();

        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries() {
        let t = transport(
            Arc::new(MemoryCredentialStore::default()),
            RetryPolicy { attempts: 2, delay: Duration::from_millis(10) },
        );

        // Port 9 on localhost (discard) is closed on test machines.
        let err = t.get("http://127.0.0.1:9/renew").await.unwrap_err();
        match err {
            TransportError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}

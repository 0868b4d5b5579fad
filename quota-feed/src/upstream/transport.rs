use crate::error::UpstreamError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Bound on every upstream call; a timeout surfaces as [`UpstreamError::Transport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw HTTP response handed back to the [`UpstreamClient`](super::UpstreamClient).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP GET against the upstream.
///
/// Implementations must not retry: the scheduler's next tick is the only retry mechanism.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn get(&self, url: Url) -> Result<TransportResponse, UpstreamError>;
}

#[async_trait]
impl<T> UpstreamTransport for std::sync::Arc<T>
where
    T: UpstreamTransport + ?Sized,
{
    async fn get(&self, url: Url) -> Result<TransportResponse, UpstreamError> {
        (**self).get(url).await
    }
}

/// [`UpstreamTransport`] backed by a [`reqwest::Client`] with a bounded timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<TransportResponse, UpstreamError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

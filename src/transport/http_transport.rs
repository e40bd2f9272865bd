use std::time::Duration;

use futures_util::StreamExt;

use crate::config::{ServerConfig, UpstreamConfig};

use super::{TransportError, UpstreamEnvelope, UpstreamRequest, UpstreamTransport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|err| TransportError::Connect(format!("Failed to build HTTP client: {err}")))
}

/// Streaming reqwest client bound to the configured Responses endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the endpoint URL does not parse.
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Result<Self, TransportError> {
        let url = url::Url::parse(&upstream.responses_url).map_err(|err| {
            TransportError::Connect(format!(
                "Invalid upstream URL '{}': {err}",
                upstream.responses_url
            ))
        })?;

        let pool_idle_timeout = if server.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(server.http_pool_idle_timeout_secs))
        };
        let client = match build_reqwest_client(
            server.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            Duration::from_secs(server.timeout),
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            }
        };
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl UpstreamTransport for HttpTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamEnvelope, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| TransportError::Body(err.to_string())));
        Ok(UpstreamEnvelope {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

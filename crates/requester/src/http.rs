//! reqwest-backed requester

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::{ApiRequest, ApiResponse, Method, Requester};

/// Sends `ApiRequest`s over HTTPS with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: reqwest::Client,
}

impl HttpRequester {
    /// Build a client with a per-request timeout and an optional HTTPS proxy.
    pub fn new(timeout: Duration, https_proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy) = https_proxy.filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::https(proxy)
                .map_err(|e| Error::Transport(format!("invalid https proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            Error::Transport(format!("{} {} failed: {e}", request.method, request.url))
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            Error::Transport(format!("reading body of {} {}: {e}", request.method, request.url))
        })?;

        debug!(method = %request.method, url = %request.url, status, bytes = body.len(), "response received");
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

impl Requester for HttpRequester {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_proxy_is_ignored() {
        let result = HttpRequester::new(Duration::from_secs(5), Some("  "));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let requester = HttpRequester::new(Duration::from_secs(2), None).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let request = ApiRequest::get("http://127.0.0.1:9/allocations");
        let err = requester.send(&request).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
    }
}

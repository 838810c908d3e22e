//! Data source seam.
//!
//! The engine only ever asks for `(status, body)` of one endpoint; status
//! interpretation lives in [`crate::wire`]. Transport retries are not done
//! here: the next poll tick is the retry.

use crate::config::ApiConf;
use crate::error::{SourceError, SyncError};
use crate::wire::{Endpoint, RawResponse};
use reqwest::header::ACCEPT;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remote, authoritative source of colony telemetry.
pub trait DataSource: Send + Sync + 'static {
    fn fetch(&self, endpoint: &Endpoint) -> impl Future<Output = Result<RawResponse, SourceError>> + Send;
}

/// Returns the current session token, if any. Called once per request so a
/// refreshed token is picked up without rebuilding the source.
pub type TokenAccessor = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    token: TokenAccessor,
}

impl HttpDataSource {
    pub fn new(
        api: &ApiConf,
        token: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(api.request_timeout_ms))
            .user_agent(concat!("apiary-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim().trim_end_matches('/').to_string(),
            token: Arc::new(token),
        })
    }

    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl DataSource for HttpDataSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<RawResponse, SourceError> {
        let mut request = self.client.get(self.url(endpoint)).header(ACCEPT, "application/json");
        if let Some(token) = (self.token)() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::transport(endpoint.to_string(), e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::transport(endpoint.to_string(), e))?;

        debug!("{} -> {} ({} bytes)", endpoint, status, body.len());
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let api = ApiConf { base_url: "http://localhost:3000/api/".into(), request_timeout_ms: 500 };
        let source = HttpDataSource::new(&api, || None).unwrap();
        assert_eq!(source.url(&Endpoint::Colony("9".into())), "http://localhost:3000/api/colonies/9");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) is closed on test machines.
        let api = ApiConf { base_url: "http://127.0.0.1:9".into(), request_timeout_ms: 500 };
        let source = HttpDataSource::new(&api, || Some("t0k3n".into())).unwrap();
        let err = source.fetch(&Endpoint::Colonies).await.unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }));
        assert!(err.is_transient());
    }
}

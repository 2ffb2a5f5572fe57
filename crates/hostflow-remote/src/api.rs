use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use hostflow_core::error::{HostflowError, Result};

/// Response envelope used by every host-management endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub status: String,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Split into data or the service's error message.
    pub fn into_result(self) -> std::result::Result<Option<T>, String> {
        if self.status == "success" {
            Ok(self.data)
        } else {
            Err(self
                .message
                .unwrap_or_else(|| format!("service reported status \"{}\"", self.status)))
        }
    }
}

/// Thin client for the host-management service.
#[derive(Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| HostflowError::Config(format!("invalid base_url \"{}\": {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(HostflowError::Config(format!(
                "base_url \"{}\" cannot carry a path",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("hostflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostflowError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            timeout_secs,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Endpoint URL built from path segments; each segment is percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and unwrap the service envelope.
    ///
    /// Transport failures, timeouts, and `status: "error"` bodies all become
    /// errors. The HTTP status code is only consulted when the body is not an
    /// envelope.
    pub async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        let response = request.send().await.map_err(|e| self.transport_error(action, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(action, e))?;
        debug!(action, status = status.as_u16(), bytes = body.len(), "Service responded");

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) => envelope.into_result().map_err(HostflowError::Gateway),
            Err(_) if !status.is_success() => Err(HostflowError::Http(format!(
                "{} failed: HTTP {} {}",
                action,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ))),
            Err(e) => Err(HostflowError::Http(format!(
                "{} returned an unexpected body: {}",
                action, e
            ))),
        }
    }

    fn transport_error(&self, action: &str, e: reqwest::Error) -> HostflowError {
        if e.is_timeout() {
            HostflowError::GatewayTimeout {
                action: action.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            HostflowError::Http(format!("{} failed: {}", action, e))
        }
    }
}

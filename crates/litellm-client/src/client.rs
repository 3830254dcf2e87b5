//! # Gateway Client
//!
//! Thin JSON-over-HTTP layer with bearer authentication. The per-kind APIs
//! ([`users`](crate::users), [`teams`](crate::teams), [`keys`](crate::keys),
//! [`members`](crate::members), [`models`](crate::models)) are built on the
//! request helpers here.
//!
//! ## Request Flow
//! ```text
//! teams().get("t-1")
//!     │
//!     ▼
//! GET {endpoint}/team/info?team_id=t-1
//! Authorization: Bearer <master key>
//!     │
//!     ├── 2xx       → decode JSON into the typed response
//!     ├── non-2xx   → GatewayError::from_response (normalized body)
//!     └── I/O       → Transport / Timeout
//! ```

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use litellm_core::Sensitive;

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP settings shared by every client of one controller.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline of each individual request.
    pub timeout: Duration,
    /// Verify the gateway's TLS certificate.
    pub tls_verify: bool,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: DEFAULT_TIMEOUT,
            tls_verify: true,
            user_agent: concat!("litellm-operator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Client for one gateway endpoint and master credential.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    master_key: Sensitive,
    http: Client,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Creates a client.
    ///
    /// ## Errors
    /// - `InvalidEndpoint` if `endpoint` is not an absolute http(s) URL
    pub fn new(endpoint: &str, master_key: Sensitive, options: &ClientOptions) -> GatewayResult<Self> {
        let url = Url::parse(endpoint.trim())
            .map_err(|_| GatewayError::InvalidEndpoint(endpoint.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(GatewayError::InvalidEndpoint(endpoint.to_string()));
        }

        let http = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.tls_verify)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(GatewayClient {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            master_key,
            http,
        })
    }

    /// Returns the normalized endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Request Helpers
    // =========================================================================

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(self.master_key.expose())
    }

    /// `GET path?query`, decoding the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<T> {
        let builder = self.request(Method::GET, path).query(query);
        self.send(Method::GET, path, builder).await
    }

    /// `POST path` with a JSON body, decoding the JSON response.
    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path).json(body);
        self.send(Method::POST, path, builder).await
    }

    /// `POST path` with a JSON body, ignoring the response body.
    pub(crate) async fn post_unit<B>(&self, path: &str, body: &B) -> GatewayResult<()>
    where
        B: Serialize + ?Sized,
    {
        let _: Value = self.post_json(path, body).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> GatewayResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(%method, path, status = status.as_u16(), "gateway call");

        if !status.is_success() {
            let err = GatewayError::from_response(status.as_u16(), &body);
            if matches!(err, GatewayError::Opaque { .. }) {
                warn!(%method, path, status = status.as_u16(), "unrecognized gateway error body");
            }
            return Err(err);
        }

        // Some endpoints answer 200 with an empty body.
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| GatewayError::Decode(format!("{} {}: {}", method, path, e)))
    }
}

/// Maps a not-found error to `Ok(None)`.
pub(crate) fn found<T>(result: GatewayResult<T>) -> GatewayResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Maps a not-found error to success, for deletes.
pub(crate) fn gone(result: GatewayResult<()>) -> GatewayResult<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_validation() {
        let key = Sensitive::new("sk-master");
        let options = ClientOptions::default();

        let client = GatewayClient::new("http://gw.ml.svc:4000/", key.clone(), &options).unwrap();
        assert_eq!(client.base_url(), "http://gw.ml.svc:4000");

        assert!(GatewayClient::new("gw:4000", key.clone(), &options).is_err());
        assert!(GatewayClient::new("ftp://gw", key.clone(), &options).is_err());
        assert!(GatewayClient::new("", key, &options).is_err());
    }

    #[test]
    fn test_debug_hides_master_key() {
        let client = GatewayClient::new(
            "https://gw.example.com",
            Sensitive::new("sk-master"),
            &ClientOptions::default(),
        )
        .unwrap();
        assert!(!format!("{:?}", client).contains("sk-master"));
    }

    #[test]
    fn test_found_and_gone() {
        let nf = GatewayError::from_response(404, "{}");
        assert_eq!(found::<u8>(Err(nf.clone())).unwrap(), None);
        assert!(gone(Err(nf)).is_ok());

        let boom = GatewayError::from_response(500, "{}");
        assert!(found::<u8>(Err(boom.clone())).is_err());
        assert!(gone(Err(boom)).is_err());
    }
}

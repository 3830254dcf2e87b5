//! # Connection Resolver
//!
//! Turns a record's connection reference into a gateway endpoint and master
//! credential, and caches one [`GatewayClient`] per reference.
//!
//! ## Resolution
//! ```text
//! secretRef { name: "gw", keys: { masterKey: "token" } }
//!     secret ml/gw ── "token" ──► master key
//!                  └─ "url"   ──► endpoint
//!
//! instanceRef { name: "prod" }
//!     record  LiteLLMInstance ml/prod   must exist
//!     secret  ml/prod-secrets ── "masterkey" ──► master key
//!     address http://prod-service.ml.svc.cluster.local:4000
//! ```
//!
//! A missing secret, missing key, missing instance or unusable endpoint is a
//! [`ReconcileError::Connection`].
//!
//! ## Cache
//! The cache is keyed by the resolved [`ConnectionSource`]. Entries are only
//! dropped when the gateway rejects the credential, so a rotated master key
//! is picked up on the next pass.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::InstanceSettings;
use crate::error::{ReconcileError, ReconcileResult};
use litellm_client::{ClientOptions, GatewayClient};
use litellm_core::types::INSTANCE;
use litellm_core::{ConnectionSource, ObjectKey, Sensitive};
use litellm_plane::ControlPlane;

// =============================================================================
// Connection Details
// =============================================================================

/// A resolved gateway endpoint and master credential.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub endpoint: String,
    pub master_key: Sensitive,
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("endpoint", &self.endpoint)
            .field("master_key", &self.master_key)
            .finish()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves connection sources through the control plane.
pub struct ConnectionResolver {
    plane: Arc<dyn ControlPlane>,
    instances: InstanceSettings,
    options: ClientOptions,
}

impl ConnectionResolver {
    pub fn new(plane: Arc<dyn ControlPlane>, instances: InstanceSettings, options: ClientOptions) -> Self {
        ConnectionResolver {
            plane,
            instances,
            options,
        }
    }

    /// Resolves endpoint and master key.
    pub async fn resolve(&self, source: &ConnectionSource) -> ReconcileResult<ConnectionDetails> {
        match source {
            ConnectionSource::Secret {
                namespace,
                name,
                master_key_field,
                url_field,
            } => {
                let key = ObjectKey::new(namespace, name);
                let master_key = self.secret_value(&key, master_key_field).await?;
                let endpoint = self.secret_value(&key, url_field).await?;
                Ok(ConnectionDetails {
                    endpoint: endpoint.expose().trim().to_string(),
                    master_key,
                })
            }
            ConnectionSource::Instance { namespace, name } => {
                let instance = ObjectKey::new(namespace, name);
                if self.plane.get(INSTANCE, &instance).await?.is_none() {
                    return Err(ReconcileError::Connection(format!(
                        "{} {} not found",
                        INSTANCE.kind, instance
                    )));
                }

                let secret = ObjectKey::new(namespace, self.instances.secret_name(name));
                let master_key = self
                    .secret_value(&secret, &self.instances.master_key_field)
                    .await?;
                Ok(ConnectionDetails {
                    endpoint: self.instances.endpoint(namespace, name),
                    master_key,
                })
            }
        }
    }

    /// Resolves and builds a client.
    pub async fn client(&self, source: &ConnectionSource) -> ReconcileResult<GatewayClient> {
        let details = self.resolve(source).await?;
        GatewayClient::new(&details.endpoint, details.master_key, &self.options)
            .map_err(|e| ReconcileError::Connection(format!("{}: {}", source, e)))
    }

    async fn secret_value(&self, key: &ObjectKey, field: &str) -> ReconcileResult<Sensitive> {
        let secret = self
            .plane
            .get_secret(key)
            .await?
            .ok_or_else(|| ReconcileError::Connection(format!("secret {} not found", key)))?;

        secret
            .value(field)
            .filter(|v| !v.expose().trim().is_empty())
            .cloned()
            .ok_or_else(|| {
                ReconcileError::Connection(format!("secret {} has no key '{}'", key, field))
            })
    }
}

// =============================================================================
// Connection Cache
// =============================================================================

/// Per-kind cache of gateway clients.
#[derive(Default)]
pub struct ConnectionCache {
    clients: DashMap<ConnectionSource, GatewayClient>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached client for `source`, resolving it on a miss.
    pub async fn client(
        &self,
        resolver: &ConnectionResolver,
        source: &ConnectionSource,
    ) -> ReconcileResult<GatewayClient> {
        if let Some(client) = self.clients.get(source) {
            return Ok(client.value().clone());
        }

        let client = resolver.client(source).await?;
        debug!(%source, endpoint = client.base_url(), "Resolved gateway connection");
        self.clients.insert(source.clone(), client.clone());
        Ok(client)
    }

    /// Drops the entry for `source`.
    pub fn invalidate(&self, source: &ConnectionSource) {
        if self.clients.remove(source).is_some() {
            info!(%source, "Dropped cached gateway connection after credential rejection");
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use litellm_plane::MemoryControlPlane;
    use serde_json::json;

    fn secret_source(name: &str) -> ConnectionSource {
        ConnectionSource::Secret {
            namespace: "ml".to_string(),
            name: name.to_string(),
            master_key_field: "masterkey".to_string(),
            url_field: "url".to_string(),
        }
    }

    fn resolver(plane: &MemoryControlPlane) -> ConnectionResolver {
        ConnectionResolver::new(
            Arc::new(plane.clone()),
            InstanceSettings::default(),
            ClientOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_secret_pointer() {
        let plane = MemoryControlPlane::new();
        plane
            .put_secret("ml", "gw", &[("masterkey", "sk-master"), ("url", "http://gw:4000")])
            .await;

        let details = resolver(&plane).resolve(&secret_source("gw")).await.unwrap();
        assert_eq!(details.endpoint, "http://gw:4000");
        assert_eq!(details.master_key.expose(), "sk-master");
        assert!(!format!("{:?}", details).contains("sk-master"));
    }

    #[tokio::test]
    async fn test_missing_secret_and_key() {
        let plane = MemoryControlPlane::new();
        let err = resolver(&plane).resolve(&secret_source("gw")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Connection(_)));

        plane.put_secret("ml", "gw", &[("url", "http://gw:4000")]).await;
        let err = resolver(&plane).resolve(&secret_source("gw")).await.unwrap_err();
        assert!(err.to_string().contains("masterkey"));
    }

    #[tokio::test]
    async fn test_instance_pointer() {
        let plane = MemoryControlPlane::new();
        let source = ConnectionSource::Instance {
            namespace: "ml".to_string(),
            name: "prod".to_string(),
        };

        plane.put_secret("ml", "prod-secrets", &[("masterkey", "sk-1")]).await;
        let err = resolver(&plane).resolve(&source).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        plane.apply(INSTANCE, "ml", "prod", json!({})).await;
        let details = resolver(&plane).resolve(&source).await.unwrap();
        assert_eq!(details.endpoint, "http://prod-service.ml.svc.cluster.local:4000");
    }

    #[tokio::test]
    async fn test_cache_and_invalidate() {
        let plane = MemoryControlPlane::new();
        plane
            .put_secret("ml", "gw", &[("masterkey", "sk"), ("url", "http://gw:4000")])
            .await;
        let resolver = resolver(&plane);
        let cache = ConnectionCache::new();
        let source = secret_source("gw");

        cache.client(&resolver, &source).await.unwrap();
        plane.delete_secret(&ObjectKey::new("ml", "gw")).await;

        // Served from cache although the secret is gone.
        assert!(cache.client(&resolver, &source).await.is_ok());
        assert_eq!(cache.len(), 1);

        cache.invalidate(&source);
        assert!(cache.is_empty());
        assert!(cache.client(&resolver, &source).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_endpoint() {
        let plane = MemoryControlPlane::new();
        plane
            .put_secret("ml", "gw", &[("masterkey", "sk"), ("url", "not a url")])
            .await;
        let err = resolver(&plane).client(&secret_source("gw")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Connection(_)));
    }
}

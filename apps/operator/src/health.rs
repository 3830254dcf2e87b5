//! # Health Endpoints
//!
//! - `GET /healthz` answers 200 while the process runs.
//! - `GET /readyz` answers 200 once every watched kind finished its initial
//!   list, 503 before. The body reports per-kind dispatcher counters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use litellm_core::ResourceKind;
use litellm_reconcile::DispatcherHandle;

/// Readiness shared between watchers and the health server.
#[derive(Clone, Default)]
pub struct HealthState {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    synced: BTreeMap<&'static str, bool>,
    dispatchers: Vec<DispatcherHandle>,
}

#[derive(Debug, Serialize)]
struct KindReport {
    synced: bool,
    running: usize,
    queued: usize,
    succeeded: u64,
    failed: u64,
}

#[derive(Debug, Serialize)]
struct ReadyReport {
    ready: bool,
    kinds: BTreeMap<&'static str, KindReport>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind as watched but not yet listed.
    pub async fn register(&self, dispatcher: DispatcherHandle) {
        let mut inner = self.inner.write().await;
        inner.synced.insert(dispatcher.kind().kind, false);
        inner.dispatchers.push(dispatcher);
    }

    pub async fn mark_synced(&self, kind: ResourceKind) {
        self.inner.write().await.synced.insert(kind.kind, true);
    }

    pub async fn is_ready(&self) -> bool {
        let inner = self.inner.read().await;
        !inner.synced.is_empty() && inner.synced.values().all(|s| *s)
    }

    async fn report(&self) -> ReadyReport {
        let inner = self.inner.read().await;
        let mut kinds = BTreeMap::new();
        for handle in &inner.dispatchers {
            let kind = handle.kind().kind;
            let stats = handle.stats().await;
            kinds.insert(
                kind,
                KindReport {
                    synced: inner.synced.get(kind).copied().unwrap_or(false),
                    running: stats.running,
                    queued: stats.queued,
                    succeeded: stats.succeeded,
                    failed: stats.failed,
                },
            );
        }
        let ready = !inner.synced.is_empty() && inner.synced.values().all(|s| *s);
        ReadyReport { ready, kinds }
    }
}

/// Builds the health router.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    let report = state.report().await;
    let code = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use litellm_core::types::{MODEL, TEAM};
    use litellm_core::ObjectKey;
    use litellm_reconcile::{
        ConnectionCache, DispatchConfig, Dispatcher, PassOutcome, ReconcileResult, Reconciler,
    };

    struct Idle(ResourceKind);

    #[async_trait]
    impl Reconciler for Idle {
        fn kind(&self) -> ResourceKind {
            self.0
        }

        async fn reconcile(&self, _key: &ObjectKey, _cache: &ConnectionCache) -> ReconcileResult<PassOutcome> {
            Ok(PassOutcome::Synced)
        }
    }

    fn handle(kind: ResourceKind) -> DispatcherHandle {
        let (_dispatcher, handle) = Dispatcher::new(Arc::new(Idle(kind)), DispatchConfig::default());
        handle
    }

    #[tokio::test]
    async fn test_ready_after_every_kind_listed() {
        let state = HealthState::new();
        assert!(!state.is_ready().await);

        state.register(handle(TEAM)).await;
        state.register(handle(MODEL)).await;
        assert!(!state.is_ready().await);

        state.mark_synced(TEAM).await;
        assert!(!state.is_ready().await);

        state.mark_synced(MODEL).await;
        assert!(state.is_ready().await);

        let report = state.report().await;
        assert!(report.ready);
        assert!(report.kinds["Team"].synced);
    }
}

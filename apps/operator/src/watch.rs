//! # Record Watchers
//!
//! One watch stream per reconciled kind feeds the kind's dispatcher.
//!
//! ```text
//! watch event                          action
//! ──────────────────────────────────   ──────────────────────────────
//! first sight (initial list or new)    enqueue
//! generation changed                   enqueue
//! deletion requested                   enqueue
//! status-only / metadata-only change   ignored (own writes)
//! object removed                       enqueue (pass reports Gone)
//! initial list complete                mark kind synced
//! ```
//!
//! Status writes made by the operator bump `resourceVersion` but not
//! `generation`, so they do not re-trigger a pass.

use futures_util::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Client;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::health::HealthState;
use crate::kube_plane::api_resource;
use litellm_core::{ObjectKey, ResourceKind};
use litellm_reconcile::DispatcherHandle;

/// What the watcher last saw of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seen {
    generation: i64,
    deleting: bool,
}

impl Seen {
    fn of(object: &DynamicObject) -> Self {
        Seen {
            generation: object.metadata.generation.unwrap_or_default(),
            deleting: object.metadata.deletion_timestamp.is_some(),
        }
    }
}

fn key_of(object: &DynamicObject) -> Option<ObjectKey> {
    Some(ObjectKey::new(
        object.metadata.namespace.clone()?,
        object.metadata.name.clone()?,
    ))
}

/// Decides which events lead to a pass.
#[derive(Debug, Default)]
struct Filter {
    seen: HashMap<ObjectKey, Seen>,
}

impl Filter {
    /// Returns true if the applied object needs a pass.
    fn applied(&mut self, key: &ObjectKey, now: Seen) -> bool {
        self.seen.insert(key.clone(), now) != Some(now)
    }

    fn removed(&mut self, key: &ObjectKey) {
        self.seen.remove(key);
    }
}

/// Watches one kind until the stream ends or the dispatcher stops.
pub async fn run(
    client: Client,
    kind: ResourceKind,
    namespace: Option<String>,
    dispatcher: DispatcherHandle,
    health: HealthState,
) {
    let ar = api_resource(kind);
    let api: Api<DynamicObject> = match &namespace {
        Some(ns) => Api::namespaced_with(client, ns, &ar),
        None => Api::all_with(client, &ar),
    };

    info!(kind = kind.kind, namespace = namespace.as_deref().unwrap_or("*"), "Watching records");

    let mut filter = Filter::default();
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(kind = kind.kind, error = %e, "Watch stream error");
                continue;
            }
        };

        let trigger = match event {
            Event::Apply(object) | Event::InitApply(object) => {
                let Some(key) = key_of(&object) else { continue };
                filter.applied(&key, Seen::of(&object)).then_some(key)
            }
            Event::Delete(object) => {
                let Some(key) = key_of(&object) else { continue };
                filter.removed(&key);
                Some(key)
            }
            Event::Init => {
                debug!(kind = kind.kind, "Watch (re)listing");
                None
            }
            Event::InitDone => {
                health.mark_synced(kind).await;
                info!(kind = kind.kind, records = filter.seen.len(), "Initial list complete");
                None
            }
        };

        if let Some(key) = trigger {
            if dispatcher.enqueue(key).await.is_err() {
                info!(kind = kind.kind, "Dispatcher stopped, ending watch");
                return;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seen(generation: i64, deleting: bool) -> Seen {
        Seen { generation, deleting }
    }

    #[test]
    fn test_first_sight_and_spec_changes_trigger() {
        let mut filter = Filter::default();
        let key = ObjectKey::new("ml", "eng");

        assert!(filter.applied(&key, seen(1, false)));
        // Status write: same generation.
        assert!(!filter.applied(&key, seen(1, false)));
        assert!(filter.applied(&key, seen(2, false)));
        assert!(filter.applied(&key, seen(2, true)));
        assert!(!filter.applied(&key, seen(2, true)));
    }

    #[test]
    fn test_removed_record_is_new_again() {
        let mut filter = Filter::default();
        let key = ObjectKey::new("ml", "eng");

        assert!(filter.applied(&key, seen(1, false)));
        filter.removed(&key);
        assert!(filter.applied(&key, seen(1, false)));
    }
}

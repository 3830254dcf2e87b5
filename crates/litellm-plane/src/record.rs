//! # Raw Records
//!
//! Untyped view of a desired record as the control plane stores it. The
//! reconcile engine decodes it into a typed `Record<Spec, Observed>`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use litellm_core::{ObjectKey, Record, RecordMeta, RecordStatus};

/// A desired record with its spec and status as JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub meta: RecordMeta,
    pub spec: Value,
    #[serde(default)]
    pub status: Value,
}

impl RawRecord {
    pub fn key(&self) -> ObjectKey {
        self.meta.key()
    }

    /// Decodes the spec document.
    pub fn decode_spec<S: DeserializeOwned>(&self) -> Result<S, serde_json::Error> {
        S::deserialize(&self.spec)
    }

    /// Decodes the status document. A missing status decodes to the default.
    pub fn decode_status<O>(&self) -> Result<RecordStatus<O>, serde_json::Error>
    where
        O: DeserializeOwned + Default,
    {
        if self.status.is_null() {
            return Ok(RecordStatus::default());
        }
        RecordStatus::<O>::deserialize(&self.status)
    }

    /// Decodes both documents into a typed record.
    pub fn decode<S, O>(&self) -> Result<Record<S, O>, serde_json::Error>
    where
        S: DeserializeOwned,
        O: DeserializeOwned + Default,
    {
        Ok(Record {
            meta: self.meta.clone(),
            spec: self.decode_spec()?,
            status: self.decode_status()?,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use litellm_core::kinds::team::{TeamObserved, TeamSpec};
    use serde_json::json;

    fn raw(status: Value) -> RawRecord {
        RawRecord {
            meta: RecordMeta {
                name: "eng".to_string(),
                namespace: "ml".to_string(),
                uid: "uid-1".to_string(),
                ..Default::default()
            },
            spec: json!({
                "connectionRef": { "secretRef": { "name": "gw" } },
                "teamAlias": "eng"
            }),
            status,
        }
    }

    #[test]
    fn test_decode_without_status() {
        let record: Record<TeamSpec, TeamObserved> = raw(Value::Null).decode().unwrap();
        assert_eq!(record.spec.team_alias, "eng");
        assert_eq!(record.remote_id(), None);
        assert_eq!(record.key().to_string(), "ml/eng");
    }

    #[test]
    fn test_decode_with_status() {
        let record: Record<TeamSpec, TeamObserved> = raw(json!({
            "remoteId": "team-1",
            "spend": 1.0,
            "conditions": []
        }))
        .decode()
        .unwrap();
        assert_eq!(record.remote_id(), Some("team-1"));
        assert_eq!(record.status.observed.spend, Some(1.0));
    }

    #[test]
    fn test_decode_bad_spec() {
        let mut bad = raw(Value::Null);
        bad.spec = json!({ "teamAlias": 5 });
        assert!(bad.decode_spec::<TeamSpec>().is_err());
    }
}

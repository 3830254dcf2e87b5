//! # Secrets
//!
//! Secrets read for connection resolution and created for generated key
//! material.
//!
//! ```text
//! Record (VirtualKey ml/ci-runner, uid=U)
//!    ▲ ownerReferences[0].uid = U
//!    │
//! Secret ml/gateway-key-ci-runner  { key: sk-... }
//!
//! deleting the record cascades to the secret
//! ```

use std::collections::BTreeMap;

use litellm_core::{ObjectKey, ResourceKind, Sensitive};

/// A secret as read from the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, Sensitive>,
    /// Uid of the owning record, if any.
    pub owner_uid: Option<String>,
}

impl Secret {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Returns a non-empty value by key.
    pub fn value(&self, key: &str) -> Option<&Sensitive> {
        self.data.get(key).filter(|v| !v.expose().is_empty())
    }
}

/// Owner relationship attached to a created secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl OwnerRef {
    /// Builds an owner reference to a record of the given kind.
    pub fn to_record(kind: ResourceKind, name: &str, uid: &str) -> Self {
        OwnerRef {
            api_version: kind.api_version(),
            kind: kind.kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
        }
    }
}

/// A secret to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSecret {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, Sensitive>,
    pub owner: OwnerRef,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use litellm_core::types::API_KEY;

    #[test]
    fn test_value_skips_empty() {
        let mut data = BTreeMap::new();
        data.insert("masterkey".to_string(), Sensitive::new("sk-1"));
        data.insert("url".to_string(), Sensitive::new(""));
        let secret = Secret {
            namespace: "ml".to_string(),
            name: "gw".to_string(),
            data,
            owner_uid: None,
        };

        assert_eq!(secret.value("masterkey").unwrap().expose(), "sk-1");
        assert!(secret.value("url").is_none());
        assert!(secret.value("missing").is_none());
        assert!(!format!("{:?}", secret).contains("sk-1"));
    }

    #[test]
    fn test_owner_ref() {
        let owner = OwnerRef::to_record(API_KEY, "ci", "uid-1");
        assert_eq!(owner.api_version, "auth.litellm.ai/v1alpha1");
        assert_eq!(owner.kind, "VirtualKey");
    }
}

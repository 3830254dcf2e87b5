//! # Virtual Keys API
//!
//! | call            | endpoint                                              |
//! |-----------------|-------------------------------------------------------|
//! | generate        | `POST /key/generate`                                  |
//! | regenerate      | `POST /key/regenerate {key}`                          |
//! | update          | `POST /key/update`                                    |
//! | delete          | `POST /key/delete {keys}`                             |
//! | get             | `GET /key/info?key=`                                  |
//! | find_by_alias   | `GET /key/list?key_alias=&return_full_object=true`    |
//!
//! Keys are addressed by their token hash. The key material itself is only
//! returned by `generate` and `regenerate`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{found, gone, GatewayClient};
use crate::error::GatewayResult;
use litellm_core::kinds::api_key::{ApiKeyIssued, ApiKeyRequest, RemoteApiKey};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyInfoResponse {
    key: Option<String>,
    info: Option<RemoteApiKey>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyListResponse {
    keys: Vec<KeyListEntry>,
}

/// `/key/list` returns bare hashes unless full objects are requested and
/// supported.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyListEntry {
    Full(Box<RemoteApiKey>),
    Token(String),
}

/// Virtual key operations.
pub struct Keys<'a> {
    client: &'a GatewayClient,
}

impl GatewayClient {
    pub fn keys(&self) -> Keys<'_> {
        Keys { client: self }
    }
}

impl Keys<'_> {
    pub async fn generate(&self, request: &ApiKeyRequest) -> GatewayResult<ApiKeyIssued> {
        self.client.post_json("/key/generate", request).await
    }

    /// Generates a key from a hand-built body, e.g. `{"user_id": ..}`.
    pub async fn generate_raw(&self, body: &Value) -> GatewayResult<ApiKeyIssued> {
        self.client.post_json("/key/generate", body).await
    }

    /// Issues new key material for an existing key. The token changes.
    pub async fn regenerate(&self, token: &str) -> GatewayResult<ApiKeyIssued> {
        self.client
            .post_json("/key/regenerate", &json!({ "key": token }))
            .await
    }

    /// Applies an update body built by [`update_body`](crate::update_body).
    pub async fn update(&self, body: &Value) -> GatewayResult<()> {
        self.client.post_unit("/key/update", body).await
    }

    /// Deletes a key. An already-absent key is not an error.
    pub async fn delete(&self, token: &str) -> GatewayResult<()> {
        gone(
            self.client
                .post_unit("/key/delete", &json!({ "keys": [token] }))
                .await,
        )
    }

    /// Reads a key by token hash.
    pub async fn get(&self, token: &str) -> GatewayResult<Option<RemoteApiKey>> {
        let response: Option<KeyInfoResponse> =
            found(self.client.get_json("/key/info", &[("key", token)]).await)?;

        Ok(response.and_then(|r| {
            r.info.map(|mut key| {
                if key.token.is_empty() {
                    key.token = r.key.unwrap_or_else(|| token.to_string());
                }
                key
            })
        }))
    }

    /// Finds a key by exact alias.
    pub async fn find_by_alias(&self, alias: &str) -> GatewayResult<Option<RemoteApiKey>> {
        let response: KeyListResponse = self
            .client
            .get_json(
                "/key/list",
                &[("key_alias", alias), ("return_full_object", "true")],
            )
            .await?;

        let mut tokens = Vec::new();
        for entry in response.keys {
            match entry {
                KeyListEntry::Full(key) if key.key_alias.as_deref() == Some(alias) => return Ok(Some(*key)),
                KeyListEntry::Full(_) => {}
                KeyListEntry::Token(token) => tokens.push(token),
            }
        }

        // Older gateways ignore `return_full_object`; resolve the hashes one by one.
        for token in tokens {
            if let Some(key) = self.get(&token).await? {
                if key.key_alias.as_deref() == Some(alias) {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }
}

//! # Users API
//!
//! | call            | endpoint                           |
//! |-----------------|------------------------------------|
//! | create          | `POST /user/new`                   |
//! | update          | `POST /user/update`                |
//! | delete          | `POST /user/delete {user_ids}`     |
//! | get             | `GET /user/info?user_id=`          |
//! | find_by_email   | `GET /user/list?user_email=`       |

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{found, gone, GatewayClient};
use crate::error::GatewayResult;
use litellm_core::kinds::account::{AccountCreated, AccountRequest, RemoteAccount};

/// `/user/info` response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserInfoResponse {
    user_id: Option<String>,
    user_info: Option<RemoteAccount>,
    teams: Vec<Value>,
}

/// `/user/list` answers either a bare list or a page object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserListResponse {
    Page { users: Vec<RemoteAccount> },
    List(Vec<RemoteAccount>),
}

/// User operations.
pub struct Users<'a> {
    client: &'a GatewayClient,
}

impl GatewayClient {
    pub fn users(&self) -> Users<'_> {
        Users { client: self }
    }
}

impl Users<'_> {
    /// Creates a user. The generated key is returned when requested.
    pub async fn create(&self, request: &AccountRequest) -> GatewayResult<AccountCreated> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| crate::GatewayError::Decode(e.to_string()))?;
        body["auto_create_key"] = Value::Bool(request.auto_create_key);
        self.client.post_json("/user/new", &body).await
    }

    /// Applies an update body built by [`update_body`](crate::update_body).
    pub async fn update(&self, body: &Value) -> GatewayResult<()> {
        self.client.post_unit("/user/update", body).await
    }

    /// Deletes a user. An already-absent user is not an error.
    pub async fn delete(&self, user_id: &str) -> GatewayResult<()> {
        gone(
            self.client
                .post_unit("/user/delete", &json!({ "user_ids": [user_id] }))
                .await,
        )
    }

    /// Reads a user by id.
    pub async fn get(&self, user_id: &str) -> GatewayResult<Option<RemoteAccount>> {
        let response: Option<UserInfoResponse> = found(
            self.client
                .get_json("/user/info", &[("user_id", user_id)])
                .await,
        )?;

        Ok(response.and_then(|r| {
            let team_ids: Vec<String> = r
                .teams
                .iter()
                .filter_map(|t| match t {
                    Value::String(id) => Some(id.clone()),
                    Value::Object(o) => o.get("team_id").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect();

            r.user_info.map(|mut account| {
                if account.user_id.is_empty() {
                    account.user_id = r.user_id.unwrap_or_else(|| user_id.to_string());
                }
                if account.teams.is_none() && !team_ids.is_empty() {
                    account.teams = Some(team_ids);
                }
                account
            })
        }))
    }

    /// Finds a user by exact email.
    pub async fn find_by_email(&self, email: &str) -> GatewayResult<Option<RemoteAccount>> {
        let response: UserListResponse = self
            .client
            .get_json("/user/list", &[("user_email", email)])
            .await?;
        let users = match response {
            UserListResponse::Page { users } => users,
            UserListResponse::List(users) => users,
        };
        Ok(users
            .into_iter()
            .find(|u| u.user_email.as_deref() == Some(email)))
    }
}

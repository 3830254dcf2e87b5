//! # Models API
//!
//! | call     | endpoint                                  |
//! |----------|-------------------------------------------|
//! | create   | `POST /model/new`                         |
//! | update   | `POST /model/update`                      |
//! | delete   | `POST /model/delete {id}`                 |
//! | get      | `GET /model/info?litellm_model_id=`       |
//!
//! Model ids are chosen by the caller at create time, so lookup by id also
//! serves as lookup by natural key.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{found, gone, GatewayClient};
use crate::error::GatewayResult;
use litellm_core::kinds::model::{ModelRequest, RemoteModel};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelInfoResponse {
    data: Vec<RemoteModel>,
}

/// Model deployment operations.
pub struct Models<'a> {
    client: &'a GatewayClient,
}

impl GatewayClient {
    pub fn models(&self) -> Models<'_> {
        Models { client: self }
    }
}

impl Models<'_> {
    pub async fn create(&self, request: &ModelRequest) -> GatewayResult<()> {
        self.client.post_unit("/model/new", request).await
    }

    /// Applies an update body built by [`update_body`](crate::update_body).
    pub async fn update(&self, body: &Value) -> GatewayResult<()> {
        self.client.post_unit("/model/update", body).await
    }

    /// Deletes a model. An already-absent model is not an error.
    pub async fn delete(&self, id: &str) -> GatewayResult<()> {
        gone(
            self.client
                .post_unit("/model/delete", &json!({ "id": id }))
                .await,
        )
    }

    /// Reads a model by id.
    pub async fn get(&self, id: &str) -> GatewayResult<Option<RemoteModel>> {
        let response: Option<ModelInfoResponse> = found(
            self.client
                .get_json("/model/info", &[("litellm_model_id", id)])
                .await,
        )?;

        Ok(response.and_then(|r| r.data.into_iter().find(|m| m.id() == id)))
    }
}

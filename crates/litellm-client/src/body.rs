//! # Update Bodies
//!
//! Gateway update endpoints take the full projected request plus the entity
//! id. Fields being cleared must be sent as explicit `null`; omitting them
//! would leave the old value in place.
//!
//! ```text
//! request  {"team_alias":"eng","models":null,"metadata":{..}}
//! id       team_id = "t-1"
//! cleared  ["max_budget", "litellm_params.rpm"]
//!            │
//!            ▼
//! {"team_id":"t-1","team_alias":"eng","models":null,"metadata":{..},
//!  "max_budget":null,"litellm_params":{..,"rpm":null}}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// Builds an update body.
///
/// `cleared` entries may be dotted paths into nested objects.
pub fn update_body<T: Serialize>(
    request: &T,
    id: Option<(&str, &str)>,
    cleared: &[&str],
) -> GatewayResult<Value> {
    let mut body = serde_json::to_value(request)
        .map_err(|e| GatewayError::Decode(format!("request could not be encoded: {}", e)))?;
    let object = body
        .as_object_mut()
        .ok_or_else(|| GatewayError::Decode("request is not a JSON object".to_string()))?;

    for path in cleared {
        set_null(object, path);
    }
    if let Some((field, value)) = id {
        object.insert(field.to_string(), Value::String(value.to_string()));
    }

    Ok(body)
}

fn set_null(object: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            object.insert(path.to_string(), Value::Null);
        }
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                set_null(child, rest);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

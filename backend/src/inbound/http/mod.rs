//! HTTP inbound adapter exposing the device API.

pub mod device_auth;
pub mod devices;
pub mod error;
pub mod health;
pub mod idempotency;
pub mod schemas;
pub mod state;

use actix_web::web;
use serde_json::json;

use crate::domain::Error;

pub use error::ApiResult;

pub(crate) fn invalid_json(err: impl std::fmt::Display) -> Error {
    Error::invalid_request(format!("invalid json body: {err}"))
        .with_details(json!({ "code": "invalid_json" }))
}

/// JSON extractor configuration that reports body errors in the API error
/// envelope instead of actix's plain-text default.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| invalid_json(err).into())
}

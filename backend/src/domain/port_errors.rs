//! Port error to domain error mappings shared by several services.

use serde_json::json;

use crate::domain::Error;
use crate::domain::ports::{DeviceRepositoryError, UserProfileRepositoryError};

pub(crate) fn map_device_repository_error(error: DeviceRepositoryError) -> Error {
    match error {
        DeviceRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("device repository unavailable: {message}"))
        }
        DeviceRepositoryError::Query { message } => {
            Error::internal(format!("device repository error: {message}"))
        }
        DeviceRepositoryError::NotFound { device } => Error::unauthorized("device no longer exists")
            .with_details(json!({ "device": device, "code": "device_not_found" })),
        DeviceRepositoryError::DuplicateKey => Error::conflict(
            "api key is already assigned to another device",
        )
        .with_details(json!({ "field": "api_key", "code": "duplicate_api_key" })),
    }
}

pub(crate) fn map_profile_error(error: UserProfileRepositoryError) -> Error {
    match error {
        UserProfileRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("profile repository unavailable: {message}"))
        }
        UserProfileRepositoryError::Query { message } => {
            Error::internal(format!("profile repository error: {message}"))
        }
        UserProfileRepositoryError::DuplicateUsername { username } => {
            Error::conflict(format!("username {username} is already taken"))
                .with_details(json!({ "field": "username", "code": "duplicate_username" }))
        }
        UserProfileRepositoryError::DuplicateSchoolId { school_id } => {
            Error::conflict(format!("school id {school_id} is already assigned"))
                .with_details(json!({ "field": "school_id", "code": "duplicate_school_id" }))
        }
        UserProfileRepositoryError::DuplicateQrToken => {
            Error::uniqueness_conflict("qr token collided with an existing profile")
                .with_details(json!({ "field": "qr_code_data", "code": "duplicate_qr_token" }))
        }
    }
}

//! Driving port resolving a presented API key to a device.

use async_trait::async_trait;

use crate::domain::{ApiKey, Device, Error};

/// Bearer-credential authentication for kiosk requests.
///
/// Lookup is read-only: no device is created or mutated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceAuthentication: Send + Sync {
    /// # Errors
    ///
    /// [`crate::domain::ErrorCode::Unauthorized`] when no device holds the key.
    async fn authenticate(&self, api_key: &ApiKey) -> Result<Device, Error>;
}

/// Fixture implementation that rejects every key.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceAuthentication;

#[async_trait]
impl DeviceAuthentication for FixtureDeviceAuthentication {
    async fn authenticate(&self, _api_key: &ApiKey) -> Result<Device, Error> {
        Err(Error::unauthorized("invalid api key"))
    }
}

//! Port for kiosk device persistence.
//!
//! Devices are looked up by the digest of their API key and mutated only by
//! telemetry processing and administrative registration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ApiKeyDigest, Device, DeviceCode, DeviceStatus};

use super::define_port_error;

define_port_error! {
    /// Errors raised by device repository adapters.
    pub enum DeviceRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "device repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "device repository query failed: {message}",
        /// The device row vanished between authentication and update.
        NotFound { device: Uuid } => "device {device} not found",
        /// Another device already holds the presented key.
        DuplicateKey => "api key is already assigned to another device",
    }
}

/// A device together with the key digest stored for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCredential {
    pub device: Device,
    pub digest: ApiKeyDigest,
}

/// Registration payload with the key already digested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub device_id: DeviceCode,
    pub device_name: String,
    pub location: String,
    pub digest: ApiKeyDigest,
}

/// Port for device storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Device whose stored digest equals `digest`, if any.
    async fn find_by_key_digest(
        &self,
        digest: &ApiKeyDigest,
    ) -> Result<Option<DeviceCredential>, DeviceRepositoryError>;

    /// Stamp `last_heartbeat` and apply [`DeviceStatus::after_heartbeat`] in a
    /// single update, returning the refreshed device.
    async fn record_heartbeat(
        &self,
        device: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Device, DeviceRepositoryError>;

    /// Overwrite the operational status.
    async fn set_status(
        &self,
        device: Uuid,
        status: DeviceStatus,
    ) -> Result<(), DeviceRepositoryError>;

    /// Insert a device, or rotate the key of the existing device with the
    /// same code. Returns the device and whether it already existed.
    async fn register(&self, device: &NewDevice) -> Result<(Device, bool), DeviceRepositoryError>;
}

/// Fixture implementation that knows no devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceRepository;

#[async_trait]
impl DeviceRepository for FixtureDeviceRepository {
    async fn find_by_key_digest(
        &self,
        _digest: &ApiKeyDigest,
    ) -> Result<Option<DeviceCredential>, DeviceRepositoryError> {
        Ok(None)
    }

    async fn record_heartbeat(
        &self,
        device: Uuid,
        _at: DateTime<Utc>,
    ) -> Result<Device, DeviceRepositoryError> {
        Err(DeviceRepositoryError::not_found(device))
    }

    async fn set_status(
        &self,
        device: Uuid,
        _status: DeviceStatus,
    ) -> Result<(), DeviceRepositoryError> {
        Err(DeviceRepositoryError::not_found(device))
    }

    async fn register(&self, device: &NewDevice) -> Result<(Device, bool), DeviceRepositoryError> {
        Ok((
            Device {
                id: Uuid::new_v4(),
                device_id: device.device_id.clone(),
                device_name: device.device_name.clone(),
                location: device.location.clone(),
                status: DeviceStatus::Offline,
                last_heartbeat: None,
                total_bottles_processed: 0,
            },
            false,
        ))
    }
}

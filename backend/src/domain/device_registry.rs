//! Administrative device registration and key rotation.

use std::sync::Arc;

use tracing::info;

use crate::domain::port_errors::map_device_repository_error;
use crate::domain::ports::{DeviceRepository, NewDevice};
use crate::domain::{ApiKey, DeviceRegistration, Error, RegisteredDevice};

#[derive(Clone)]
pub struct DeviceRegistry<R> {
    devices: Arc<R>,
}

impl<R> DeviceRegistry<R> {
    pub fn new(devices: Arc<R>) -> Self {
        Self { devices }
    }
}

impl<R> DeviceRegistry<R>
where
    R: DeviceRepository,
{
    /// Register a device, or rotate the key of an existing one.
    ///
    /// A key is generated when none is supplied. The plaintext is returned
    /// once; only its digest is stored.
    pub async fn register(
        &self,
        registration: DeviceRegistration,
    ) -> Result<RegisteredDevice, Error> {
        let DeviceRegistration {
            device_id,
            device_name,
            location,
            api_key,
        } = registration;
        let api_key = api_key.unwrap_or_else(ApiKey::generate);
        let digest = api_key.digest();

        let (device, rotated) = self
            .devices
            .register(&NewDevice {
                device_id,
                device_name,
                location,
                digest,
            })
            .await
            .map_err(map_device_repository_error)?;

        info!(
            device_id = %device.device_id,
            key_fingerprint = %digest.fingerprint(),
            rotated,
            "device registered"
        );
        Ok(RegisteredDevice {
            device,
            api_key,
            rotated,
        })
    }
}

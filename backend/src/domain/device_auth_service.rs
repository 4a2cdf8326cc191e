//! Device authentication service implementing [`DeviceAuthentication`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::port_errors::map_device_repository_error;
use crate::domain::ports::{DeviceAuthentication, DeviceRepository};
use crate::domain::{ApiKey, Device, Error};

/// Resolves bearer keys to devices by digest.
///
/// The repository narrows the search with an indexed digest lookup; the
/// final comparison against the stored digest is constant-time.
#[derive(Clone)]
pub struct DeviceAuthService<R> {
    devices: Arc<R>,
}

impl<R> DeviceAuthService<R> {
    pub fn new(devices: Arc<R>) -> Self {
        Self { devices }
    }
}

fn rejected() -> Error {
    Error::unauthorized("invalid api key").with_details(json!({ "code": "invalid_api_key" }))
}

#[async_trait]
impl<R> DeviceAuthentication for DeviceAuthService<R>
where
    R: DeviceRepository,
{
    async fn authenticate(&self, api_key: &ApiKey) -> Result<Device, Error> {
        let presented = api_key.digest();
        let credential = self
            .devices
            .find_by_key_digest(&presented)
            .await
            .map_err(map_device_repository_error)?;

        match credential {
            Some(credential) if credential.digest.matches(&presented) => {
                debug!(device_id = %credential.device.device_id, "device authenticated");
                Ok(credential.device)
            }
            _ => {
                warn!(key_fingerprint = %presented.fingerprint(), "rejected device api key");
                Err(rejected())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{DeviceCredential, DeviceRepositoryError, MockDeviceRepository};
    use crate::domain::{DeviceCode, DeviceStatus, ErrorCode};
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    #[fixture]
    fn device() -> Device {
        Device {
            id: Uuid::new_v4(),
            device_id: DeviceCode::new("KIOSK-01").expect("valid code"),
            device_name: "Canteen".into(),
            location: "Ground floor".into(),
            status: DeviceStatus::Online,
            last_heartbeat: None,
            total_bottles_processed: 3,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn resolves_matching_key(device: Device) {
        let key = ApiKey::new("kiosk-secret").expect("non-empty");
        let digest = key.digest();
        let expected = device.clone();

        let mut repo = MockDeviceRepository::new();
        repo.expect_find_by_key_digest()
            .withf(move |candidate| *candidate == digest)
            .times(1)
            .return_once(move |_| Ok(Some(DeviceCredential { device, digest })));

        let service = DeviceAuthService::new(Arc::new(repo));
        let resolved = service.authenticate(&key).await.expect("authenticated");
        assert_eq!(resolved, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_unknown_key() {
        let mut repo = MockDeviceRepository::new();
        repo.expect_find_by_key_digest()
            .times(1)
            .return_once(|_| Ok(None));

        let service = DeviceAuthService::new(Arc::new(repo));
        let err = service
            .authenticate(&ApiKey::new("nope").expect("non-empty"))
            .await
            .expect_err("unknown key");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_when_stored_digest_differs(device: Device) {
        let stored = ApiKey::new("other").expect("non-empty").digest();
        let mut repo = MockDeviceRepository::new();
        repo.expect_find_by_key_digest().return_once(move |_| {
            Ok(Some(DeviceCredential {
                device,
                digest: stored,
            }))
        });

        let service = DeviceAuthService::new(Arc::new(repo));
        let err = service
            .authenticate(&ApiKey::new("presented").expect("non-empty"))
            .await
            .expect_err("digest mismatch");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[rstest]
    #[tokio::test]
    async fn connection_failure_is_service_unavailable() {
        let mut repo = MockDeviceRepository::new();
        repo.expect_find_by_key_digest()
            .return_once(|_| Err(DeviceRepositoryError::connection("refused")));

        let service = DeviceAuthService::new(Arc::new(repo));
        let err = service
            .authenticate(&ApiKey::generate())
            .await
            .expect_err("connection failure");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}

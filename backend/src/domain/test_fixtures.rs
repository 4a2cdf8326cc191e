//! Shared fixtures for domain unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use uuid::Uuid;

use super::ports::DeviceAuthentication;
use super::{
    ApiKey, Device, DeviceCode, DeviceStatus, Error, Points, SchoolId, UserProfile, UserType,
};

pub(crate) fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 23, 21, 45, 12)
        .single()
        .expect("valid fixture timestamp")
}

pub(crate) struct FixedClock(pub(crate) DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(crate) fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(fixture_timestamp()))
}

pub(crate) fn kiosk(status: DeviceStatus) -> Device {
    Device {
        id: Uuid::new_v4(),
        device_id: DeviceCode::new("KIOSK-01").expect("valid device code"),
        device_name: "Library kiosk".into(),
        location: "Library, ground floor".into(),
        status,
        last_heartbeat: None,
        total_bottles_processed: 0,
    }
}

pub(crate) fn student(points: u32) -> UserProfile {
    UserProfile {
        id: Uuid::new_v4(),
        username: "maria".into(),
        school_id: Some(SchoolId::new("C25-0008").expect("valid school id")),
        qr_code_data: Some("SMC-USER-maria-1a2b3c4d".into()),
        user_type: UserType::Student,
        total_points: Points::new(points).expect("points in range"),
    }
}

/// Rejects every key, but only after yielding to the executor once.
pub(crate) struct YieldingRejection;

#[async_trait]
impl DeviceAuthentication for YieldingRejection {
    async fn authenticate(&self, _api_key: &ApiKey) -> Result<Device, Error> {
        tokio::task::yield_now().await;
        Err(Error::unauthorized("invalid api key"))
    }
}

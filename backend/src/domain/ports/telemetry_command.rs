//! Driving port for state-changing device telemetry.
//!
//! Every method receives the device already resolved by
//! [`super::DeviceAuthentication`]; authentication failures never reach it.

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Detection, DetectionOutcome, Device, Error, FaultReport, HeartbeatAck};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryCommand: Send + Sync {
    /// Record a heartbeat. `claimed_device_id`, when present, must name the
    /// authenticated device.
    async fn heartbeat(
        &self,
        device: &Device,
        claimed_device_id: Option<String>,
    ) -> Result<HeartbeatAck, Error>;

    /// Process one classified deposit.
    async fn detection(
        &self,
        device: &Device,
        detection: Detection,
    ) -> Result<DetectionOutcome, Error>;

    /// Log a device fault and apply any requested status change.
    async fn report_fault(&self, device: &Device, report: FaultReport) -> Result<(), Error>;
}

/// Fixture implementation that acknowledges everything without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTelemetryCommand;

#[async_trait]
impl TelemetryCommand for FixtureTelemetryCommand {
    async fn heartbeat(
        &self,
        device: &Device,
        _claimed_device_id: Option<String>,
    ) -> Result<HeartbeatAck, Error> {
        Ok(HeartbeatAck {
            status: device.status.after_heartbeat(),
            timestamp: Utc::now(),
        })
    }

    async fn detection(
        &self,
        _device: &Device,
        _detection: Detection,
    ) -> Result<DetectionOutcome, Error> {
        Ok(DetectionOutcome::unrewarded())
    }

    async fn report_fault(&self, _device: &Device, _report: FaultReport) -> Result<(), Error> {
        Ok(())
    }
}

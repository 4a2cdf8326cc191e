//! Telemetry ingestion: the state machine behind the device API.
//!
//! Each request concerns one authenticated device. Heartbeats refresh
//! liveness, detections may credit points, fault reports adjust status, and
//! verification is a pure read. Audit log rows are appended in their own
//! writes so failures stay visible even when a detection rolls back.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::port_errors::{map_device_repository_error, map_profile_error};
use crate::domain::ports::{
    DetectionCommit, DetectionLedger, DetectionLedgerError, DeviceLogRepository,
    DeviceLogRepositoryError, DeviceRepository, PlasticDetection, TelemetryCommand,
    TelemetryQuery, UserProfileRepository,
};
use crate::domain::{
    Detection, DetectionOutcome, Device, DeviceLogEntry, Error, FaultReport, HeartbeatAck,
    LogType, Points, ProfileIdentifier, SortResult, Verification,
};

/// Driven ports the telemetry service depends on.
pub struct TelemetryPorts<D, L, T, P> {
    pub devices: Arc<D>,
    pub logs: Arc<L>,
    pub ledger: Arc<T>,
    pub profiles: Arc<P>,
}

/// Implements [`TelemetryCommand`] and [`TelemetryQuery`].
pub struct TelemetryService<D, L, T, P> {
    devices: Arc<D>,
    logs: Arc<L>,
    ledger: Arc<T>,
    profiles: Arc<P>,
    clock: Arc<dyn Clock>,
    points_per_bottle: Points,
}

impl<D, L, T, P> TelemetryService<D, L, T, P> {
    pub fn new(
        ports: TelemetryPorts<D, L, T, P>,
        clock: Arc<dyn Clock>,
        points_per_bottle: Points,
    ) -> Self {
        let TelemetryPorts {
            devices,
            logs,
            ledger,
            profiles,
        } = ports;
        Self {
            devices,
            logs,
            ledger,
            profiles,
            clock,
            points_per_bottle,
        }
    }
}

fn map_log_error(error: DeviceLogRepositoryError) -> Error {
    match error {
        DeviceLogRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("device log unavailable: {message}"))
        }
        DeviceLogRepositoryError::Query { message } => {
            Error::internal(format!("device log error: {message}"))
        }
    }
}

fn map_ledger_error(error: DetectionLedgerError) -> Error {
    match error {
        DetectionLedgerError::Connection { message } => {
            Error::service_unavailable(format!("detection ledger unavailable: {message}"))
        }
        DetectionLedgerError::Query { message } => {
            Error::internal(format!("detection ledger error: {message}"))
        }
        DetectionLedgerError::BalanceOverflow { profile } => {
            Error::conflict("point balance would overflow")
                .with_details(json!({ "profile": profile, "code": "balance_overflow" }))
        }
    }
}

fn user_not_found(identifier: &ProfileIdentifier) -> Error {
    Error::not_found(format!("no user matches identifier {identifier}")).with_details(json!({
        "field": "identifier",
        "code": "user_not_found",
    }))
}

impl<D, L, T, P> TelemetryService<D, L, T, P>
where
    D: DeviceRepository,
    L: DeviceLogRepository,
    T: DetectionLedger,
    P: UserProfileRepository,
{
    async fn append(&self, entry: DeviceLogEntry) -> Result<(), Error> {
        self.logs.append(&entry).await.map_err(map_log_error)
    }

    /// Log write whose failure must not mask the error being reported.
    async fn append_best_effort(&self, entry: DeviceLogEntry) {
        if let Err(err) = self.logs.append(&entry).await {
            error!(
                device = %entry.device,
                log_type = %entry.log_type,
                error = %err,
                "failed to append device log"
            );
        }
    }

    async fn plastic(
        &self,
        device: &Device,
        detection: Detection,
    ) -> Result<DetectionOutcome, Error> {
        let Some(identifier) = detection.identifier else {
            return Err(Error::invalid_request("identifier is required for plastic detections")
                .with_details(json!({ "field": "identifier", "code": "missing_identifier" })));
        };
        let request = PlasticDetection {
            device: device.id,
            identifier,
            points: self.points_per_bottle,
            sensor_data: detection.sensor_data,
            event_key: detection.event_key,
        };

        match self.ledger.commit_plastic(&request).await {
            Ok(DetectionCommit::Credited {
                profile,
                total_points,
            }) => {
                info!(
                    device_id = %device.device_id,
                    log_type = %LogType::BottleSorted,
                    sort_result = %SortResult::Plastic,
                    %profile,
                    points = %self.points_per_bottle,
                    "plastic detection credited"
                );
                Ok(DetectionOutcome {
                    points_awarded: self.points_per_bottle,
                    total_points: Some(total_points),
                    replayed: false,
                })
            }
            Ok(DetectionCommit::Replayed {
                profile,
                total_points,
            }) => {
                info!(
                    device_id = %device.device_id,
                    %profile,
                    event_key = ?request.event_key.map(|k| k.to_string()),
                    "detection replayed"
                );
                Ok(DetectionOutcome {
                    points_awarded: Points::ZERO,
                    total_points: Some(total_points),
                    replayed: true,
                })
            }
            Ok(DetectionCommit::UserNotFound) => {
                warn!(device_id = %device.device_id, "plastic detection for unknown user");
                self.append_best_effort(
                    DeviceLogEntry::new(device.id, LogType::BottleDetected)
                        .with_sort_result(SortResult::Plastic)
                        .with_sensor_data(request.sensor_data.clone())
                        .with_message(format!(
                            "no user matches identifier {}",
                            request.identifier
                        )),
                )
                .await;
                Err(user_not_found(&request.identifier))
            }
            Err(err) => {
                error!(device_id = %device.device_id, error = %err, "detection transaction failed");
                self.append_best_effort(
                    DeviceLogEntry::new(device.id, LogType::Error)
                        .with_sort_result(SortResult::Plastic)
                        .with_sensor_data(request.sensor_data.clone())
                        .with_message(format!("detection failed: {err}")),
                )
                .await;
                Err(map_ledger_error(err))
            }
        }
    }
}

#[async_trait]
impl<D, L, T, P> TelemetryCommand for TelemetryService<D, L, T, P>
where
    D: DeviceRepository,
    L: DeviceLogRepository,
    T: DetectionLedger,
    P: UserProfileRepository,
{
    async fn heartbeat(
        &self,
        device: &Device,
        claimed_device_id: Option<String>,
    ) -> Result<HeartbeatAck, Error> {
        let mismatched = claimed_device_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != device.device_id.as_ref());
        if let Some(claimed) = mismatched {
            return Err(Error::invalid_request(format!(
                "device_id {claimed:?} does not match the authenticated device"
            ))
            .with_details(json!({ "field": "device_id", "code": "device_mismatch" })));
        }

        let now = self.clock.utc();
        let refreshed = self
            .devices
            .record_heartbeat(device.id, now)
            .await
            .map_err(map_device_repository_error)?;
        self.append(DeviceLogEntry::new(device.id, LogType::Heartbeat).with_message("heartbeat"))
            .await?;

        info!(
            device_id = %device.device_id,
            log_type = %LogType::Heartbeat,
            status = %refreshed.status,
            "heartbeat recorded"
        );
        Ok(HeartbeatAck {
            status: refreshed.status,
            timestamp: now,
        })
    }

    async fn detection(
        &self,
        device: &Device,
        detection: Detection,
    ) -> Result<DetectionOutcome, Error> {
        match detection.sort_result {
            SortResult::Plastic => self.plastic(device, detection).await,
            SortResult::Invalid => {
                self.append(
                    DeviceLogEntry::new(device.id, LogType::BottleSorted)
                        .with_sort_result(SortResult::Invalid)
                        .with_sensor_data(detection.sensor_data)
                        .with_message("rejected item")
                        .with_event_key(detection.event_key),
                )
                .await?;
                info!(
                    device_id = %device.device_id,
                    log_type = %LogType::BottleSorted,
                    sort_result = %SortResult::Invalid,
                    "detection logged"
                );
                Ok(DetectionOutcome::unrewarded())
            }
            SortResult::Error => {
                self.append(
                    DeviceLogEntry::new(device.id, LogType::Error)
                        .with_sort_result(SortResult::Error)
                        .with_sensor_data(detection.sensor_data)
                        .with_message("classifier error")
                        .with_event_key(detection.event_key),
                )
                .await?;
                info!(
                    device_id = %device.device_id,
                    log_type = %LogType::Error,
                    sort_result = %SortResult::Error,
                    "detection logged"
                );
                Ok(DetectionOutcome::unrewarded())
            }
        }
    }

    async fn report_fault(&self, device: &Device, report: FaultReport) -> Result<(), Error> {
        let log_type = report.log_type();
        self.append(
            DeviceLogEntry::new(device.id, log_type)
                .with_sensor_data(report.sensor_data)
                .with_message(report.message),
        )
        .await?;

        if let Some(status) = report.status {
            self.devices
                .set_status(device.id, status)
                .await
                .map_err(map_device_repository_error)?;
        }
        warn!(
            device_id = %device.device_id,
            %log_type,
            status = ?report.status.map(|s| s.as_str()),
            "device fault reported"
        );
        Ok(())
    }
}

#[async_trait]
impl<D, L, T, P> TelemetryQuery for TelemetryService<D, L, T, P>
where
    D: DeviceRepository,
    L: DeviceLogRepository,
    T: DetectionLedger,
    P: UserProfileRepository,
{
    async fn verify(&self, identifier: &ProfileIdentifier) -> Result<Verification, Error> {
        let profile = self
            .profiles
            .find_by_identifier(identifier)
            .await
            .map_err(map_profile_error)?;
        Ok(Verification {
            found: profile.is_some(),
            points: profile.map(|p| p.total_points),
        })
    }
}

#[cfg(test)]
#[path = "telemetry_service_tests.rs"]
mod tests;

//! Device telemetry events and their audit-log representation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{DeviceStatus, IdempotencyKey, Points, ProfileIdentifier};

/// Validation failures for telemetry payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryValidationError {
    UnknownSortResult(String),
    MissingIdentifier,
    UnsupportedFaultStatus(String),
}

impl fmt::Display for TelemetryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSortResult(raw) => write!(
                f,
                "sort_result must be one of plastic, invalid, error (got {raw:?})"
            ),
            Self::MissingIdentifier => {
                write!(f, "identifier is required for plastic detections")
            }
            Self::UnsupportedFaultStatus(raw) => write!(
                f,
                "status must be error or maintenance (got {raw:?})"
            ),
        }
    }
}

impl std::error::Error for TelemetryValidationError {}

/// Classifier verdict for one deposited item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortResult {
    Plastic,
    Invalid,
    Error,
}

impl SortResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plastic => "plastic",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

impl FromStr for SortResult {
    type Err = TelemetryValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plastic" => Ok(Self::Plastic),
            "invalid" => Ok(Self::Invalid),
            "error" => Ok(Self::Error),
            other => Err(TelemetryValidationError::UnknownSortResult(other.to_owned())),
        }
    }
}

impl fmt::Display for SortResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a device log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogType {
    BottleDetected,
    BottleSorted,
    Error,
    Maintenance,
    Heartbeat,
}

impl LogType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BottleDetected => "bottle_detected",
            Self::BottleSorted => "bottle_sorted",
            Self::Error => "error",
            Self::Maintenance => "maintenance",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit row describing one device event.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLogEntry {
    pub device: Uuid,
    pub log_type: LogType,
    pub sort_result: Option<SortResult>,
    pub sensor_data: Option<Value>,
    pub message: String,
    pub event_key: Option<IdempotencyKey>,
}

impl DeviceLogEntry {
    pub fn new(device: Uuid, log_type: LogType) -> Self {
        Self {
            device,
            log_type,
            sort_result: None,
            sensor_data: None,
            message: String::new(),
            event_key: None,
        }
    }

    #[must_use]
    pub fn with_sort_result(mut self, sort_result: SortResult) -> Self {
        self.sort_result = Some(sort_result);
        self
    }

    #[must_use]
    pub fn with_sensor_data(mut self, sensor_data: Option<Value>) -> Self {
        self.sensor_data = sensor_data;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_event_key(mut self, event_key: Option<IdempotencyKey>) -> Self {
        self.event_key = event_key;
        self
    }
}

/// A classified deposit reported by a kiosk.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub sort_result: SortResult,
    pub sensor_data: Option<Value>,
    pub identifier: Option<ProfileIdentifier>,
    pub event_key: Option<IdempotencyKey>,
}

impl Detection {
    /// Build a detection from raw payload fields.
    ///
    /// Blank identifiers count as absent. Plastic detections must name a user.
    ///
    /// # Examples
    /// ```
    /// use ecodrop::domain::{Detection, SortResult};
    ///
    /// let detection = Detection::parse("invalid", None, None, None).expect("valid");
    /// assert_eq!(detection.sort_result, SortResult::Invalid);
    /// assert!(Detection::parse("plastic", None, None, None).is_err());
    /// ```
    pub fn parse(
        sort_result: &str,
        sensor_data: Option<Value>,
        identifier: Option<&str>,
        event_key: Option<IdempotencyKey>,
    ) -> Result<Self, TelemetryValidationError> {
        let sort_result: SortResult = sort_result.parse()?;
        let identifier = identifier.and_then(|raw| ProfileIdentifier::new(raw).ok());
        if sort_result == SortResult::Plastic && identifier.is_none() {
            return Err(TelemetryValidationError::MissingIdentifier);
        }
        Ok(Self {
            sort_result,
            sensor_data,
            identifier,
            event_key,
        })
    }
}

/// A device-level fault report.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultReport {
    pub message: String,
    pub sensor_data: Option<Value>,
    pub status: Option<DeviceStatus>,
}

impl FaultReport {
    /// Only `error` and `maintenance` may be requested as the new status.
    pub fn parse(
        message: impl Into<String>,
        sensor_data: Option<Value>,
        status: Option<&str>,
    ) -> Result<Self, TelemetryValidationError> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some("error") => Some(DeviceStatus::Error),
            Some("maintenance") => Some(DeviceStatus::Maintenance),
            Some(other) => {
                return Err(TelemetryValidationError::UnsupportedFaultStatus(
                    other.to_owned(),
                ));
            }
        };
        Ok(Self {
            message: message.into(),
            sensor_data,
            status,
        })
    }

    /// Log category matching the requested status.
    #[must_use]
    pub fn log_type(&self) -> LogType {
        match self.status {
            Some(DeviceStatus::Maintenance) => LogType::Maintenance,
            _ => LogType::Error,
        }
    }
}

/// Heartbeat acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAck {
    pub status: DeviceStatus,
    pub timestamp: DateTime<Utc>,
}

/// Result of processing a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub points_awarded: Points,
    /// Balance after the credit; only reported for plastic detections.
    pub total_points: Option<Points>,
    /// The event key had already been committed; nothing was credited.
    pub replayed: bool,
}

impl DetectionOutcome {
    /// Outcome of a detection that earns nothing.
    #[must_use]
    pub fn unrewarded() -> Self {
        Self {
            points_awarded: Points::ZERO,
            total_points: None,
            replayed: false,
        }
    }
}

/// Result of a kiosk-side identifier check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub found: bool,
    pub points: Option<Points>,
}

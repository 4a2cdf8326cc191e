//! Domain primitives, aggregates and services.
//!
//! Purpose: Define strongly typed entities for identifiers, points, devices
//! and telemetry, the ports adapters implement, and the services that
//! orchestrate them. Nothing here depends on actix or diesel.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — API error response payload.
//! - ErrorCode (alias to `error::ErrorCode`) — stable error identifier.
//! - Points — non-negative balance arithmetic.
//! - SchoolId, IdScheme — institutional identifier sequencing.
//! - ReceiptIssuer — redemption receipt candidates.
//! - TelemetryService — device heartbeat, detection, fault and verify flows.

pub mod device;
pub mod error;
pub mod idempotency;
pub mod points;
pub mod ports;
pub mod receipt;
pub mod redemption;
pub mod school_id;
pub mod telemetry;
pub mod trace_id;
pub mod user_profile;

mod account_service;
mod device_auth_service;
mod device_registry;
mod ledger_audit_service;
mod port_errors;
mod redemption_service;
mod school_id_service;
mod telemetry_service;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use self::account_service::AccountService;
pub use self::device::{
    ApiKey, ApiKeyDigest, DEVICE_CODE_MAX, Device, DeviceCode, DeviceRegistration, DeviceStatus,
    DeviceValidationError, RegisteredDevice,
};
pub use self::device_auth_service::DeviceAuthService;
pub use self::device_registry::DeviceRegistry;
pub use self::error::{Error, ErrorCode};
pub use self::idempotency::{IdempotencyKey, IdempotencyKeyValidationError};
pub use self::ledger_audit_service::LedgerAuditService;
pub use self::points::{LedgerDiscrepancy, MAX_POINTS, Points, PointsError};
pub use self::receipt::{
    MAX_RECEIPT_ATTEMPTS, RandomReceiptSuffix, ReceiptIssuer, ReceiptNumber, ReceiptSuffixSource,
};
pub use self::redemption::{REDEMPTION_VALIDITY_DAYS, Redemption, RedemptionRequest, RewardItem};
pub use self::redemption_service::RedemptionService;
pub use self::school_id::{EnrollmentYear, IdScheme, MAX_SCHOOL_ID_LEN, SchoolId, SchoolIdError};
pub use self::school_id_service::{MAX_ASSIGN_ATTEMPTS, SchoolIdService};
pub use self::telemetry::{
    Detection, DetectionOutcome, DeviceLogEntry, FaultReport, HeartbeatAck, LogType, SortResult,
    TelemetryValidationError, Verification,
};
pub use self::telemetry_service::{TelemetryPorts, TelemetryService};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user_profile::{
    NewAccount, ProfileIdentifier, ProfileValidationError, QrToken, USERNAME_MAX, UserProfile,
    UserType, Username,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use ecodrop::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::unauthorized("missing bearer token"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;

//! Device API handlers.
//!
//! ```text
//! POST /api/device/heartbeat/
//! POST /api/device/detection/
//! POST /api/device/error/
//! POST /api/user/verify/
//! ```
//!
//! Every route is wrapped in [`RequireDeviceKey`], so the bearer key is
//! checked before the payload is read.

use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::domain::{
    Detection, DetectionOutcome, Error, FaultReport, HeartbeatAck, ProfileIdentifier,
    TelemetryValidationError, Verification,
};
use crate::inbound::http::device_auth::{AuthenticatedDevice, RequireDeviceKey};
use crate::inbound::http::idempotency::{extract_idempotency_key, map_idempotency_key_error};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{ApiResult, invalid_json};

/// Heartbeat payload. `device_id` is optional and checked against the key.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct HeartbeatRequestBody {
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HeartbeatResponseBody {
    #[schema(example = "ok")]
    pub status: String,
    /// Device status after the heartbeat.
    #[schema(example = "online")]
    pub device_status: String,
    #[schema(format = "date-time")]
    pub timestamp: String,
}

impl From<HeartbeatAck> for HeartbeatResponseBody {
    fn from(ack: HeartbeatAck) -> Self {
        Self {
            status: "ok".to_owned(),
            device_status: ack.status.to_string(),
            timestamp: ack.timestamp.to_rfc3339(),
        }
    }
}

/// One classified deposit.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DetectionRequestBody {
    #[schema(example = "plastic")]
    pub sort_result: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub sensor_data: Option<Value>,
    /// School id or QR token; required for plastic.
    #[serde(default)]
    #[schema(example = "C25-0008")]
    pub identifier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetectionResponseBody {
    pub points_awarded: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
    pub replayed: bool,
}

impl From<DetectionOutcome> for DetectionResponseBody {
    fn from(outcome: DetectionOutcome) -> Self {
        Self {
            points_awarded: outcome.points_awarded.value(),
            total_points: outcome.total_points.map(|points| points.value()),
            replayed: outcome.replayed,
        }
    }
}

/// Device fault report.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorReportBody {
    #[schema(example = "conveyor jammed")]
    pub message: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub sensor_data: Option<Value>,
    /// Either `error` or `maintenance`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AckBody {
    #[schema(example = "ok")]
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyRequestBody {
    #[schema(example = "SMC-USER-maria-1a2b3c4d")]
    pub identifier: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponseBody {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

impl From<Verification> for VerifyResponseBody {
    fn from(verification: Verification) -> Self {
        Self {
            found: verification.found,
            points: verification.points.map(|points| points.value()),
        }
    }
}

pub(crate) fn map_telemetry_validation_error(err: TelemetryValidationError) -> Error {
    let (field, code) = match &err {
        TelemetryValidationError::UnknownSortResult(_) => ("sort_result", "invalid_sort_result"),
        TelemetryValidationError::MissingIdentifier => ("identifier", "missing_identifier"),
        TelemetryValidationError::UnsupportedFaultStatus(_) => ("status", "invalid_status"),
    };
    Error::invalid_request(err.to_string()).with_details(json!({ "field": field, "code": code }))
}

fn parse_identifier(raw: &str) -> Result<ProfileIdentifier, Error> {
    ProfileIdentifier::new(raw).map_err(|err| {
        Error::invalid_request(err.to_string())
            .with_details(json!({ "field": "identifier", "code": "empty_identifier" }))
    })
}

/// An absent or empty body is a heartbeat without a `device_id`.
fn parse_heartbeat_body(body: &[u8]) -> Result<HeartbeatRequestBody, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(HeartbeatRequestBody::default());
    }
    serde_json::from_slice(body).map_err(invalid_json)
}

/// Record a device heartbeat. The body is optional.
#[utoipa::path(
    post,
    path = "/api/device/heartbeat/",
    request_body = HeartbeatRequestBody,
    responses(
        (status = 200, description = "Heartbeat recorded", body = HeartbeatResponseBody),
        (status = 400, description = "device_id does not match the key", body = ErrorSchema),
        (status = 401, description = "Missing or unknown api key", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["device"],
    operation_id = "deviceHeartbeat",
    security(("DeviceKey" = []))
)]
#[post("/api/device/heartbeat/", wrap = "RequireDeviceKey")]
pub async fn heartbeat(
    state: web::Data<HttpState>,
    device: AuthenticatedDevice,
    payload: web::Bytes,
) -> ApiResult<web::Json<HeartbeatResponseBody>> {
    let body = parse_heartbeat_body(&payload)?;
    let ack = state
        .telemetry
        .heartbeat(device.device(), body.device_id)
        .await?;
    Ok(web::Json(ack.into()))
}

/// Report a classified deposit.
///
/// Plastic detections credit the identified user. Send the same
/// `Idempotency-Key` when retrying so the credit is applied once.
#[utoipa::path(
    post,
    path = "/api/device/detection/",
    request_body = DetectionRequestBody,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "UUID naming this physical event")
    ),
    responses(
        (status = 200, description = "Detection processed", body = DetectionResponseBody),
        (status = 400, description = "Invalid sort_result or identifier", body = ErrorSchema),
        (status = 401, description = "Missing or unknown api key", body = ErrorSchema),
        (status = 404, description = "No user matches the identifier", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["device"],
    operation_id = "deviceDetection",
    security(("DeviceKey" = []))
)]
#[post("/api/device/detection/", wrap = "RequireDeviceKey")]
pub async fn detection(
    state: web::Data<HttpState>,
    device: AuthenticatedDevice,
    request: HttpRequest,
    payload: web::Json<DetectionRequestBody>,
) -> ApiResult<web::Json<DetectionResponseBody>> {
    let event_key =
        extract_idempotency_key(request.headers()).map_err(map_idempotency_key_error)?;
    let DetectionRequestBody {
        sort_result,
        sensor_data,
        identifier,
    } = payload.into_inner();
    let parsed = Detection::parse(&sort_result, sensor_data, identifier.as_deref(), event_key)
        .map_err(map_telemetry_validation_error)?;

    let outcome = state.telemetry.detection(device.device(), parsed).await?;
    Ok(web::Json(outcome.into()))
}

/// Report a device fault.
#[utoipa::path(
    post,
    path = "/api/device/error/",
    request_body = ErrorReportBody,
    responses(
        (status = 200, description = "Fault logged", body = AckBody),
        (status = 400, description = "Unsupported status", body = ErrorSchema),
        (status = 401, description = "Missing or unknown api key", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["device"],
    operation_id = "deviceError",
    security(("DeviceKey" = []))
)]
#[post("/api/device/error/", wrap = "RequireDeviceKey")]
pub async fn report_error(
    state: web::Data<HttpState>,
    device: AuthenticatedDevice,
    payload: web::Json<ErrorReportBody>,
) -> ApiResult<web::Json<AckBody>> {
    let ErrorReportBody {
        message,
        sensor_data,
        status,
    } = payload.into_inner();
    let report = FaultReport::parse(message, sensor_data, status.as_deref())
        .map_err(map_telemetry_validation_error)?;

    state.telemetry.report_fault(device.device(), report).await?;
    Ok(web::Json(AckBody {
        status: "ok".to_owned(),
    }))
}

/// Check whether an identifier names a user, and report their balance.
#[utoipa::path(
    post,
    path = "/api/user/verify/",
    request_body = VerifyRequestBody,
    responses(
        (status = 200, description = "Lookup result", body = VerifyResponseBody),
        (status = 400, description = "Blank identifier", body = ErrorSchema),
        (status = 401, description = "Missing or unknown api key", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema)
    ),
    tags = ["device"],
    operation_id = "verifyUser",
    security(("DeviceKey" = []))
)]
#[post("/api/user/verify/", wrap = "RequireDeviceKey")]
pub async fn verify(
    state: web::Data<HttpState>,
    _device: AuthenticatedDevice,
    payload: web::Json<VerifyRequestBody>,
) -> ApiResult<web::Json<VerifyResponseBody>> {
    let identifier = parse_identifier(&payload.identifier)?;
    let verification = state.telemetry_query.verify(&identifier).await?;
    Ok(web::Json(verification.into()))
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;

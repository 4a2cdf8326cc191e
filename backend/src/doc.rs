//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the device API paths, the health probes, the schema
//! wrappers for domain errors, and the bearer-key security scheme. Swagger UI
//! serves it in debug builds and `openapi-dump` prints it for tooling.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::devices::{
    AckBody, DetectionRequestBody, DetectionResponseBody, ErrorReportBody, HeartbeatRequestBody,
    HeartbeatResponseBody, VerifyRequestBody, VerifyResponseBody,
};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};

/// Registers the kiosk bearer-key scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        let scheme = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .description(Some("Device api key issued by `ecodrop-admin register-device`."))
            .build();
        components.add_security_scheme("DeviceKey", SecurityScheme::Http(scheme));
    }
}

/// OpenAPI document for the device API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "EcoDrop device API",
        description = "Telemetry ingestion for campus recycling kiosks.",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0.html"
        )
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("DeviceKey" = [])),
    paths(
        crate::inbound::http::devices::heartbeat,
        crate::inbound::http::devices::detection,
        crate::inbound::http::devices::report_error,
        crate::inbound::http::devices::verify,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        HeartbeatRequestBody,
        HeartbeatResponseBody,
        DetectionRequestBody,
        DetectionResponseBody,
        ErrorReportBody,
        AckBody,
        VerifyRequestBody,
        VerifyResponseBody,
    )),
    tags(
        (name = "device", description = "Kiosk telemetry and user verification"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

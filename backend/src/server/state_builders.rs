//! Builds the HTTP state from the configured pool.

use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;

use ecodrop::domain::ports::{DeviceAuthentication, TelemetryCommand, TelemetryQuery};
use ecodrop::domain::{DeviceAuthService, Points, TelemetryPorts, TelemetryService};
use ecodrop::inbound::http::state::HttpState;
use ecodrop::outbound::persistence::{
    DbPool, DieselDetectionLedger, DieselDeviceLogRepository, DieselDeviceRepository,
    DieselUserProfileRepository,
};

use super::ServerConfig;

type DieselTelemetryService = TelemetryService<
    DieselDeviceRepository,
    DieselDeviceLogRepository,
    DieselDetectionLedger,
    DieselUserProfileRepository,
>;

fn build_telemetry_service(pool: &DbPool, points_per_bottle: Points) -> DieselTelemetryService {
    TelemetryService::new(
        TelemetryPorts {
            devices: Arc::new(DieselDeviceRepository::new(pool.clone())),
            logs: Arc::new(DieselDeviceLogRepository::new(pool.clone())),
            ledger: Arc::new(DieselDetectionLedger::new(pool.clone())),
            profiles: Arc::new(DieselUserProfileRepository::new(pool.clone())),
        },
        Arc::new(DefaultClock),
        points_per_bottle,
    )
}

/// Wire database-backed ports when a pool is configured; fall back to
/// fixtures otherwise.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let Some(pool) = &config.db_pool else {
        return web::Data::new(HttpState::default());
    };

    let auth: Arc<dyn DeviceAuthentication> = Arc::new(DeviceAuthService::new(Arc::new(
        DieselDeviceRepository::new(pool.clone()),
    )));
    let telemetry = Arc::new(build_telemetry_service(pool, config.points_per_bottle));
    let command: Arc<dyn TelemetryCommand> = telemetry.clone();
    let query: Arc<dyn TelemetryQuery> = telemetry;

    web::Data::new(HttpState::new(auth, command, query))
}

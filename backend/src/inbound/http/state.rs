//! Shared HTTP adapter state.
//!
//! Handlers receive this through `actix_web::web::Data` and only depend on
//! driving ports, so they stay testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    DeviceAuthentication, FixtureDeviceAuthentication, FixtureTelemetryCommand,
    FixtureTelemetryQuery, TelemetryCommand, TelemetryQuery,
};

/// Dependency bundle for the device API.
#[derive(Clone)]
pub struct HttpState {
    pub auth: Arc<dyn DeviceAuthentication>,
    pub telemetry: Arc<dyn TelemetryCommand>,
    pub telemetry_query: Arc<dyn TelemetryQuery>,
}

impl HttpState {
    /// Construct state from the three driving ports.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use ecodrop::domain::ports::{
    ///     FixtureDeviceAuthentication, FixtureTelemetryCommand, FixtureTelemetryQuery,
    /// };
    /// use ecodrop::inbound::http::state::HttpState;
    ///
    /// let state = HttpState::new(
    ///     Arc::new(FixtureDeviceAuthentication),
    ///     Arc::new(FixtureTelemetryCommand),
    ///     Arc::new(FixtureTelemetryQuery),
    /// );
    /// let _auth = state.auth.clone();
    /// ```
    pub fn new(
        auth: Arc<dyn DeviceAuthentication>,
        telemetry: Arc<dyn TelemetryCommand>,
        telemetry_query: Arc<dyn TelemetryQuery>,
    ) -> Self {
        Self {
            auth,
            telemetry,
            telemetry_query,
        }
    }
}

impl Default for HttpState {
    /// Fixture ports: every key is rejected.
    fn default() -> Self {
        Self::new(
            Arc::new(FixtureDeviceAuthentication),
            Arc::new(FixtureTelemetryCommand),
            Arc::new(FixtureTelemetryQuery),
        )
    }
}

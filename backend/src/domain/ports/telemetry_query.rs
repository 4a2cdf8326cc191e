//! Driving port for read-only kiosk lookups.

use async_trait::async_trait;

use crate::domain::{Error, ProfileIdentifier, Verification};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryQuery: Send + Sync {
    /// Whether a profile matches `identifier`, with its balance when it does.
    async fn verify(&self, identifier: &ProfileIdentifier) -> Result<Verification, Error>;
}

/// Fixture implementation that finds nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTelemetryQuery;

#[async_trait]
impl TelemetryQuery for FixtureTelemetryQuery {
    async fn verify(&self, _identifier: &ProfileIdentifier) -> Result<Verification, Error> {
        Ok(Verification {
            found: false,
            points: None,
        })
    }
}

//! Port for the append-only device audit log.

use async_trait::async_trait;

use crate::domain::DeviceLogEntry;

use super::define_port_error;

define_port_error! {
    /// Errors raised by device log adapters.
    pub enum DeviceLogRepositoryError {
        Connection { message: String } =>
            "device log connection failed: {message}",
        Query { message: String } =>
            "device log write failed: {message}",
    }
}

/// Port for appending device log rows. Rows are never updated or deleted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceLogRepository: Send + Sync {
    /// Commit `entry` in its own write, independent of any other transaction.
    async fn append(&self, entry: &DeviceLogEntry) -> Result<(), DeviceLogRepositoryError>;
}

/// Fixture implementation that discards entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDeviceLogRepository;

#[async_trait]
impl DeviceLogRepository for FixtureDeviceLogRepository {
    async fn append(&self, _entry: &DeviceLogEntry) -> Result<(), DeviceLogRepositoryError> {
        Ok(())
    }
}

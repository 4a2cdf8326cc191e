//! PostgreSQL-backed `DeviceLogRepository` implementation using Diesel ORM.
//!
//! Each append commits on its own connection so audit rows survive a
//! rolled-back detection.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::DeviceLogEntry;
use crate::domain::ports::{DeviceLogRepository, DeviceLogRepositoryError};

use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewDeviceLogRow;
use super::pool::{DbPool, PoolError};
use super::schema::device_logs;

/// Diesel-backed implementation of the `DeviceLogRepository` port.
#[derive(Clone)]
pub struct DieselDeviceLogRepository {
    pool: DbPool,
}

impl DieselDeviceLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DeviceLogRepositoryError {
    map_basic_pool_error(error, DeviceLogRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DeviceLogRepositoryError {
    map_basic_diesel_error(
        error,
        DeviceLogRepositoryError::query,
        DeviceLogRepositoryError::connection,
    )
}

/// Insertable row for `entry`.
pub(crate) fn log_row(entry: &DeviceLogEntry) -> NewDeviceLogRow<'_> {
    NewDeviceLogRow {
        device_id: entry.device,
        log_type: entry.log_type.as_str(),
        sort_result: entry.sort_result.map(|r| r.as_str()),
        sensor_data: entry.sensor_data.as_ref(),
        message: &entry.message,
        event_key: entry.event_key.map(|k| *k.as_uuid()),
    }
}

#[async_trait]
impl DeviceLogRepository for DieselDeviceLogRepository {
    async fn append(&self, entry: &DeviceLogEntry) -> Result<(), DeviceLogRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // A repeated event key is a retried request; the first row stands.
        let inserted = diesel::insert_into(device_logs::table)
            .values(&log_row(entry))
            .on_conflict((device_logs::device_id, device_logs::event_key))
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if inserted == 0 {
            debug!(device = %entry.device, log_type = %entry.log_type, "duplicate log entry skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdempotencyKey, LogType, SortResult};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn log_row_carries_every_field() {
        let key = IdempotencyKey::random();
        let entry = DeviceLogEntry::new(Uuid::nil(), LogType::BottleSorted)
            .with_sort_result(SortResult::Invalid)
            .with_sensor_data(Some(json!({ "weight_g": 12 })))
            .with_message("rejected item")
            .with_event_key(Some(key));

        let row = log_row(&entry);
        assert_eq!(row.log_type, "bottle_sorted");
        assert_eq!(row.sort_result, Some("invalid"));
        assert_eq!(row.sensor_data, Some(&json!({ "weight_g": 12 })));
        assert_eq!(row.message, "rejected item");
        assert_eq!(row.event_key, Some(*key.as_uuid()));
    }

    #[test]
    fn heartbeat_row_has_no_sort_result() {
        let entry = DeviceLogEntry::new(Uuid::nil(), LogType::Heartbeat).with_message("heartbeat");
        let row = log_row(&entry);
        assert_eq!(row.sort_result, None);
        assert_eq!(row.event_key, None);
    }
}

//! PostgreSQL-backed `DeviceRepository` implementation using Diesel ORM.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{DeviceCredential, DeviceRepository, DeviceRepositoryError, NewDevice};
use crate::domain::{ApiKeyDigest, Device, DeviceCode, DeviceStatus};

use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error, unique_violation};
use super::models::{DeviceRow, NewDeviceRow};
use super::pool::{DbPool, PoolError};
use super::schema::devices;

/// Diesel-backed implementation of the `DeviceRepository` port.
#[derive(Clone)]
pub struct DieselDeviceRepository {
    pool: DbPool,
}

impl DieselDeviceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DeviceRepositoryError {
    map_basic_pool_error(error, DeviceRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DeviceRepositoryError {
    map_basic_diesel_error(
        error,
        DeviceRepositoryError::query,
        DeviceRepositoryError::connection,
    )
}

/// Like [`map_diesel_error`], but a missing row means the device is gone.
fn map_device_update_error(
    device: Uuid,
) -> impl Fn(diesel::result::Error) -> DeviceRepositoryError {
    move |error| match error {
        diesel::result::Error::NotFound => DeviceRepositoryError::not_found(device),
        other => map_diesel_error(other),
    }
}

fn map_register_error(error: diesel::result::Error) -> DeviceRepositoryError {
    match unique_violation(&error) {
        Some(constraint) if constraint.contains("api_key_digest") => {
            DeviceRepositoryError::duplicate_key()
        }
        _ => map_diesel_error(error),
    }
}

fn row_to_device(row: DeviceRow) -> Result<DeviceCredential, DeviceRepositoryError> {
    let device_id = DeviceCode::new(&row.device_id).map_err(|err| {
        DeviceRepositoryError::query(format!("stored device_id {:?}: {err}", row.device_id))
    })?;
    let status = DeviceStatus::from_str(&row.status).map_err(|err| {
        DeviceRepositoryError::query(format!("stored status {:?}: {err}", row.status))
    })?;
    let total_bottles_processed = u64::try_from(row.total_bottles_processed)
        .map_err(|_| DeviceRepositoryError::query("total_bottles_processed is negative"))?;
    let digest = ApiKeyDigest::from_slice(&row.api_key_digest)
        .ok_or_else(|| DeviceRepositoryError::query("stored api key digest has wrong length"))?;

    Ok(DeviceCredential {
        device: Device {
            id: row.id,
            device_id,
            device_name: row.device_name,
            location: row.location,
            status,
            last_heartbeat: row.last_heartbeat,
            total_bottles_processed,
        },
        digest,
    })
}

#[async_trait]
impl DeviceRepository for DieselDeviceRepository {
    async fn find_by_key_digest(
        &self,
        digest: &ApiKeyDigest,
    ) -> Result<Option<DeviceCredential>, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<DeviceRow> = devices::table
            .filter(devices::api_key_digest.eq(digest.as_bytes().as_slice()))
            .select(DeviceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_device).transpose()
    }

    async fn record_heartbeat(
        &self,
        device: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Device, DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = conn
            .transaction(|conn| {
                async move {
                    let current: DeviceRow = devices::table
                        .find(device)
                        .select(DeviceRow::as_select())
                        .for_update()
                        .first(conn)
                        .await?;
                    // Unparseable statuses are surfaced by row_to_device below.
                    let status = DeviceStatus::from_str(&current.status)
                        .map(DeviceStatus::after_heartbeat)
                        .map_or(current.status, |s| s.as_str().to_owned());

                    diesel::update(devices::table.find(device))
                        .set((
                            devices::last_heartbeat.eq(Some(at)),
                            devices::status.eq(status),
                            devices::updated_at.eq(at),
                        ))
                        .returning(DeviceRow::as_returning())
                        .get_result(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_device_update_error(device))?;

        row_to_device(row).map(|credential| credential.device)
    }

    async fn set_status(
        &self,
        device: Uuid,
        status: DeviceStatus,
    ) -> Result<(), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(devices::table.find(device))
            .set((
                devices::status.eq(status.as_str()),
                devices::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(DeviceRepositoryError::not_found(device));
        }
        Ok(())
    }

    async fn register(&self, device: &NewDevice) -> Result<(Device, bool), DeviceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let digest = device.digest.as_bytes().to_vec();

        let (row, rotated) = conn
            .transaction(|conn| {
                async move {
                    let existing: Option<Uuid> = devices::table
                        .filter(devices::device_id.eq(device.device_id.as_ref()))
                        .select(devices::id)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;

                    if existing.is_none() {
                        let inserted = diesel::insert_into(devices::table)
                            .values(&NewDeviceRow {
                                id: Uuid::new_v4(),
                                device_id: device.device_id.as_ref(),
                                device_name: &device.device_name,
                                location: &device.location,
                                api_key_digest: digest.as_slice(),
                            })
                            .on_conflict(devices::device_id)
                            .do_nothing()
                            .returning(DeviceRow::as_returning())
                            .get_result(conn)
                            .await
                            .optional()?;
                        if let Some(row) = inserted {
                            return Ok((row, false));
                        }
                        // A concurrent registration created the row first.
                        debug!(device_id = %device.device_id, "registration raced; rotating");
                    }

                    let row = diesel::update(
                        devices::table.filter(devices::device_id.eq(device.device_id.as_ref())),
                    )
                    .set((
                        devices::device_name.eq(&device.device_name),
                        devices::location.eq(&device.location),
                        devices::api_key_digest.eq(digest.as_slice()),
                        devices::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(DeviceRow::as_returning())
                    .get_result(conn)
                    .await?;
                    Ok((row, true))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_register_error)?;

        Ok((row_to_device(row)?.device, rotated))
    }
}

//! PostgreSQL-backed `DetectionLedger`: the atomic plastic-detection write.
//!
//! One transaction resolves the profile, claims the event key, credits the
//! balance, records the entry and bumps the device counter. Either all of it
//! commits or none of it does.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    DetectionCommit, DetectionLedger, DetectionLedgerError, PlasticDetection,
};
use crate::domain::{DeviceLogEntry, LogType, Points, ProfileIdentifier, SortResult};

use super::diesel_device_log_repository::log_row;
use super::diesel_point_ledger::{lock_balance, store_balance};
use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::NewEntryRow;
use super::pool::{DbPool, PoolError};
use super::schema::{device_logs, devices, entries, user_profiles};

/// Diesel-backed implementation of the `DetectionLedger` port.
#[derive(Clone)]
pub struct DieselDetectionLedger {
    pool: DbPool,
}

impl DieselDetectionLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DetectionLedgerError {
    map_basic_pool_error(error, DetectionLedgerError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DetectionLedgerError {
    map_basic_diesel_error(
        error,
        DetectionLedgerError::query,
        DetectionLedgerError::connection,
    )
}

impl From<diesel::result::Error> for DetectionLedgerError {
    fn from(error: diesel::result::Error) -> Self {
        map_diesel_error(error)
    }
}

/// Resolve `identifier` to a profile id: school id first, then QR token.
pub(crate) async fn resolve_profile<C>(
    conn: &mut C,
    identifier: &ProfileIdentifier,
) -> QueryResult<Option<Uuid>>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let by_school_id = user_profiles::table
        .filter(user_profiles::school_id.eq(identifier.as_ref()))
        .select(user_profiles::id)
        .first(conn)
        .await
        .optional()?;
    if by_school_id.is_some() {
        return Ok(by_school_id);
    }

    user_profiles::table
        .filter(user_profiles::qr_code_data.eq(identifier.as_ref()))
        .select(user_profiles::id)
        .first(conn)
        .await
        .optional()
}

fn stored_points(profile: Uuid, value: i32) -> Result<Points, DetectionLedgerError> {
    Points::from_stored(value)
        .ok_or_else(|| DetectionLedgerError::query(format!("profile {profile} has negative balance")))
}

fn credit_log(detection: &PlasticDetection, profile: Uuid) -> DeviceLogEntry {
    DeviceLogEntry::new(detection.device, LogType::BottleSorted)
        .with_sort_result(SortResult::Plastic)
        .with_sensor_data(detection.sensor_data.clone())
        .with_message(format!(
            "credited {} points to profile {profile}",
            detection.points
        ))
        .with_event_key(detection.event_key)
}

async fn commit<C>(
    conn: &mut C,
    detection: &PlasticDetection,
) -> Result<DetectionCommit, DetectionLedgerError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let Some(profile) = resolve_profile(conn, &detection.identifier).await? else {
        return Ok(DetectionCommit::UserNotFound);
    };
    let Some(stored) = lock_balance(conn, profile).await? else {
        return Ok(DetectionCommit::UserNotFound);
    };
    let balance = stored_points(profile, stored)?;

    // The credit log row doubles as the idempotency claim.
    let claimed = diesel::insert_into(device_logs::table)
        .values(&log_row(&credit_log(detection, profile)))
        .on_conflict((device_logs::device_id, device_logs::event_key))
        .do_nothing()
        .execute(conn)
        .await?;
    if claimed == 0 {
        debug!(%profile, "event key already committed");
        return Ok(DetectionCommit::Replayed {
            profile,
            total_points: balance,
        });
    }

    let total_points = balance
        .credit(detection.points)
        .map_err(|_| DetectionLedgerError::balance_overflow(profile))?;
    store_balance(conn, profile, total_points).await?;

    diesel::insert_into(entries::table)
        .values(&NewEntryRow {
            user_profile_id: profile,
            no_bottle: 1,
            points: detection.points.as_i32(),
        })
        .execute(conn)
        .await?;

    diesel::update(devices::table.find(detection.device))
        .set((
            devices::total_bottles_processed.eq(devices::total_bottles_processed + 1_i64),
            devices::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

    Ok(DetectionCommit::Credited {
        profile,
        total_points,
    })
}

#[async_trait]
impl DetectionLedger for DieselDetectionLedger {
    async fn commit_plastic(
        &self,
        detection: &PlasticDetection,
    ) -> Result<DetectionCommit, DetectionLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| async move { commit(conn, detection).await }.scope_boxed())
            .await
    }
}

//! PostgreSQL-backed `RedemptionRepository` implementation using Diesel ORM.
//!
//! A redemption debits the balance and inserts its receipt in one
//! transaction. Receipt candidates are tried in order with
//! `ON CONFLICT DO NOTHING`; the first that inserts wins.

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{RedemptionRepository, RedemptionRepositoryError};
use crate::domain::{
    Points, PointsError, ReceiptNumber, Redemption, RedemptionRequest, RewardItem,
};

use super::diesel_point_ledger::{lock_balance, store_balance};
use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{NewRedemptionRow, NewRewardItemRow, RedemptionRow, RewardItemRow};
use super::pool::{DbPool, PoolError};
use super::schema::{redeemed_points, reward_items};

/// Diesel-backed implementation of the `RedemptionRepository` port.
#[derive(Clone)]
pub struct DieselRedemptionRepository {
    pool: DbPool,
}

impl DieselRedemptionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> RedemptionRepositoryError {
    map_basic_pool_error(error, RedemptionRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> RedemptionRepositoryError {
    map_basic_diesel_error(
        error,
        RedemptionRepositoryError::query,
        RedemptionRepositoryError::connection,
    )
}

impl From<diesel::result::Error> for RedemptionRepositoryError {
    fn from(error: diesel::result::Error) -> Self {
        map_diesel_error(error)
    }
}

fn row_to_reward(row: RewardItemRow) -> Result<RewardItem, RedemptionRepositoryError> {
    let points_required = Points::from_stored(row.points_required).ok_or_else(|| {
        RedemptionRepositoryError::query(format!("reward {} has negative cost", row.id))
    })?;
    Ok(RewardItem {
        id: row.id,
        reward_name: row.reward_name,
        points_required,
    })
}

fn row_to_redemption(
    row: RedemptionRow,
    remaining_points: Points,
) -> Result<Redemption, RedemptionRepositoryError> {
    let redeemed_points = Points::from_stored(row.redeemed_points)
        .ok_or_else(|| RedemptionRepositoryError::query("negative redeemed_points"))?;
    let quantity = u32::try_from(row.quantity)
        .map_err(|_| RedemptionRepositoryError::query("negative quantity"))?;
    Ok(Redemption {
        id: row.id,
        profile_id: row.user_profile_id,
        reward_item_id: row.reward_item_id,
        redeemed_points,
        quantity,
        receipt_number: ReceiptNumber::from_stored(row.receipt_number),
        created_at: row.created_at,
        remaining_points,
    })
}

fn map_debit_error(error: PointsError) -> RedemptionRepositoryError {
    match error {
        PointsError::Insufficient { balance, requested } => {
            RedemptionRepositoryError::insufficient_points(balance.value(), requested.value())
        }
        PointsError::Overflow => RedemptionRepositoryError::query("redemption cost overflow"),
    }
}

async fn redeem_locked<C>(
    conn: &mut C,
    request: &RedemptionRequest,
    cost: Points,
    receipt_candidates: &[ReceiptNumber],
) -> Result<Redemption, RedemptionRepositoryError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let profile = request.profile_id;
    let Some(stored) = lock_balance(conn, profile).await? else {
        return Err(RedemptionRepositoryError::profile_not_found());
    };
    let balance = Points::from_stored(stored)
        .ok_or_else(|| RedemptionRepositoryError::query("negative balance"))?;
    let remaining = balance.debit(cost).map_err(map_debit_error)?;
    let quantity = i32::try_from(request.quantity)
        .map_err(|_| RedemptionRepositoryError::query("quantity out of range"))?;

    for candidate in receipt_candidates {
        let inserted: Option<RedemptionRow> = diesel::insert_into(redeemed_points::table)
            .values(&NewRedemptionRow {
                user_profile_id: profile,
                reward_item_id: request.reward_item_id,
                redeemed_points: cost.as_i32(),
                quantity,
                receipt_number: candidate.as_ref(),
            })
            .on_conflict(redeemed_points::receipt_number)
            .do_nothing()
            .returning(RedemptionRow::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        match inserted {
            Some(row) => {
                store_balance(conn, profile, remaining).await?;
                return row_to_redemption(row, remaining);
            }
            None => debug!(receipt = %candidate, "receipt number taken; trying next"),
        }
    }

    Err(RedemptionRepositoryError::receipt_space_exhausted(
        receipt_candidates.len(),
    ))
}

#[async_trait]
impl RedemptionRepository for DieselRedemptionRepository {
    async fn find_reward(&self, id: i64) -> Result<Option<RewardItem>, RedemptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<RewardItemRow> = reward_items::table
            .find(id)
            .select(RewardItemRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_reward).transpose()
    }

    async fn add_reward(
        &self,
        reward_name: &str,
        points_required: Points,
    ) -> Result<RewardItem, RedemptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: RewardItemRow = diesel::insert_into(reward_items::table)
            .values(&NewRewardItemRow {
                reward_name,
                points_required: points_required.as_i32(),
            })
            .returning(RewardItemRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        row_to_reward(row)
    }

    async fn redeem(
        &self,
        request: &RedemptionRequest,
        cost: Points,
        receipt_candidates: &[ReceiptNumber],
    ) -> Result<Redemption, RedemptionRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move { redeem_locked(conn, request, cost, receipt_candidates).await }
                .scope_boxed()
        })
        .await
    }
}

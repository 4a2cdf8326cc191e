//! Point balances: the read-side `PointLedger` adapter and the
//! connection-scoped balance helpers used inside detection and redemption
//! transactions.
//!
//! Balances are only ever written through [`store_balance`] after
//! [`lock_balance`] has taken the profile row lock, so concurrent credits
//! and debits serialise per profile.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::dsl::sum;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{PointLedger, PointLedgerError};
use crate::domain::{LedgerDiscrepancy, Points};

use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::pool::{DbPool, PoolError};
use super::schema::{entries, redeemed_points, user_profiles};

/// Lock `profile` for update and return its stored balance.
pub(crate) async fn lock_balance<C>(conn: &mut C, profile: Uuid) -> QueryResult<Option<i32>>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    user_profiles::table
        .find(profile)
        .select(user_profiles::total_points)
        .for_update()
        .first(conn)
        .await
        .optional()
}

/// Overwrite the balance of a profile locked by [`lock_balance`].
pub(crate) async fn store_balance<C>(
    conn: &mut C,
    profile: Uuid,
    balance: Points,
) -> QueryResult<()>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    diesel::update(user_profiles::table.find(profile))
        .set((
            user_profiles::total_points.eq(balance.as_i32()),
            user_profiles::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .map(|_| ())
}

/// Diesel-backed implementation of the `PointLedger` port.
#[derive(Clone)]
pub struct DieselPointLedger {
    pool: DbPool,
}

impl DieselPointLedger {
    /// Create a new ledger reader with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> PointLedgerError {
    map_basic_pool_error(error, PointLedgerError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> PointLedgerError {
    map_basic_diesel_error(error, PointLedgerError::query, PointLedgerError::connection)
}

/// Profiles whose recorded balance differs from their history.
fn reconcile(
    balances: Vec<(Uuid, i32)>,
    earned: Vec<(Uuid, Option<i64>)>,
    redeemed: Vec<(Uuid, Option<i64>)>,
) -> Vec<LedgerDiscrepancy> {
    let earned: HashMap<Uuid, i64> = earned
        .into_iter()
        .map(|(id, total)| (id, total.unwrap_or(0)))
        .collect();
    let redeemed: HashMap<Uuid, i64> = redeemed
        .into_iter()
        .map(|(id, total)| (id, total.unwrap_or(0)))
        .collect();

    balances
        .into_iter()
        .map(|(profile_id, recorded)| LedgerDiscrepancy {
            profile_id,
            recorded: i64::from(recorded),
            earned: earned.get(&profile_id).copied().unwrap_or(0),
            redeemed: redeemed.get(&profile_id).copied().unwrap_or(0),
        })
        .filter(|d| d.recorded != d.expected())
        .collect()
}

#[async_trait]
impl PointLedger for DieselPointLedger {
    async fn balance(&self, profile: Uuid) -> Result<Option<Points>, PointLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored: Option<i32> = user_profiles::table
            .find(profile)
            .select(user_profiles::total_points)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        stored
            .map(|value| {
                Points::from_stored(value).ok_or_else(|| {
                    PointLedgerError::query(format!("profile {profile} has negative balance"))
                })
            })
            .transpose()
    }

    async fn discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, PointLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // One snapshot across all three reads.
        let (balances, earned, redeemed) = conn
            .build_transaction()
            .repeatable_read()
            .read_only()
            .run(|conn| {
                async move {
                    let balances: Vec<(Uuid, i32)> = user_profiles::table
                        .select((user_profiles::id, user_profiles::total_points))
                        .order_by(user_profiles::id)
                        .load(conn)
                        .await?;
                    let earned: Vec<(Uuid, Option<i64>)> = entries::table
                        .group_by(entries::user_profile_id)
                        .select((entries::user_profile_id, sum(entries::points)))
                        .load(conn)
                        .await?;
                    let redeemed: Vec<(Uuid, Option<i64>)> = redeemed_points::table
                        .group_by(redeemed_points::user_profile_id)
                        .select((
                            redeemed_points::user_profile_id,
                            sum(redeemed_points::points_redeemed),
                        ))
                        .load(conn)
                        .await?;
                    Ok::<_, diesel::result::Error>((balances, earned, redeemed))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        Ok(reconcile(balances, earned, redeemed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn consistent_profiles_are_not_reported() {
        let id = Uuid::new_v4();
        let found = reconcile(vec![(id, 7)], vec![(id, Some(10))], vec![(id, Some(3))]);
        assert!(found.is_empty());
    }

    #[rstest]
    fn profiles_without_history_expect_zero() {
        let idle = Uuid::new_v4();
        let drifted = Uuid::new_v4();
        let found = reconcile(vec![(idle, 0), (drifted, 4)], vec![], vec![]);
        assert_eq!(
            found,
            vec![LedgerDiscrepancy {
                profile_id: drifted,
                recorded: 4,
                earned: 0,
                redeemed: 0,
            }]
        );
    }

    #[rstest]
    fn reports_mismatch_with_components() {
        let id = Uuid::new_v4();
        let found = reconcile(vec![(id, 100)], vec![(id, Some(120))], vec![(id, Some(30))]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].expected(), 90);
    }
}

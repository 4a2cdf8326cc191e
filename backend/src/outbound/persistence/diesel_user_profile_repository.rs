//! PostgreSQL-backed `UserProfileRepository` implementation using Diesel ORM.

use std::str::FromStr;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{UserProfileRepository, UserProfileRepositoryError};
use crate::domain::{
    NewAccount, Points, ProfileIdentifier, QrToken, SchoolId, UserProfile, UserType,
};

use super::diesel_detection_ledger::resolve_profile;
use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error, violates_unique};
use super::models::{NewAccountRow, NewUserProfileRow, UserProfileRow};
use super::pool::{DbPool, PoolError};
use super::schema::{accounts, user_profiles};

/// Diesel-backed implementation of the `UserProfileRepository` port.
#[derive(Clone)]
pub struct DieselUserProfileRepository {
    pool: DbPool,
}

impl DieselUserProfileRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserProfileRepositoryError {
    map_basic_pool_error(error, UserProfileRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserProfileRepositoryError {
    map_basic_diesel_error(
        error,
        UserProfileRepositoryError::query,
        UserProfileRepositoryError::connection,
    )
}

fn map_create_error(
    account: &NewAccount,
) -> impl Fn(diesel::result::Error) -> UserProfileRepositoryError + '_ {
    move |error| {
        if violates_unique(&error, "username") {
            UserProfileRepositoryError::duplicate_username(account.username.as_ref())
        } else if violates_unique(&error, "school_id") {
            UserProfileRepositoryError::duplicate_school_id(
                account
                    .school_id
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string),
            )
        } else if violates_unique(&error, "qr_code_data") {
            UserProfileRepositoryError::duplicate_qr_token()
        } else {
            map_diesel_error(error)
        }
    }
}

fn row_to_profile(
    row: UserProfileRow,
    username: String,
) -> Result<UserProfile, UserProfileRepositoryError> {
    let user_type = UserType::from_str(&row.user_type).map_err(|err| {
        UserProfileRepositoryError::query(format!("stored user_type {:?}: {err}", row.user_type))
    })?;
    let school_id = row
        .school_id
        .map(SchoolId::new)
        .transpose()
        .map_err(|err| UserProfileRepositoryError::query(format!("stored school_id: {err}")))?;
    let total_points = Points::from_stored(row.total_points).ok_or_else(|| {
        UserProfileRepositoryError::query(format!("profile {} has negative balance", row.id))
    })?;

    Ok(UserProfile {
        id: row.id,
        username,
        school_id,
        qr_code_data: row.qr_code_data,
        user_type,
        total_points,
    })
}

#[async_trait]
impl UserProfileRepository for DieselUserProfileRepository {
    async fn find_by_identifier(
        &self,
        identifier: &ProfileIdentifier,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        let profile = {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            resolve_profile(&mut conn, identifier)
                .await
                .map_err(map_diesel_error)?
        };
        match profile {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<(UserProfileRow, String)> = user_profiles::table
            .inner_join(accounts::table)
            .filter(user_profiles::id.eq(id))
            .select((UserProfileRow::as_select(), accounts::username))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(|(row, username)| row_to_profile(row, username))
            .transpose()
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<(UserProfileRow, String)> = user_profiles::table
            .inner_join(accounts::table)
            .filter(accounts::username.eq(username))
            .select((UserProfileRow::as_select(), accounts::username))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(|(row, username)| row_to_profile(row, username))
            .transpose()
    }

    async fn create_account(
        &self,
        account: &NewAccount,
        qr_token: &QrToken,
    ) -> Result<UserProfile, UserProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let account_id = Uuid::new_v4();
        let profile_id = Uuid::new_v4();

        let row = conn
            .transaction(|conn| {
                async move {
                    diesel::insert_into(accounts::table)
                        .values(&NewAccountRow {
                            id: account_id,
                            username: account.username.as_ref(),
                        })
                        .execute(conn)
                        .await?;

                    diesel::insert_into(user_profiles::table)
                        .values(&NewUserProfileRow {
                            id: profile_id,
                            account_id,
                            school_id: account.school_id.as_ref().map(AsRef::as_ref),
                            qr_code_data: Some(qr_token.as_ref()),
                            user_type: account.user_type.as_str(),
                        })
                        .returning(UserProfileRow::as_returning())
                        .get_result(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_create_error(account))?;

        row_to_profile(row, account.username.to_string())
    }
}

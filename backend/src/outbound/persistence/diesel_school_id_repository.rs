//! PostgreSQL-backed `SchoolIdRepository` implementation using Diesel ORM.
//!
//! Generation serialises per identifier space: the `school_id_scopes` row
//! for the scheme is locked `FOR UPDATE` before the greatest identifier is
//! read, so two concurrent assignments in one space cannot compute the same
//! successor. The unique constraint on `user_profiles.school_id` remains the
//! backstop for manual assignments racing a generated one.

use async_trait::async_trait;
use diesel::dsl::sql;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{SchoolIdRepository, SchoolIdRepositoryError};
use crate::domain::{IdScheme, SchoolId, SchoolIdError};

use super::error_mapping::{map_basic_diesel_error, map_basic_pool_error, violates_unique};
use super::models::NewSchoolIdScopeRow;
use super::pool::{DbPool, PoolError};
use super::schema::{school_id_scopes, user_profiles};

/// Diesel-backed implementation of the `SchoolIdRepository` port.
#[derive(Clone)]
pub struct DieselSchoolIdRepository {
    pool: DbPool,
}

impl DieselSchoolIdRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SchoolIdRepositoryError {
    map_basic_pool_error(error, SchoolIdRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> SchoolIdRepositoryError {
    map_basic_diesel_error(
        error,
        SchoolIdRepositoryError::query,
        SchoolIdRepositoryError::connection,
    )
}

impl From<diesel::result::Error> for SchoolIdRepositoryError {
    fn from(error: diesel::result::Error) -> Self {
        map_diesel_error(error)
    }
}

fn map_scheme_error(error: SchoolIdError) -> SchoolIdRepositoryError {
    match error {
        SchoolIdError::Exhausted { scope } => SchoolIdRepositoryError::exhausted(scope),
        other => SchoolIdRepositoryError::query(other.to_string()),
    }
}

/// Greatest well-formed identifier in `scheme`. Fixed-width numeric parts
/// make the text order numeric.
async fn greatest<C>(conn: &mut C, scheme: IdScheme) -> QueryResult<Option<String>>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    user_profiles::table
        .filter(user_profiles::school_id.like(format!("{}%", scheme.prefix())))
        .filter(sql::<Bool>("school_id ~ ").bind::<Text, _>(scheme.pattern()))
        .select(user_profiles::school_id.assume_not_null())
        .order_by(user_profiles::school_id.desc())
        .first(conn)
        .await
        .optional()
}

/// Set `profile`'s school id, translating a unique violation into `Taken`.
async fn write_school_id<C>(
    conn: &mut C,
    profile: Uuid,
    school_id: &SchoolId,
) -> Result<(), SchoolIdRepositoryError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let updated = diesel::update(user_profiles::table.find(profile))
        .set((
            user_profiles::school_id.eq(school_id.as_ref()),
            user_profiles::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .map_err(|error| {
            if violates_unique(&error, "school_id") {
                SchoolIdRepositoryError::taken(school_id.as_ref())
            } else {
                map_diesel_error(error)
            }
        })?;

    if updated == 0 {
        return Err(SchoolIdRepositoryError::profile_not_found(profile));
    }
    Ok(())
}

async fn assign_next_locked<C>(
    conn: &mut C,
    profile: Uuid,
    scheme: IdScheme,
) -> Result<SchoolId, SchoolIdRepositoryError>
where
    C: AsyncConnection<Backend = Pg> + Send,
{
    let scope = scheme.scope_key();
    diesel::insert_into(school_id_scopes::table)
        .values(&NewSchoolIdScopeRow { scope: &scope })
        .on_conflict(school_id_scopes::scope)
        .do_nothing()
        .execute(conn)
        .await?;
    school_id_scopes::table
        .find(scope.as_str())
        .select(school_id_scopes::scope)
        .for_update()
        .first::<String>(conn)
        .await?;

    let last = greatest(conn, scheme).await?;
    let next = scheme.next_after(last.as_deref()).map_err(map_scheme_error)?;
    debug!(%scope, last = ?last, next = %next, "school id computed");

    write_school_id(conn, profile, &next).await?;
    Ok(next)
}

#[async_trait]
impl SchoolIdRepository for DieselSchoolIdRepository {
    async fn greatest_in_scheme(
        &self,
        scheme: IdScheme,
    ) -> Result<Option<String>, SchoolIdRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        greatest(&mut conn, scheme).await.map_err(map_diesel_error)
    }

    async fn assign_next(
        &self,
        profile: Uuid,
        scheme: IdScheme,
    ) -> Result<SchoolId, SchoolIdRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move { assign_next_locked(conn, profile, scheme).await }.scope_boxed()
        })
        .await
    }

    async fn assign(
        &self,
        profile: Uuid,
        school_id: &SchoolId,
    ) -> Result<(), SchoolIdRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        write_school_id(&mut conn, profile, school_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_scheme_keeps_its_scope() {
        let err = map_scheme_error(SchoolIdError::Exhausted {
            scope: "student:25".into(),
        });
        assert_eq!(err, SchoolIdRepositoryError::exhausted("student:25"));
    }

    #[test]
    fn other_scheme_errors_are_query_errors() {
        let err = map_scheme_error(SchoolIdError::Empty);
        assert!(matches!(err, SchoolIdRepositoryError::Query { .. }));
    }
}

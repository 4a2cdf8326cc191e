//! Shared Diesel and pool error mapping for the repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a repository-specific connection error constructor.
pub(crate) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map common Diesel error variants into query/connection constructors.
///
/// Database messages are kept so operators can see which constraint fired;
/// the HTTP layer redacts them for internal errors.
pub(crate) fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(String) -> E,
    C: Fn(String) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = ?info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found".to_owned()),
        DieselError::QueryBuilderError(_) => query("database query error".to_owned()),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            connection(info.message().to_owned())
        }
        DieselError::DatabaseError(_, info) => query(info.message().to_owned()),
        other => query(other.to_string()),
    }
}

/// Constraint named by a unique violation, if `error` is one.
///
/// Postgres always reports the constraint; the message fallback covers
/// drivers that do not.
pub(crate) fn unique_violation(error: &DieselError) -> Option<String> {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => Some(
            info.constraint_name()
                .map_or_else(|| info.message().to_owned(), str::to_owned),
        ),
        _ => None,
    }
}

/// Whether `error` is a unique violation whose constraint mentions `column`.
pub(crate) fn violates_unique(error: &DieselError, column: &str) -> bool {
    unique_violation(error).is_some_and(|constraint| constraint.contains(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    #[derive(Debug)]
    struct StubInfo {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for StubInfo {
        fn message(&self) -> &str {
            self.message
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(
        kind: DatabaseErrorKind,
        message: &'static str,
        constraint: Option<&'static str>,
    ) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(StubInfo { message, constraint }))
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Probe {
        Query(String),
        Connection(String),
    }

    #[rstest]
    fn closed_connection_maps_to_connection() {
        let mapped = map_basic_diesel_error(
            database_error(DatabaseErrorKind::ClosedConnection, "server closed", None),
            Probe::Query,
            Probe::Connection,
        );
        assert_eq!(mapped, Probe::Connection("server closed".into()));
    }

    #[rstest]
    fn not_found_maps_to_query() {
        let mapped = map_basic_diesel_error(DieselError::NotFound, Probe::Query, Probe::Connection);
        assert_eq!(mapped, Probe::Query("record not found".into()));
    }

    #[rstest]
    fn pool_errors_keep_their_message() {
        let mapped = map_basic_pool_error(PoolError::checkout("timed out"), Probe::Connection);
        assert_eq!(mapped, Probe::Connection("timed out".into()));
    }

    #[rstest]
    #[case(Some("user_profiles_school_id_key"), "school_id", true)]
    #[case(Some("user_profiles_school_id_key"), "qr_code_data", false)]
    #[case(None, "receipt_number", true)]
    fn unique_violation_matches_constraint(
        #[case] constraint: Option<&'static str>,
        #[case] column: &str,
        #[case] expected: bool,
    ) {
        let error = database_error(
            DatabaseErrorKind::UniqueViolation,
            "duplicate key value violates unique constraint on receipt_number",
            constraint,
        );
        assert_eq!(violates_unique(&error, column), expected);
    }

    #[rstest]
    fn other_errors_are_not_unique_violations() {
        let error = database_error(DatabaseErrorKind::CheckViolation, "check failed", None);
        assert!(unique_violation(&error).is_none());
    }
}

//! Shared helper utilities for backend integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`; each
//! suite declares `mod support;` and pulls the embedded PostgreSQL harness
//! from here.

#![allow(dead_code, reason = "each suite uses a different subset of helpers")]

pub mod cluster_skip;
pub mod embedded_postgres;

pub use cluster_skip::handle_cluster_setup_failure;
pub use embedded_postgres::{TestDatabase, provision_template_database, shared_cluster};

use postgres::{Client, NoTls};

/// Render a `postgres` error with enough detail to be useful in CI logs.
///
/// The `postgres::Error` `Display` implementation often collapses database
/// errors to a generic `db error`, which hides the message and SQLSTATE.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );

    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }

    if let Some(hint) = db_error.hint() {
        summary.push_str("; hint: ");
        summary.push_str(hint);
    }

    summary
}

/// Run a scalar `COUNT(*)`-style query over a raw client.
///
/// Must be called outside the Tokio runtime; the `postgres` client blocks.
pub fn count_rows(url: &str, sql: &str) -> i64 {
    let mut client = Client::connect(url, NoTls)
        .unwrap_or_else(|err| panic!("connect: {}", format_postgres_error(&err)));
    let row = client
        .query_one(sql, &[])
        .unwrap_or_else(|err| panic!("{sql}: {}", format_postgres_error(&err)));
    row.get(0)
}

/// Execute raw statements, typically to corrupt state for audit scenarios.
pub fn execute_raw(url: &str, sql: &str) {
    let mut client = Client::connect(url, NoTls)
        .unwrap_or_else(|err| panic!("connect: {}", format_postgres_error(&err)));
    client
        .batch_execute(sql)
        .unwrap_or_else(|err| panic!("{sql}: {}", format_postgres_error(&err)));
}

//! Port for reading and auditing point balances.
//!
//! Credits and debits never happen through this port on their own; they
//! ride inside the detection and redemption transactions so a balance
//! change always commits with the entry or redemption that explains it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{LedgerDiscrepancy, Points};

use super::define_port_error;

define_port_error! {
    /// Errors raised by ledger adapters.
    pub enum PointLedgerError {
        Connection { message: String } =>
            "point ledger connection failed: {message}",
        Query { message: String } =>
            "point ledger query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PointLedger: Send + Sync {
    /// Current balance of `profile`, or `None` when it does not exist.
    async fn balance(&self, profile: Uuid) -> Result<Option<Points>, PointLedgerError>;

    /// Profiles whose balance differs from earned minus redeemed.
    async fn discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, PointLedgerError>;
}

/// Fixture implementation with a consistent, empty ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePointLedger;

#[async_trait]
impl PointLedger for FixturePointLedger {
    async fn balance(&self, _profile: Uuid) -> Result<Option<Points>, PointLedgerError> {
        Ok(None)
    }

    async fn discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, PointLedgerError> {
        Ok(Vec::new())
    }
}

//! Balance reads and the earned-minus-redeemed audit.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::domain::ports::{PointLedger, PointLedgerError};
use crate::domain::{Error, LedgerDiscrepancy, Points};

#[derive(Clone)]
pub struct LedgerAuditService<L> {
    ledger: Arc<L>,
}

impl<L> LedgerAuditService<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }
}

fn map_ledger_error(error: PointLedgerError) -> Error {
    match error {
        PointLedgerError::Connection { message } => {
            Error::service_unavailable(format!("point ledger unavailable: {message}"))
        }
        PointLedgerError::Query { message } => {
            Error::internal(format!("point ledger error: {message}"))
        }
    }
}

impl<L> LedgerAuditService<L>
where
    L: PointLedger,
{
    pub async fn balance(&self, profile: Uuid) -> Result<Points, Error> {
        self.ledger
            .balance(profile)
            .await
            .map_err(map_ledger_error)?
            .ok_or_else(|| Error::not_found(format!("profile {profile} not found")))
    }

    /// Profiles whose stored balance disagrees with their history.
    pub async fn discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, Error> {
        let found = self
            .ledger
            .discrepancies()
            .await
            .map_err(map_ledger_error)?;
        for d in &found {
            warn!(
                profile = %d.profile_id,
                recorded = d.recorded,
                expected = d.expected(),
                "ledger discrepancy"
            );
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockPointLedger;

    #[tokio::test]
    async fn missing_profile_balance_is_not_found() {
        let mut ledger = MockPointLedger::new();
        ledger.expect_balance().return_once(|_| Ok(None));

        let err = LedgerAuditService::new(Arc::new(ledger))
            .balance(Uuid::nil())
            .await
            .expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn discrepancies_pass_through() {
        let mut ledger = MockPointLedger::new();
        ledger.expect_discrepancies().return_once(|| {
            Ok(vec![LedgerDiscrepancy {
                profile_id: Uuid::nil(),
                recorded: 5,
                earned: 3,
                redeemed: 0,
            }])
        });

        let found = LedgerAuditService::new(Arc::new(ledger))
            .discrepancies()
            .await
            .expect("audit runs");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].expected(), 3);
    }
}

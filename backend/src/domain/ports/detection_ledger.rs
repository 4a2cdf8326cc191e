//! Port for committing a rewarded plastic detection.
//!
//! One call is one transaction: resolve and lock the profile, append the
//! `bottle_sorted` log row, bump the device counter, insert the entry, and
//! credit the balance. Either all of it commits or none of it does.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{IdempotencyKey, Points, ProfileIdentifier};

use super::define_port_error;

define_port_error! {
    /// Errors raised while committing a detection.
    pub enum DetectionLedgerError {
        Connection { message: String } =>
            "detection ledger connection failed: {message}",
        Query { message: String } =>
            "detection ledger transaction failed: {message}",
        /// The credit would exceed the storable balance.
        BalanceOverflow { profile: Uuid } =>
            "point balance of profile {profile} would overflow",
    }
}

/// A plastic detection ready to be credited.
#[derive(Debug, Clone, PartialEq)]
pub struct PlasticDetection {
    pub device: Uuid,
    pub identifier: ProfileIdentifier,
    pub points: Points,
    pub sensor_data: Option<Value>,
    pub event_key: Option<IdempotencyKey>,
}

/// Outcome of [`DetectionLedger::commit_plastic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionCommit {
    /// All effects committed; `total_points` is the new balance.
    Credited { profile: Uuid, total_points: Points },
    /// The event key was already committed; nothing changed.
    Replayed { profile: Uuid, total_points: Points },
    /// No profile matches the identifier; nothing was written.
    UserNotFound,
}

/// Port for the atomic plastic-detection write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionLedger: Send + Sync {
    async fn commit_plastic(
        &self,
        detection: &PlasticDetection,
    ) -> Result<DetectionCommit, DetectionLedgerError>;
}

/// Fixture implementation that resolves no users.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDetectionLedger;

#[async_trait]
impl DetectionLedger for FixtureDetectionLedger {
    async fn commit_plastic(
        &self,
        _detection: &PlasticDetection,
    ) -> Result<DetectionCommit, DetectionLedgerError> {
        Ok(DetectionCommit::UserNotFound)
    }
}

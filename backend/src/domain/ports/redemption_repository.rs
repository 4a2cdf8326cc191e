//! Port for the reward catalogue and point redemptions.

use async_trait::async_trait;

use crate::domain::{Points, ReceiptNumber, Redemption, RedemptionRequest, RewardItem};

use super::define_port_error;

define_port_error! {
    /// Errors raised by redemption adapters.
    pub enum RedemptionRepositoryError {
        Connection { message: String } =>
            "redemption repository connection failed: {message}",
        Query { message: String } =>
            "redemption repository query failed: {message}",
        ProfileNotFound => "profile not found",
        /// The debit exceeds the balance; nothing was written.
        InsufficientPoints { balance: u32, requested: u32 } =>
            "insufficient points: balance {balance}, requested {requested}",
        /// Every receipt candidate collided with an existing receipt.
        ReceiptSpaceExhausted { attempts: usize } =>
            "no unique receipt number after {attempts} attempts",
    }
}

/// Port for reward and redemption storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedemptionRepository: Send + Sync {
    async fn find_reward(&self, id: i64) -> Result<Option<RewardItem>, RedemptionRepositoryError>;

    async fn add_reward(
        &self,
        reward_name: &str,
        points_required: Points,
    ) -> Result<RewardItem, RedemptionRepositoryError>;

    /// Debit `cost` and insert the redemption under the first receipt
    /// candidate not already taken, all in one transaction.
    async fn redeem(
        &self,
        request: &RedemptionRequest,
        cost: Points,
        receipt_candidates: &[ReceiptNumber],
    ) -> Result<Redemption, RedemptionRepositoryError>;
}

/// Fixture implementation with an empty catalogue.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureRedemptionRepository;

#[async_trait]
impl RedemptionRepository for FixtureRedemptionRepository {
    async fn find_reward(&self, _id: i64) -> Result<Option<RewardItem>, RedemptionRepositoryError> {
        Ok(None)
    }

    async fn add_reward(
        &self,
        reward_name: &str,
        points_required: Points,
    ) -> Result<RewardItem, RedemptionRepositoryError> {
        Ok(RewardItem {
            id: 1,
            reward_name: reward_name.to_owned(),
            points_required,
        })
    }

    async fn redeem(
        &self,
        _request: &RedemptionRequest,
        _cost: Points,
        _receipt_candidates: &[ReceiptNumber],
    ) -> Result<Redemption, RedemptionRepositoryError> {
        Err(RedemptionRepositoryError::profile_not_found())
    }
}

//! Spending points on rewards.
//!
//! The cost is debited and the redemption stored under a freshly issued
//! receipt number in one repository transaction; a shortfall leaves the
//! balance untouched.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::domain::ports::{RedemptionRepository, RedemptionRepositoryError};
use crate::domain::{Error, Points, ReceiptIssuer, Redemption, RedemptionRequest, RewardItem};

/// Redemption service.
#[derive(Clone)]
pub struct RedemptionService<R> {
    repo: Arc<R>,
    receipts: ReceiptIssuer,
}

impl<R> RedemptionService<R> {
    pub fn new(repo: Arc<R>, receipts: ReceiptIssuer) -> Self {
        Self { repo, receipts }
    }
}

fn map_repository_error(error: RedemptionRepositoryError) -> Error {
    match error {
        RedemptionRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("redemption repository unavailable: {message}"))
        }
        RedemptionRepositoryError::Query { message } => {
            Error::internal(format!("redemption repository error: {message}"))
        }
        RedemptionRepositoryError::ProfileNotFound => Error::not_found("profile not found")
            .with_details(json!({ "field": "profile", "code": "profile_not_found" })),
        RedemptionRepositoryError::InsufficientPoints { balance, requested } => {
            Error::insufficient_points(format!(
                "redemption needs {requested} points but only {balance} are available"
            ))
            .with_details(json!({
                "balance": balance,
                "requested": requested,
                "code": "insufficient_points",
            }))
        }
        RedemptionRepositoryError::ReceiptSpaceExhausted { attempts } => {
            Error::uniqueness_conflict(format!(
                "no unique receipt number after {attempts} attempts"
            ))
            .with_details(json!({ "attempts": attempts, "code": "receipt_contention" }))
        }
    }
}

impl<R> RedemptionService<R>
where
    R: RedemptionRepository,
{
    /// Register a catalogue item.
    pub async fn add_reward(
        &self,
        reward_name: &str,
        points_required: Points,
    ) -> Result<RewardItem, Error> {
        let name = reward_name.trim();
        if name.is_empty() {
            return Err(Error::invalid_request("reward name must not be empty")
                .with_details(json!({ "field": "reward_name", "code": "empty_reward_name" })));
        }
        self.repo
            .add_reward(name, points_required)
            .await
            .map_err(map_repository_error)
    }

    /// Redeem `request.quantity` units of a reward.
    ///
    /// # Errors
    /// - `not_found` for an unknown reward or profile;
    /// - `insufficient_points` when the balance cannot cover the cost;
    /// - `uniqueness_conflict` when no receipt candidate was free.
    pub async fn redeem(&self, request: RedemptionRequest) -> Result<Redemption, Error> {
        if request.quantity == 0 {
            return Err(Error::invalid_request("quantity must be at least 1")
                .with_details(json!({ "field": "quantity", "code": "invalid_quantity" })));
        }
        let reward = self
            .repo
            .find_reward(request.reward_item_id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| {
                Error::not_found(format!("reward {} not found", request.reward_item_id))
                    .with_details(json!({ "field": "reward_item", "code": "reward_not_found" }))
            })?;
        let cost = reward.points_required.times(request.quantity).map_err(|_| {
            Error::invalid_request("redemption cost is out of range")
                .with_details(json!({ "field": "quantity", "code": "cost_overflow" }))
        })?;

        let candidates = self.receipts.candidates();
        let redemption = self
            .repo
            .redeem(&request, cost, &candidates)
            .await
            .map_err(map_repository_error)?;
        info!(
            profile = %request.profile_id,
            reward = %reward.reward_name,
            cost = %cost,
            receipt = %redemption.receipt_number,
            "points redeemed"
        );
        Ok(redemption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockRedemptionRepository;
    use crate::domain::test_fixtures::{fixed_clock, fixture_timestamp};
    use crate::domain::{ErrorCode, MAX_RECEIPT_ATTEMPTS, RandomReceiptSuffix};
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    fn pts(value: u32) -> Points {
        Points::new(value).expect("in range")
    }

    #[fixture]
    fn reward() -> RewardItem {
        RewardItem {
            id: 3,
            reward_name: "Eco bag".into(),
            points_required: pts(50),
        }
    }

    fn service(repo: MockRedemptionRepository) -> RedemptionService<MockRedemptionRepository> {
        RedemptionService::new(
            Arc::new(repo),
            ReceiptIssuer::new(fixed_clock(), Arc::new(RandomReceiptSuffix)),
        )
    }

    fn request(quantity: u32) -> RedemptionRequest {
        RedemptionRequest {
            profile_id: Uuid::new_v4(),
            reward_item_id: 3,
            quantity,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn redeem_debits_cost_times_quantity(reward: RewardItem) {
        let mut repo = MockRedemptionRepository::new();
        repo.expect_find_reward()
            .return_once(move |_| Ok(Some(reward)));
        repo.expect_redeem()
            .withf(|_, cost, candidates| {
                *cost == pts(100)
                    && candidates.len() == MAX_RECEIPT_ATTEMPTS
                    && candidates
                        .iter()
                        .all(|c| c.as_ref().starts_with("SMCEcoDrop-2025-10232145"))
            })
            .times(1)
            .return_once(|req, cost, candidates| {
                Ok(Redemption {
                    id: 1,
                    profile_id: req.profile_id,
                    reward_item_id: req.reward_item_id,
                    redeemed_points: cost,
                    quantity: req.quantity,
                    receipt_number: candidates[0].clone(),
                    created_at: fixture_timestamp(),
                    remaining_points: pts(20),
                })
            });

        let redemption = service(repo).redeem(request(2)).await.expect("redeemed");
        assert_eq!(redemption.redeemed_points, pts(100));
        assert_eq!(redemption.remaining_points, pts(20));
    }

    #[rstest]
    #[tokio::test]
    async fn shortfall_is_insufficient_points(reward: RewardItem) {
        let mut repo = MockRedemptionRepository::new();
        repo.expect_find_reward()
            .return_once(move |_| Ok(Some(reward)));
        repo.expect_redeem().return_once(|_, _, _| {
            Err(RedemptionRepositoryError::insufficient_points(100_u32, 150_u32))
        });

        let err = service(repo).redeem(request(3)).await.expect_err("shortfall");
        assert_eq!(err.code(), ErrorCode::InsufficientPoints);
        assert_eq!(
            err.details().and_then(|d| d.get("balance")),
            Some(&serde_json::json!(100))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn exhausted_receipts_are_uniqueness_conflict(reward: RewardItem) {
        let mut repo = MockRedemptionRepository::new();
        repo.expect_find_reward()
            .return_once(move |_| Ok(Some(reward)));
        repo.expect_redeem().return_once(|_, _, candidates| {
            Err(RedemptionRepositoryError::receipt_space_exhausted(
                candidates.len(),
            ))
        });

        let err = service(repo).redeem(request(1)).await.expect_err("exhausted");
        assert_eq!(err.code(), ErrorCode::UniquenessConflict);
    }

    #[tokio::test]
    async fn unknown_reward_is_not_found() {
        let mut repo = MockRedemptionRepository::new();
        repo.expect_find_reward().return_once(|_| Ok(None));

        let err = service(repo).redeem(request(1)).await.expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_without_lookups() {
        let err = service(MockRedemptionRepository::new())
            .redeem(request(0))
            .await
            .expect_err("invalid quantity");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn blank_reward_name_is_rejected() {
        let err = service(MockRedemptionRepository::new())
            .add_reward("  ", pts(10))
            .await
            .expect_err("blank name");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}

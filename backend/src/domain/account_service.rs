//! Account factory: an account and its profile are created together.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::domain::port_errors::map_profile_error;
use crate::domain::ports::{UserProfileRepository, UserProfileRepositoryError};
use crate::domain::{Error, NewAccount, QrToken, UserProfile};

/// QR tokens carry a random nonce; a collision is retried this many times.
const QR_TOKEN_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct AccountService<P> {
    profiles: Arc<P>,
}

impl<P> AccountService<P> {
    pub fn new(profiles: Arc<P>) -> Self {
        Self { profiles }
    }
}

impl<P> AccountService<P>
where
    P: UserProfileRepository,
{
    /// Create an account with its profile and a fresh QR token.
    pub async fn create_account(&self, account: NewAccount) -> Result<UserProfile, Error> {
        for _ in 0..QR_TOKEN_ATTEMPTS {
            let token = QrToken::generate(&account.username);
            match self.profiles.create_account(&account, &token).await {
                Ok(profile) => {
                    info!(
                        profile = %profile.id,
                        username = %account.username,
                        user_type = %account.user_type,
                        "account created"
                    );
                    return Ok(profile);
                }
                Err(UserProfileRepositoryError::DuplicateQrToken) => {
                    warn!(username = %account.username, "qr token collided; regenerating");
                }
                Err(other) => return Err(map_profile_error(other)),
            }
        }
        Err(Error::uniqueness_conflict("could not generate a unique qr token")
            .with_details(json!({ "field": "qr_code_data", "code": "duplicate_qr_token" })))
    }

    /// Look up a profile by its owner's username.
    pub async fn find_by_username(&self, username: &str) -> Result<UserProfile, Error> {
        self.profiles
            .find_by_username(username)
            .await
            .map_err(map_profile_error)?
            .ok_or_else(|| {
                Error::not_found(format!("no account named {username}"))
                    .with_details(json!({ "field": "username", "code": "account_not_found" }))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockUserProfileRepository;
    use crate::domain::{ErrorCode, Points, UserType, Username};

    fn new_account() -> NewAccount {
        NewAccount {
            username: Username::new("maria").expect("valid username"),
            user_type: UserType::Student,
            school_id: None,
        }
    }

    #[tokio::test]
    async fn creates_profile_with_qr_token() {
        let mut repo = MockUserProfileRepository::new();
        repo.expect_create_account()
            .withf(|account, token| {
                account.username.as_ref() == "maria"
                    && token.as_ref().starts_with("SMC-USER-maria-")
            })
            .times(1)
            .return_once(|account, token| {
                Ok(UserProfile {
                    id: uuid::Uuid::new_v4(),
                    username: account.username.to_string(),
                    school_id: None,
                    qr_code_data: Some(token.as_ref().to_owned()),
                    user_type: account.user_type,
                    total_points: Points::ZERO,
                })
            });

        let profile = AccountService::new(Arc::new(repo))
            .create_account(new_account())
            .await
            .expect("account created");
        assert_eq!(profile.total_points, Points::ZERO);
        assert!(profile.qr_code_data.is_some());
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let mut repo = MockUserProfileRepository::new();
        repo.expect_create_account()
            .times(1)
            .return_once(|_, _| Err(UserProfileRepositoryError::duplicate_username("maria")));

        let err = AccountService::new(Arc::new(repo))
            .create_account(new_account())
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn qr_collisions_are_bounded() {
        let mut repo = MockUserProfileRepository::new();
        repo.expect_create_account()
            .times(QR_TOKEN_ATTEMPTS)
            .returning(|_, _| Err(UserProfileRepositoryError::duplicate_qr_token()));

        let err = AccountService::new(Arc::new(repo))
            .create_account(new_account())
            .await
            .expect_err("collisions exhausted");
        assert_eq!(err.code(), ErrorCode::UniquenessConflict);
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let mut repo = MockUserProfileRepository::new();
        repo.expect_find_by_username().return_once(|_| Ok(None));

        let err = AccountService::new(Arc::new(repo))
            .find_by_username("ghost")
            .await
            .expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}

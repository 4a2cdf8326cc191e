//! Port for accounts and their profiles.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewAccount, ProfileIdentifier, QrToken, UserProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile repository adapters.
    pub enum UserProfileRepositoryError {
        Connection { message: String } =>
            "profile repository connection failed: {message}",
        Query { message: String } =>
            "profile repository query failed: {message}",
        DuplicateUsername { username: String } =>
            "username {username} is already taken",
        DuplicateSchoolId { school_id: String } =>
            "school id {school_id} is already assigned",
        /// The generated QR token collided; callers may retry with a new one.
        DuplicateQrToken => "qr token is already assigned",
    }
}

/// Port for profile storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// Profile whose school id equals `identifier`, else whose QR token does.
    async fn find_by_identifier(
        &self,
        identifier: &ProfileIdentifier,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, UserProfileRepositoryError>;

    /// Profile owned by the account named `username`.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError>;

    /// Create the account and its profile in one transaction.
    async fn create_account(
        &self,
        account: &NewAccount,
        qr_token: &QrToken,
    ) -> Result<UserProfile, UserProfileRepositoryError>;
}

/// Fixture implementation with no profiles.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserProfileRepository;

#[async_trait]
impl UserProfileRepository for FixtureUserProfileRepository {
    async fn find_by_identifier(
        &self,
        _identifier: &ProfileIdentifier,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        Ok(None)
    }

    async fn find_by_id(
        &self,
        _id: Uuid,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        Ok(None)
    }

    async fn find_by_username(
        &self,
        _username: &str,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        Ok(None)
    }

    async fn create_account(
        &self,
        account: &NewAccount,
        qr_token: &QrToken,
    ) -> Result<UserProfile, UserProfileRepositoryError> {
        Ok(UserProfile {
            id: Uuid::new_v4(),
            username: account.username.to_string(),
            school_id: account.school_id.clone(),
            qr_code_data: Some(qr_token.as_ref().to_owned()),
            user_type: account.user_type,
            total_points: crate::domain::Points::ZERO,
        })
    }
}

//! Port for reading and assigning school identifiers.
//!
//! Suggestion is a plain read. Assignment runs the read, the successor
//! computation, and the profile update inside one transaction holding an
//! exclusive lock on the scheme's scope row, so two concurrent assignments
//! in the same space serialise.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{IdScheme, SchoolId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by school id adapters.
    pub enum SchoolIdRepositoryError {
        Connection { message: String } =>
            "school id repository connection failed: {message}",
        Query { message: String } =>
            "school id repository query failed: {message}",
        ProfileNotFound { profile: Uuid } => "profile {profile} not found",
        /// The identifier is already held by another profile.
        Taken { school_id: String } => "school id {school_id} is already assigned",
        /// The scheme has no successor left.
        Exhausted { scope: String } => "identifier space {scope} is exhausted",
    }
}

/// Port for school identifier storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchoolIdRepository: Send + Sync {
    /// Greatest identifier (by string order) carrying the scheme's prefix.
    async fn greatest_in_scheme(
        &self,
        scheme: IdScheme,
    ) -> Result<Option<String>, SchoolIdRepositoryError>;

    /// Compute the scheme's next identifier and assign it to `profile` under
    /// the scope lock.
    async fn assign_next(
        &self,
        profile: Uuid,
        scheme: IdScheme,
    ) -> Result<SchoolId, SchoolIdRepositoryError>;

    /// Assign a caller-chosen identifier, replacing any previous one.
    async fn assign(
        &self,
        profile: Uuid,
        school_id: &SchoolId,
    ) -> Result<(), SchoolIdRepositoryError>;
}

/// Fixture implementation over an empty identifier space.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSchoolIdRepository;

#[async_trait]
impl SchoolIdRepository for FixtureSchoolIdRepository {
    async fn greatest_in_scheme(
        &self,
        _scheme: IdScheme,
    ) -> Result<Option<String>, SchoolIdRepositoryError> {
        Ok(None)
    }

    async fn assign_next(
        &self,
        _profile: Uuid,
        scheme: IdScheme,
    ) -> Result<SchoolId, SchoolIdRepositoryError> {
        Ok(scheme.first())
    }

    async fn assign(
        &self,
        _profile: Uuid,
        _school_id: &SchoolId,
    ) -> Result<(), SchoolIdRepositoryError> {
        Ok(())
    }
}

//! School identifier suggestion and assignment.
//!
//! Suggestions are advisory reads. Generated assignments go through the
//! repository's locked critical section; a unique-constraint collision (for
//! example with a manual assignment racing the lock) is retried a bounded
//! number of times before surfacing as a uniqueness conflict.

use std::sync::Arc;

use chrono::Datelike;
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{SchoolIdRepository, SchoolIdRepositoryError};
use crate::domain::{EnrollmentYear, Error, IdScheme, SchoolId, SchoolIdError, UserType};

/// Attempts made by [`SchoolIdService::assign_generated`].
pub const MAX_ASSIGN_ATTEMPTS: usize = 5;

/// Identifier sequencing service.
#[derive(Clone)]
pub struct SchoolIdService<R> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> SchoolIdService<R> {
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Enrolment year taken from the current UTC date.
    pub fn current_year(&self) -> EnrollmentYear {
        EnrollmentYear::from_calendar_year(self.clock.utc().year())
    }

    /// Students draw from this year's student space; staff from the faculty
    /// space.
    pub fn scheme_for(&self, user_type: UserType) -> IdScheme {
        match user_type {
            UserType::Student => IdScheme::Student {
                year: self.current_year(),
            },
            UserType::Teacher | UserType::Admin => IdScheme::Faculty,
        }
    }
}

fn map_sequencing_error(error: SchoolIdError) -> Error {
    match error {
        SchoolIdError::Exhausted { scope } => {
            Error::uniqueness_conflict(format!("identifier space {scope} is exhausted"))
                .with_details(json!({ "scope": scope, "code": "identifier_space_exhausted" }))
        }
        other => Error::invalid_request(other.to_string())
            .with_details(json!({ "field": "school_id", "code": "invalid_school_id" })),
    }
}

fn map_repository_error(error: SchoolIdRepositoryError) -> Error {
    match error {
        SchoolIdRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("school id repository unavailable: {message}"))
        }
        SchoolIdRepositoryError::Query { message } => {
            Error::internal(format!("school id repository error: {message}"))
        }
        SchoolIdRepositoryError::ProfileNotFound { profile } => {
            Error::not_found(format!("profile {profile} not found"))
                .with_details(json!({ "profile": profile, "code": "profile_not_found" }))
        }
        SchoolIdRepositoryError::Taken { school_id } => {
            Error::conflict(format!("school id {school_id} is already assigned"))
                .with_details(json!({ "field": "school_id", "code": "duplicate_school_id" }))
        }
        SchoolIdRepositoryError::Exhausted { scope } => {
            map_sequencing_error(SchoolIdError::Exhausted { scope })
        }
    }
}

impl<R> SchoolIdService<R>
where
    R: SchoolIdRepository,
{
    /// Next identifier in `scheme`, without reserving it.
    ///
    /// Two calls with no assignment in between return the same value.
    pub async fn suggest(&self, scheme: IdScheme) -> Result<SchoolId, Error> {
        let last = self
            .repo
            .greatest_in_scheme(scheme)
            .await
            .map_err(map_repository_error)?;
        scheme
            .next_after(last.as_deref())
            .map_err(map_sequencing_error)
    }

    /// Generate the next identifier in `scheme` and assign it to `profile`.
    pub async fn assign_generated(
        &self,
        profile: Uuid,
        scheme: IdScheme,
    ) -> Result<SchoolId, Error> {
        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            match self.repo.assign_next(profile, scheme).await {
                Ok(school_id) => {
                    info!(%profile, %school_id, attempt, "school id assigned");
                    return Ok(school_id);
                }
                Err(SchoolIdRepositoryError::Taken { school_id }) => {
                    warn!(%profile, %school_id, attempt, "generated school id collided");
                }
                Err(other) => return Err(map_repository_error(other)),
            }
        }
        Err(Error::uniqueness_conflict(format!(
            "could not assign a unique school id after {MAX_ASSIGN_ATTEMPTS} attempts"
        ))
        .with_details(json!({
            "scope": scheme.scope_key(),
            "attempts": MAX_ASSIGN_ATTEMPTS,
            "code": "school_id_contention",
        })))
    }

    /// Assign an operator-chosen identifier.
    pub async fn assign_manual(&self, profile: Uuid, raw: &str) -> Result<SchoolId, Error> {
        let school_id = SchoolId::new(raw).map_err(map_sequencing_error)?;
        self.repo
            .assign(profile, &school_id)
            .await
            .map_err(map_repository_error)?;
        info!(%profile, %school_id, "school id assigned manually");
        Ok(school_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockSchoolIdRepository;
    use crate::domain::test_fixtures::fixed_clock;
    use rstest::rstest;

    fn service(repo: MockSchoolIdRepository) -> SchoolIdService<MockSchoolIdRepository> {
        SchoolIdService::new(Arc::new(repo), fixed_clock())
    }

    fn year_25() -> IdScheme {
        IdScheme::Student {
            year: EnrollmentYear::new(25).expect("valid year"),
        }
    }

    #[rstest]
    #[case(UserType::Student, year_25())]
    #[case(UserType::Teacher, IdScheme::Faculty)]
    #[case(UserType::Admin, IdScheme::Faculty)]
    fn scheme_follows_user_type(#[case] user_type: UserType, #[case] expected: IdScheme) {
        let svc = service(MockSchoolIdRepository::new());
        assert_eq!(svc.scheme_for(user_type), expected);
    }

    #[rstest]
    #[case(Some("C25-0007"), "C25-0008")]
    #[case(None, "C25-0001")]
    #[tokio::test]
    async fn suggest_uses_greatest_existing(#[case] last: Option<&'static str>, #[case] expected: &str) {
        let mut repo = MockSchoolIdRepository::new();
        repo.expect_greatest_in_scheme()
            .withf(|scheme| *scheme == year_25())
            .times(2)
            .returning(move |_| Ok(last.map(str::to_owned)));

        let svc = service(repo);
        let first = svc.suggest(year_25()).await.expect("suggestion");
        let second = svc.suggest(year_25()).await.expect("suggestion");
        assert_eq!(first.as_ref(), expected);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn suggest_reports_exhaustion_as_uniqueness_conflict() {
        let mut repo = MockSchoolIdRepository::new();
        repo.expect_greatest_in_scheme()
            .return_once(|_| Ok(Some("SMCIC-999-9999".into())));

        let err = service(repo)
            .suggest(IdScheme::Faculty)
            .await
            .expect_err("exhausted");
        assert_eq!(err.code(), ErrorCode::UniquenessConflict);
    }

    #[tokio::test]
    async fn assign_generated_retries_collisions() {
        let profile = Uuid::new_v4();
        let mut repo = MockSchoolIdRepository::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_assign_next()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(SchoolIdRepositoryError::taken("C25-0004")));
        repo.expect_assign_next()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(SchoolId::new("C25-0005").expect("valid")));

        let assigned = service(repo)
            .assign_generated(profile, year_25())
            .await
            .expect("assigned on third attempt");
        assert_eq!(assigned.as_ref(), "C25-0005");
    }

    #[tokio::test]
    async fn assign_generated_gives_up_after_bound() {
        let mut repo = MockSchoolIdRepository::new();
        repo.expect_assign_next()
            .times(MAX_ASSIGN_ATTEMPTS)
            .returning(|_, _| Err(SchoolIdRepositoryError::taken("C25-0004")));

        let err = service(repo)
            .assign_generated(Uuid::new_v4(), year_25())
            .await
            .expect_err("bounded retries");
        assert_eq!(err.code(), ErrorCode::UniquenessConflict);
    }

    #[tokio::test]
    async fn assign_generated_surfaces_missing_profile() {
        let profile = Uuid::new_v4();
        let mut repo = MockSchoolIdRepository::new();
        repo.expect_assign_next()
            .times(1)
            .returning(move |_, _| Err(SchoolIdRepositoryError::profile_not_found(profile)));

        let err = service(repo)
            .assign_generated(profile, IdScheme::Faculty)
            .await
            .expect_err("missing profile");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn manual_assignment_conflicts_on_taken_id() {
        let mut repo = MockSchoolIdRepository::new();
        repo.expect_assign()
            .withf(|_, id| id.as_ref() == "C25-0001")
            .return_once(|_, _| Err(SchoolIdRepositoryError::taken("C25-0001")));

        let err = service(repo)
            .assign_manual(Uuid::new_v4(), " C25-0001 ")
            .await
            .expect_err("taken");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn manual_assignment_rejects_blank() {
        let err = service(MockSchoolIdRepository::new())
            .assign_manual(Uuid::new_v4(), "   ")
            .await
            .expect_err("blank");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}

//! School identifiers and the sequencing rules that suggest the next one.
//!
//! Two schemes share the `user_profiles.school_id` column:
//!
//! - student: `C{YY}-{NNNN}`, sequenced within an enrolment year;
//! - faculty: `SMCIC-{DDD}-{NNNN}`, where `NNNN` rolls over into the next
//!   department code after `9999`.
//!
//! Sequencing here is pure: callers supply the greatest existing identifier
//! for the scheme and receive the successor. Serialising the read against
//! concurrent assignments is the persistence adapter's job.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest identifier the profile column accepts.
pub const MAX_SCHOOL_ID_LEN: usize = 50;

const FACULTY_PREFIX: &str = "SMCIC";
const MAX_SEQUENCE: u16 = 9_999;
const MAX_DEPARTMENT: u16 = 999;

/// Errors raised while validating or sequencing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchoolIdError {
    #[error("school id must not be empty")]
    Empty,
    #[error("school id must be at most {max} characters")]
    TooLong { max: usize },
    #[error("enrolment year must be between 0 and 99, got {year}")]
    InvalidYear { year: u16 },
    #[error("identifier space {scope} is exhausted")]
    Exhausted { scope: String },
}

/// Validated school identifier as stored on a profile.
///
/// # Examples
/// ```
/// use ecodrop::domain::SchoolId;
///
/// let id = SchoolId::new("  C25-0008 ").expect("valid id");
/// assert_eq!(id.as_ref(), "C25-0008");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolId(String);

impl SchoolId {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SchoolIdError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SchoolIdError::Empty);
        }
        if trimmed.chars().count() > MAX_SCHOOL_ID_LEN {
            return Err(SchoolIdError::TooLong {
                max: MAX_SCHOOL_ID_LEN,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for SchoolId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SchoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchoolId {
    type Error = SchoolIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SchoolId> for String {
    fn from(value: SchoolId) -> Self {
        value.0
    }
}

/// Two-digit enrolment year used by the student scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnrollmentYear(u8);

impl EnrollmentYear {
    /// Accepts `0..=99`.
    pub fn new(year: u16) -> Result<Self, SchoolIdError> {
        u8::try_from(year)
            .ok()
            .filter(|yy| *yy <= 99)
            .map(Self)
            .ok_or(SchoolIdError::InvalidYear { year })
    }

    /// Last two digits of a calendar year, e.g. 2025 becomes 25.
    #[must_use]
    pub fn from_calendar_year(year: i32) -> Self {
        let yy = u8::try_from(year.rem_euclid(100)).unwrap_or_default();
        Self(yy)
    }

    #[must_use]
    pub fn two_digits(self) -> u8 {
        self.0
    }
}

/// Identifier scheme a profile draws its school id from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScheme {
    Student { year: EnrollmentYear },
    Faculty,
}

impl IdScheme {
    /// Prefix shared by every identifier in the scheme's space.
    ///
    /// # Examples
    /// ```
    /// use ecodrop::domain::{EnrollmentYear, IdScheme};
    ///
    /// let year = EnrollmentYear::new(25).expect("valid year");
    /// assert_eq!(IdScheme::Student { year }.prefix(), "C25-");
    /// assert_eq!(IdScheme::Faculty.prefix(), "SMCIC-");
    /// ```
    #[must_use]
    pub fn prefix(&self) -> String {
        match self {
            Self::Student { year } => format!("C{:02}-", year.two_digits()),
            Self::Faculty => format!("{FACULTY_PREFIX}-"),
        }
    }

    /// POSIX regular expression matching well-formed identifiers of this
    /// space. Manual identifiers that share the prefix but not the shape are
    /// ignored when sequencing.
    #[must_use]
    pub fn pattern(&self) -> String {
        match self {
            Self::Student { year } => format!("^C{:02}-[0-9]{{4}}$", year.two_digits()),
            Self::Faculty => format!("^{FACULTY_PREFIX}-[0-9]{{3}}-[0-9]{{4}}$"),
        }
    }

    /// Key of the row locked while an identifier in this space is assigned.
    #[must_use]
    pub fn scope_key(&self) -> String {
        match self {
            Self::Student { year } => format!("student:{:02}", year.two_digits()),
            Self::Faculty => "faculty".to_owned(),
        }
    }

    /// First identifier of an empty space.
    #[must_use]
    pub fn first(&self) -> SchoolId {
        match self {
            Self::Student { year } => student_id(*year, 1),
            Self::Faculty => faculty_id(1, 1),
        }
    }

    /// Successor of `last`, the greatest identifier currently in the space.
    ///
    /// A `last` value whose numeric parts do not parse is treated as absent;
    /// the result is the first identifier of the space.
    ///
    /// # Errors
    /// [`SchoolIdError::Exhausted`] when the space has no successor left.
    ///
    /// # Examples
    /// ```
    /// use ecodrop::domain::IdScheme;
    ///
    /// let next = IdScheme::Faculty.next_after(Some("SMCIC-001-9999")).unwrap();
    /// assert_eq!(next.as_ref(), "SMCIC-002-0001");
    /// ```
    pub fn next_after(&self, last: Option<&str>) -> Result<SchoolId, SchoolIdError> {
        let Some(last) = last else {
            return Ok(self.first());
        };
        match self {
            Self::Student { year } => self.next_student(*year, last),
            Self::Faculty => self.next_faculty(last),
        }
    }

    fn next_student(&self, year: EnrollmentYear, last: &str) -> Result<SchoolId, SchoolIdError> {
        let Some(sequence) = last.split('-').nth(1).and_then(|s| s.parse::<u16>().ok()) else {
            return Ok(self.first());
        };
        if sequence >= MAX_SEQUENCE {
            return Err(self.exhausted());
        }
        Ok(student_id(year, sequence + 1))
    }

    fn next_faculty(&self, last: &str) -> Result<SchoolId, SchoolIdError> {
        let parts: Vec<&str> = last.split('-').collect();
        let [_, department, sequence] = parts.as_slice() else {
            return Ok(self.first());
        };
        let (Ok(department), Ok(sequence)) = (department.parse::<u16>(), sequence.parse::<u16>())
        else {
            return Ok(self.first());
        };
        if sequence < MAX_SEQUENCE {
            return Ok(faculty_id(department, sequence + 1));
        }
        if department >= MAX_DEPARTMENT {
            return Err(self.exhausted());
        }
        Ok(faculty_id(department + 1, 1))
    }

    fn exhausted(&self) -> SchoolIdError {
        SchoolIdError::Exhausted {
            scope: self.scope_key(),
        }
    }
}

fn student_id(year: EnrollmentYear, sequence: u16) -> SchoolId {
    SchoolId(format!("C{:02}-{sequence:04}", year.two_digits()))
}

fn faculty_id(department: u16, sequence: u16) -> SchoolId {
    SchoolId(format!("{FACULTY_PREFIX}-{department:03}-{sequence:04}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn year_25() -> IdScheme {
        IdScheme::Student {
            year: EnrollmentYear::new(25).expect("valid year"),
        }
    }

    #[rstest]
    #[case(None, "C25-0001")]
    #[case(Some("C25-0007"), "C25-0008")]
    #[case(Some("C25-0999"), "C25-1000")]
    #[case(Some("C25-abcd"), "C25-0001")]
    #[case(Some("C25"), "C25-0001")]
    fn student_successor(year_25: IdScheme, #[case] last: Option<&str>, #[case] expected: &str) {
        let next = year_25.next_after(last).expect("successor exists");
        assert_eq!(next.as_ref(), expected);
    }

    #[rstest]
    fn student_space_exhausts_at_9999(year_25: IdScheme) {
        let err = year_25.next_after(Some("C25-9999")).expect_err("space exhausted");
        assert_eq!(
            err,
            SchoolIdError::Exhausted {
                scope: "student:25".into()
            }
        );
    }

    #[rstest]
    #[case(None, "SMCIC-001-0001")]
    #[case(Some("SMCIC-001-0001"), "SMCIC-001-0002")]
    #[case(Some("SMCIC-001-9999"), "SMCIC-002-0001")]
    #[case(Some("SMCIC-042-0100"), "SMCIC-042-0101")]
    #[case(Some("SMCIC-001"), "SMCIC-001-0001")]
    #[case(Some("SMCIC-x-0003"), "SMCIC-001-0001")]
    fn faculty_successor(#[case] last: Option<&str>, #[case] expected: &str) {
        let next = IdScheme::Faculty.next_after(last).expect("successor exists");
        assert_eq!(next.as_ref(), expected);
    }

    #[test]
    fn faculty_space_exhausts_after_last_department() {
        let err = IdScheme::Faculty
            .next_after(Some("SMCIC-999-9999"))
            .expect_err("space exhausted");
        assert!(matches!(err, SchoolIdError::Exhausted { .. }));
    }

    #[rstest]
    fn generated_student_ids_match_format(year_25: IdScheme) {
        let mut last: Option<SchoolId> = None;
        for _ in 0..25 {
            let next = year_25
                .next_after(last.as_ref().map(AsRef::as_ref))
                .expect("successor exists");
            let text = next.as_ref();
            assert_eq!(text.len(), 8);
            assert!(text.starts_with("C25-"));
            assert!(text[4..].chars().all(|c| c.is_ascii_digit()));
            assert_ne!(last.as_ref(), Some(&next));
            last = Some(next);
        }
    }

    #[rstest]
    fn patterns_describe_well_formed_ids(year_25: IdScheme) {
        assert_eq!(year_25.pattern(), "^C25-[0-9]{4}$");
        assert_eq!(IdScheme::Faculty.pattern(), "^SMCIC-[0-9]{3}-[0-9]{4}$");
    }

    #[rstest]
    fn suggestion_is_stable_for_same_input(year_25: IdScheme) {
        let first = year_25.next_after(Some("C25-0041")).expect("successor");
        let second = year_25.next_after(Some("C25-0041")).expect("successor");
        assert_eq!(first, second);
    }

    #[rstest]
    #[case(2025, 25)]
    #[case(2100, 0)]
    #[case(1999, 99)]
    fn enrolment_year_from_calendar(#[case] year: i32, #[case] expected: u8) {
        assert_eq!(EnrollmentYear::from_calendar_year(year).two_digits(), expected);
    }

    #[test]
    fn enrolment_year_rejects_three_digits() {
        assert_eq!(
            EnrollmentYear::new(125),
            Err(SchoolIdError::InvalidYear { year: 125 })
        );
    }

    #[test]
    fn student_prefix_pads_single_digit_years() {
        let scheme = IdScheme::Student {
            year: EnrollmentYear::new(7).expect("valid year"),
        };
        assert_eq!(scheme.prefix(), "C07-");
        assert_eq!(scheme.scope_key(), "student:07");
    }

    #[rstest]
    #[case("", SchoolIdError::Empty)]
    #[case("   ", SchoolIdError::Empty)]
    fn school_id_rejects_blank(#[case] raw: &str, #[case] expected: SchoolIdError) {
        assert_eq!(SchoolId::new(raw), Err(expected));
    }

    #[test]
    fn school_id_rejects_overlong() {
        let raw = "X".repeat(MAX_SCHOOL_ID_LEN + 1);
        assert_eq!(
            SchoolId::new(raw),
            Err(SchoolIdError::TooLong {
                max: MAX_SCHOOL_ID_LEN
            })
        );
    }
}

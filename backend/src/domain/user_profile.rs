//! Accounts, their point-holding profiles, and the identifiers that resolve
//! them at a kiosk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Points, SchoolId};

/// Maximum username length accepted by the accounts table.
pub const USERNAME_MAX: usize = 150;

const QR_TOKEN_PREFIX: &str = "SMC-USER";

/// Validation errors for account and profile inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    EmptyUsername,
    UsernameTooLong { max: usize },
    UnknownUserType(String),
    EmptyIdentifier,
}

impl fmt::Display for ProfileValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::UsernameTooLong { max } => {
                write!(f, "username must be at most {max} characters")
            }
            Self::UnknownUserType(raw) => write!(
                f,
                "user type must be one of student, teacher, admin (got {raw:?})"
            ),
            Self::EmptyIdentifier => write!(f, "identifier must not be empty"),
        }
    }
}

impl std::error::Error for ProfileValidationError {}

/// Unique login name of an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ProfileValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ProfileValidationError::EmptyUsername);
        }
        if trimmed.chars().count() > USERNAME_MAX {
            return Err(ProfileValidationError::UsernameTooLong { max: USERNAME_MAX });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a profile owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl UserType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserType {
    type Err = ProfileValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            other => Err(ProfileValidationError::UnknownUserType(other.to_owned())),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// QR payload printed on a user's card, `SMC-USER-{username}-{8 hex}`.
///
/// # Examples
/// ```
/// use ecodrop::domain::{QrToken, Username};
///
/// let username = Username::new("maria").expect("valid username");
/// let token = QrToken::for_username(&username, "1a2b3c4d");
/// assert_eq!(token.as_ref(), "SMC-USER-maria-1a2b3c4d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QrToken(String);

impl QrToken {
    #[must_use]
    pub fn for_username(username: &Username, nonce: &str) -> Self {
        Self(format!("{QR_TOKEN_PREFIX}-{username}-{nonce}"))
    }

    /// Token with a nonce taken from a fresh UUID v4.
    #[must_use]
    pub fn generate(username: &Username) -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self::for_username(username, &simple[..8])
    }
}

impl AsRef<str> for QrToken {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// Kiosk-scanned value that resolves a profile by school id or QR token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileIdentifier(String);

impl ProfileIdentifier {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ProfileValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ProfileValidationError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for ProfileIdentifier {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ProfileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-holding profile attached one-to-one to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub school_id: Option<SchoolId>,
    pub qr_code_data: Option<String>,
    pub user_type: UserType,
    pub total_points: Points,
}

/// Input to the account factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: Username,
    pub user_type: UserType,
    pub school_id: Option<SchoolId>,
}

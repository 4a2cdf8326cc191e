//! Kiosk devices and the credentials they present.
//!
//! API keys are long-lived bearer secrets. Only their SHA-256 digest is
//! stored; the plaintext lives in a [`Zeroizing`] buffer for as long as a
//! request or registration needs it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Maximum length of a device code such as `KIOSK-01`.
pub const DEVICE_CODE_MAX: usize = 50;

const FINGERPRINT_BYTES: usize = 4;

/// Validation errors for device inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceValidationError {
    EmptyDeviceCode,
    DeviceCodeTooLong { max: usize },
    EmptyApiKey,
    UnknownStatus(String),
}

impl fmt::Display for DeviceValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDeviceCode => write!(f, "device id must not be empty"),
            Self::DeviceCodeTooLong { max } => {
                write!(f, "device id must be at most {max} characters")
            }
            Self::EmptyApiKey => write!(f, "api key must not be empty"),
            Self::UnknownStatus(raw) => write!(f, "unknown device status {raw:?}"),
        }
    }
}

impl std::error::Error for DeviceValidationError {}

/// Human-assigned unique device code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceCode(String);

impl DeviceCode {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, DeviceValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DeviceValidationError::EmptyDeviceCode);
        }
        if trimmed.chars().count() > DEVICE_CODE_MAX {
            return Err(DeviceValidationError::DeviceCodeTooLong {
                max: DEVICE_CODE_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for DeviceCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operational state of a kiosk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
    Error,
}

impl DeviceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
        }
    }

    /// Status after a heartbeat: offline and faulted devices come back
    /// online, maintenance is left for an operator to clear.
    #[must_use]
    pub fn after_heartbeat(self) -> Self {
        match self {
            Self::Offline | Self::Error => Self::Online,
            other => other,
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = DeviceValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "maintenance" => Ok(Self::Maintenance),
            "error" => Ok(Self::Error),
            other => Err(DeviceValidationError::UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered kiosk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: Uuid,
    pub device_id: DeviceCode,
    pub device_name: String,
    pub location: String,
    pub status: DeviceStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub total_bottles_processed: u64,
}

/// Plaintext device API key.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, DeviceValidationError> {
        let raw = Zeroizing::new(raw.into());
        if raw.trim().is_empty() {
            return Err(DeviceValidationError::EmptyApiKey);
        }
        Ok(Self(raw))
    }

    /// Fresh random key, a hyphenated UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(Zeroizing::new(Uuid::new_v4().to_string()))
    }

    /// Plaintext for one-time display after registration.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn digest(&self) -> ApiKeyDigest {
        ApiKeyDigest(Sha256::digest(self.0.as_bytes()).into())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"<redacted>").finish()
    }
}

/// SHA-256 digest of an [`ApiKey`], the form persisted on a device row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiKeyDigest([u8; 32]);

impl ApiKeyDigest {
    /// Rebuild a digest from stored bytes; anything but 32 bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Constant-time equality.
    #[must_use]
    pub fn matches(&self, other: &ApiKeyDigest) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    /// Short hex prefix of the digest, safe to log.
    ///
    /// # Examples
    /// ```
    /// use ecodrop::domain::ApiKey;
    ///
    /// let key = ApiKey::new("kiosk-secret").expect("non-empty");
    /// let fp = key.digest().fingerprint();
    /// assert_eq!(fp.len(), 8);
    /// assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    /// ```
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..FINGERPRINT_BYTES])
    }
}

/// Input to device registration.
#[derive(Debug, Clone)]
pub struct DeviceRegistration {
    pub device_id: DeviceCode,
    pub device_name: String,
    pub location: String,
    pub api_key: Option<ApiKey>,
}

/// Outcome of registering or re-keying a device.
#[derive(Debug, Clone)]
pub struct RegisteredDevice {
    pub device: Device,
    /// Plaintext key, shown once to the operator.
    pub api_key: ApiKey,
    /// `true` when the device already existed and its key was rotated.
    pub rotated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DeviceStatus::Offline, DeviceStatus::Online)]
    #[case(DeviceStatus::Error, DeviceStatus::Online)]
    #[case(DeviceStatus::Online, DeviceStatus::Online)]
    #[case(DeviceStatus::Maintenance, DeviceStatus::Maintenance)]
    fn heartbeat_transitions(#[case] from: DeviceStatus, #[case] to: DeviceStatus) {
        assert_eq!(from.after_heartbeat(), to);
    }

    #[rstest]
    #[case("online")]
    #[case("offline")]
    #[case("maintenance")]
    #[case("error")]
    fn status_round_trips(#[case] raw: &str) {
        let status: DeviceStatus = raw.parse().expect("known status");
        assert_eq!(status.as_str(), raw);
    }

    #[test]
    fn digest_is_stable_and_discriminating() {
        let a = ApiKey::new("alpha").expect("non-empty");
        let b = ApiKey::new("bravo").expect("non-empty");
        assert!(a.digest().matches(&a.digest()));
        assert!(!a.digest().matches(&b.digest()));
    }

    #[test]
    fn digest_round_trips_through_bytes() {
        let digest = ApiKey::generate().digest();
        let restored = ApiKeyDigest::from_slice(digest.as_bytes()).expect("32 bytes");
        assert_eq!(restored, digest);
        assert!(ApiKeyDigest::from_slice(&[0_u8; 16]).is_none());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret").expect("non-empty");
        assert!(!format!("{key:?}").contains("super-secret"));
    }

    #[rstest]
    #[case("", DeviceValidationError::EmptyDeviceCode)]
    #[case(" ", DeviceValidationError::EmptyDeviceCode)]
    fn device_code_rejects_blank(#[case] raw: &str, #[case] expected: DeviceValidationError) {
        assert_eq!(DeviceCode::new(raw), Err(expected));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert_eq!(ApiKey::new("  "), Err(DeviceValidationError::EmptyApiKey));
    }
}

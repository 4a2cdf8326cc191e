//! Redemption receipt numbers.
//!
//! A receipt reads `SMCEcoDrop-{YYYY}-{MMDDHHMI}{RR}`: the UTC issue time to
//! the minute followed by a two-digit random suffix. Collisions are resolved
//! by drawing a new suffix, at most [`MAX_RECEIPT_ATTEMPTS`] times.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on suffixes tried before a redemption gives up.
pub const MAX_RECEIPT_ATTEMPTS: usize = 20;

const RECEIPT_PREFIX: &str = "SMCEcoDrop";

/// Immutable receipt number attached to a redemption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptNumber(String);

impl ReceiptNumber {
    /// Format a receipt for `issued_at` with the given suffix.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use ecodrop::domain::ReceiptNumber;
    ///
    /// let at = Utc.with_ymd_and_hms(2025, 10, 23, 21, 45, 12).single().expect("valid");
    /// assert_eq!(
    ///     ReceiptNumber::compose(at, 37).as_ref(),
    ///     "SMCEcoDrop-2025-1023214537"
    /// );
    /// ```
    #[must_use]
    pub fn compose(issued_at: DateTime<Utc>, suffix: u8) -> Self {
        Self(format!(
            "{RECEIPT_PREFIX}-{}{suffix:02}",
            issued_at.format("%Y-%m%d%H%M")
        ))
    }

    /// Wrap a receipt read back from storage.
    #[must_use]
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for ReceiptNumber {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the two-digit receipt suffix.
pub trait ReceiptSuffixSource: Send + Sync {
    /// Return a value in `10..=99`.
    fn next_suffix(&self) -> u8;
}

/// Uniformly random suffixes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomReceiptSuffix;

impl ReceiptSuffixSource for RandomReceiptSuffix {
    fn next_suffix(&self) -> u8 {
        rand::thread_rng().gen_range(10..=99)
    }
}

/// Mints candidate receipt numbers for a single redemption.
#[derive(Clone)]
pub struct ReceiptIssuer {
    clock: Arc<dyn Clock>,
    suffixes: Arc<dyn ReceiptSuffixSource>,
}

impl ReceiptIssuer {
    pub fn new(clock: Arc<dyn Clock>, suffixes: Arc<dyn ReceiptSuffixSource>) -> Self {
        Self { clock, suffixes }
    }

    /// Issuer backed by the system clock and [`RandomReceiptSuffix`].
    pub fn system() -> Self {
        Self::new(
            Arc::new(mockable::DefaultClock),
            Arc::new(RandomReceiptSuffix),
        )
    }

    /// Candidates for one redemption, in the order they should be tried.
    ///
    /// All candidates share the same timestamp; only the suffix varies. The
    /// sequence never exceeds [`MAX_RECEIPT_ATTEMPTS`] entries.
    pub fn candidates(&self) -> Vec<ReceiptNumber> {
        let issued_at = self.clock.utc();
        (0..MAX_RECEIPT_ATTEMPTS)
            .map(|_| ReceiptNumber::compose(issued_at, self.suffixes.next_suffix()))
            .collect()
    }
}

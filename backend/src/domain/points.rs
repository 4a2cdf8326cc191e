//! Point balances and the arithmetic the ledger enforces.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest balance storable in the `total_points` column.
pub const MAX_POINTS: u32 = 2_147_483_647;

/// Failures of point arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsError {
    /// The result would exceed [`MAX_POINTS`].
    Overflow,
    /// A debit asked for more than the balance holds.
    Insufficient { balance: Points, requested: Points },
}

impl fmt::Display for PointsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "point balance would exceed {MAX_POINTS}"),
            Self::Insufficient { balance, requested } => write!(
                f,
                "insufficient points: balance {balance}, requested {requested}"
            ),
        }
    }
}

impl std::error::Error for PointsError {}

/// A non-negative quantity of points.
///
/// # Examples
/// ```
/// use ecodrop::domain::{Points, PointsError};
///
/// let balance = Points::new(100).expect("in range");
/// let cost = Points::new(150).expect("in range");
/// assert!(matches!(balance.debit(cost), Err(PointsError::Insufficient { .. })));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct Points(u32);

impl Points {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u32) -> Result<Self, PointsError> {
        if value > MAX_POINTS {
            return Err(PointsError::Overflow);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Value as stored in an `INTEGER` column.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }

    /// Read a stored balance; negative values are rejected.
    pub fn from_stored(value: i32) -> Option<Self> {
        u32::try_from(value).ok().map(Self)
    }

    /// Balance after adding `amount`.
    pub fn credit(self, amount: Points) -> Result<Self, PointsError> {
        self.0
            .checked_add(amount.0)
            .ok_or(PointsError::Overflow)
            .and_then(Self::new)
    }

    /// Balance after removing `amount`; the balance never goes negative.
    pub fn debit(self, amount: Points) -> Result<Self, PointsError> {
        self.0
            .checked_sub(amount.0)
            .map(Self)
            .ok_or(PointsError::Insufficient {
                balance: self,
                requested: amount,
            })
    }

    /// `self` repeated `quantity` times, as for a multi-unit redemption.
    pub fn times(self, quantity: u32) -> Result<Self, PointsError> {
        self.0
            .checked_mul(quantity)
            .ok_or(PointsError::Overflow)
            .and_then(Self::new)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for Points {
    type Error = PointsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Points> for u32 {
    fn from(value: Points) -> Self {
        value.0
    }
}

/// A profile whose stored balance disagrees with its entry and redemption
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiscrepancy {
    pub profile_id: Uuid,
    pub recorded: i64,
    pub earned: i64,
    pub redeemed: i64,
}

impl LedgerDiscrepancy {
    /// Balance implied by the history.
    #[must_use]
    pub fn expected(&self) -> i64 {
        self.earned - self.redeemed
    }
}

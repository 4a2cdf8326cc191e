//! Reward catalogue items and point redemptions.

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::{Points, ReceiptNumber};

/// How long a receipt can be presented after issue.
pub const REDEMPTION_VALIDITY_DAYS: i64 = 3;

/// A reward a user can spend points on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardItem {
    pub id: i64,
    pub reward_name: String,
    pub points_required: Points,
}

/// Request to spend points on `quantity` units of a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionRequest {
    pub profile_id: Uuid,
    pub reward_item_id: i64,
    pub quantity: u32,
}

/// A committed redemption and its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub id: i64,
    pub profile_id: Uuid,
    pub reward_item_id: i64,
    pub redeemed_points: Points,
    pub quantity: u32,
    pub receipt_number: ReceiptNumber,
    pub created_at: DateTime<Utc>,
    /// Balance left on the profile after the debit.
    pub remaining_points: Points,
}

impl Redemption {
    #[must_use]
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.created_at + TimeDelta::days(REDEMPTION_VALIDITY_DAYS)
    }

    /// `true` once `now` is past [`Redemption::valid_until`].
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn redemption() -> Redemption {
        let created_at = Utc
            .with_ymd_and_hms(2025, 10, 23, 21, 45, 0)
            .single()
            .expect("valid timestamp");
        Redemption {
            id: 1,
            profile_id: Uuid::nil(),
            reward_item_id: 7,
            redeemed_points: Points::new(50).expect("in range"),
            quantity: 1,
            receipt_number: ReceiptNumber::compose(created_at, 37),
            created_at,
            remaining_points: Points::ZERO,
        }
    }

    #[test]
    fn valid_for_three_days() {
        let r = redemption();
        assert_eq!(r.valid_until(), r.created_at + TimeDelta::days(3));
    }

    #[rstest]
    #[case(TimeDelta::hours(1), false)]
    #[case(TimeDelta::days(3), false)]
    #[case(TimeDelta::days(3) + TimeDelta::seconds(1), true)]
    fn expiry_boundary(#[case] elapsed: TimeDelta, #[case] expired: bool) {
        let r = redemption();
        assert_eq!(r.is_expired(r.created_at + elapsed), expired);
    }
}

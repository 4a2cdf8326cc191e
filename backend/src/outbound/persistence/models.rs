//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    accounts, device_logs, devices, entries, redeemed_points, reward_items, school_id_scopes,
    user_profiles,
};

// ---------------------------------------------------------------------------
// Account and profile models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = accounts)]
pub(crate) struct NewAccountRow<'a> {
    pub id: Uuid,
    pub username: &'a str,
}

/// Profile columns; the owner's username is joined in separately.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserProfileRow {
    pub id: Uuid,
    pub school_id: Option<String>,
    pub qr_code_data: Option<String>,
    pub user_type: String,
    pub total_points: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_profiles)]
pub(crate) struct NewUserProfileRow<'a> {
    pub id: Uuid,
    pub account_id: Uuid,
    pub school_id: Option<&'a str>,
    pub qr_code_data: Option<&'a str>,
    pub user_type: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = school_id_scopes)]
pub(crate) struct NewSchoolIdScopeRow<'a> {
    pub scope: &'a str,
}

// ---------------------------------------------------------------------------
// Device models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = devices)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DeviceRow {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub location: String,
    pub api_key_digest: Vec<u8>,
    pub status: String,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub total_bottles_processed: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = devices)]
pub(crate) struct NewDeviceRow<'a> {
    pub id: Uuid,
    pub device_id: &'a str,
    pub device_name: &'a str,
    pub location: &'a str,
    pub api_key_digest: &'a [u8],
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = device_logs)]
pub(crate) struct NewDeviceLogRow<'a> {
    pub device_id: Uuid,
    pub log_type: &'a str,
    pub sort_result: Option<&'a str>,
    pub sensor_data: Option<&'a serde_json::Value>,
    pub message: &'a str,
    pub event_key: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Ledger models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = entries)]
pub(crate) struct NewEntryRow {
    pub user_profile_id: Uuid,
    pub no_bottle: i32,
    pub points: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reward_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RewardItemRow {
    pub id: i64,
    pub reward_name: String,
    pub points_required: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reward_items)]
pub(crate) struct NewRewardItemRow<'a> {
    pub reward_name: &'a str,
    pub points_required: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = redeemed_points)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RedemptionRow {
    pub id: i64,
    pub user_profile_id: Uuid,
    pub reward_item_id: i64,
    #[diesel(column_name = points_redeemed)]
    pub redeemed_points: i32,
    pub quantity: i32,
    pub receipt_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = redeemed_points)]
pub(crate) struct NewRedemptionRow<'a> {
    pub user_profile_id: Uuid,
    pub reward_item_id: i64,
    #[diesel(column_name = points_redeemed)]
    pub redeemed_points: i32,
    pub quantity: i32,
    pub receipt_number: &'a str,
}

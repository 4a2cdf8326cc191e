//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. `diesel print-schema`
//! against a migrated database regenerates them.

diesel::table! {
    /// Login identities. Each owns exactly one profile.
    accounts (id) {
        id -> Uuid,
        username -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Point-holding profiles with their institutional and QR identifiers.
    user_profiles (id) {
        id -> Uuid,
        account_id -> Uuid,
        /// `C{YY}-{NNNN}` or `SMCIC-{DDD}-{NNNN}`; unique when present.
        school_id -> Nullable<Varchar>,
        /// `SMC-USER-{username}-{nonce}`; unique when present.
        qr_code_data -> Nullable<Varchar>,
        user_type -> Varchar,
        /// Never negative (CHECK constraint).
        total_points -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Lock rows serialising identifier generation per scope.
    school_id_scopes (scope) {
        scope -> Varchar,
    }
}

diesel::table! {
    devices (id) {
        id -> Uuid,
        device_id -> Varchar,
        device_name -> Varchar,
        location -> Varchar,
        /// SHA-256 of the bearer key.
        api_key_digest -> Bytea,
        status -> Varchar,
        last_heartbeat -> Nullable<Timestamptz>,
        total_bottles_processed -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only device audit trail.
    device_logs (id) {
        id -> Int8,
        device_id -> Uuid,
        log_type -> Varchar,
        sort_result -> Nullable<Varchar>,
        sensor_data -> Nullable<Jsonb>,
        message -> Text,
        /// Client idempotency key; unique per device when present.
        event_key -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Point-earning events.
    entries (id) {
        id -> Int8,
        user_profile_id -> Uuid,
        no_bottle -> Int4,
        points -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    reward_items (id) {
        id -> Int8,
        reward_name -> Varchar,
        points_required -> Int4,
    }
}

diesel::table! {
    /// Point-spending events. `points_redeemed` is the total debited.
    redeemed_points (id) {
        id -> Int8,
        user_profile_id -> Uuid,
        reward_item_id -> Int8,
        #[sql_name = "redeemed_points"]
        points_redeemed -> Int4,
        quantity -> Int4,
        receipt_number -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(user_profiles -> accounts (account_id));
diesel::joinable!(device_logs -> devices (device_id));
diesel::joinable!(entries -> user_profiles (user_profile_id));
diesel::joinable!(redeemed_points -> user_profiles (user_profile_id));
diesel::joinable!(redeemed_points -> reward_items (reward_item_id));

diesel::allow_tables_to_appear_in_same_query!(
    accounts,
    device_logs,
    devices,
    entries,
    redeemed_points,
    reward_items,
    school_id_scopes,
    user_profiles,
);

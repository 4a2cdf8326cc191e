//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain's driven ports backed by
//! PostgreSQL via `diesel-async` and a shared `bb8` pool.
//!
//! # Architecture
//!
//! - **Thin adapters**: repositories translate between Diesel rows and
//!   domain types. Balance arithmetic lives in the domain's `Points`.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Atomic business events**: detections and redemptions run as single
//!   transactions that lock the profile row before touching its balance.
//!
//! # Example
//!
//! ```no_run
//! use ecodrop::outbound::persistence::{DbPool, DieselDeviceRepository, PoolConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/ecodrop")).await?;
//! let devices = DieselDeviceRepository::new(pool);
//! # let _ = devices;
//! # Ok(())
//! # }
//! ```

mod diesel_detection_ledger;
mod diesel_device_log_repository;
mod diesel_device_repository;
mod diesel_point_ledger;
mod diesel_redemption_repository;
mod diesel_school_id_repository;
mod diesel_user_profile_repository;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_detection_ledger::DieselDetectionLedger;
pub use diesel_device_log_repository::DieselDeviceLogRepository;
pub use diesel_device_repository::DieselDeviceRepository;
pub use diesel_point_ledger::DieselPointLedger;
pub use diesel_redemption_repository::DieselRedemptionRepository;
pub use diesel_school_id_repository::DieselSchoolIdRepository;
pub use diesel_user_profile_repository::DieselUserProfileRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};

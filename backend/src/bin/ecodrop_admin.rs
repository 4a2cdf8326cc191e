//! Operator CLI: migrations, device keys, accounts, identifiers, rewards and
//! the ledger audit.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde_json::{Value, json};
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use ecodrop::EcoDropSettings;
use ecodrop::domain::{
    AccountService, ApiKey, DeviceCode, DeviceRegistration, DeviceRegistry, EnrollmentYear,
    IdScheme, LedgerAuditService, NewAccount, Points, ReceiptIssuer, RedemptionRequest,
    RedemptionService, SchoolId, SchoolIdService, UserProfile, UserType, Username,
};
use ecodrop::outbound::persistence::{
    DbPool, DieselDeviceRepository, DieselPointLedger, DieselRedemptionRepository,
    DieselSchoolIdRepository, DieselUserProfileRepository, PoolConfig, run_pending_migrations,
};

/// `ecodrop-admin` command arguments.
#[derive(Debug, Parser)]
#[command(name = "ecodrop-admin", about = "EcoDrop operator commands", version)]
struct CliArgs {
    /// Database connection URL. Falls back to `ECODROP_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemeArg {
    Student,
    Faculty,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Register a kiosk, or rotate the key of an existing one.
    RegisterDevice {
        #[arg(long)]
        device_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        location: String,
        /// Key to install; a random one is generated when omitted.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Create an account together with its point profile.
    CreateAccount {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "student")]
        user_type: String,
        #[arg(long)]
        school_id: Option<String>,
    },
    /// Show the next free identifier without reserving it.
    SuggestId {
        #[arg(long, value_enum)]
        scheme: SchemeArg,
        /// Two-digit enrolment year; defaults to the current year.
        #[arg(long)]
        year: Option<u16>,
    },
    /// Assign a school id: the given one, or the next generated one.
    AssignId {
        #[arg(long)]
        username: String,
        #[arg(long)]
        school_id: Option<String>,
    },
    /// Add an item to the reward catalogue.
    AddReward {
        #[arg(long)]
        name: String,
        #[arg(long)]
        points: u32,
    },
    /// Spend a user's points on a reward.
    Redeem {
        #[arg(long)]
        username: String,
        #[arg(long)]
        reward_id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    /// List profiles whose balance disagrees with their history.
    AuditLedger,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

fn resolve_database_url(explicit: Option<String>) -> io::Result<String> {
    if let Some(url) = explicit {
        return Ok(url);
    }
    let settings = EcoDropSettings::load_from_iter([OsString::from("ecodrop-admin")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    settings.database_url.ok_or_else(|| {
        io::Error::other("database url missing: pass --database-url or set ECODROP_DATABASE_URL")
    })
}

fn invalid(error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
}

fn domain(error: ecodrop::domain::Error) -> io::Error {
    match error.details() {
        Some(details) => io::Error::other(format!("{:?}: {error} {details}", error.code())),
        None => io::Error::other(format!("{:?}: {error}", error.code())),
    }
}

fn emit(value: &Value) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{value:#}")
}

fn profile_json(profile: &UserProfile) -> Value {
    json!({
        "profile_id": profile.id,
        "username": profile.username,
        "user_type": profile.user_type.as_str(),
        "school_id": profile.school_id.as_ref().map(ToString::to_string),
        "qr_code_data": profile.qr_code_data,
        "total_points": profile.total_points.value(),
    })
}

async fn connect(database_url: &str) -> io::Result<DbPool> {
    DbPool::new(PoolConfig::new(database_url).with_max_size(2).with_min_idle(None))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))
}

fn accounts(pool: &DbPool) -> AccountService<DieselUserProfileRepository> {
    AccountService::new(Arc::new(DieselUserProfileRepository::new(pool.clone())))
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::parse();
    let database_url = resolve_database_url(args.database_url)?;

    match args.command {
        Command::Migrate => {
            let applied =
                tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
                    .await
                    .map_err(|error| io::Error::other(format!("migration task failed: {error}")))?
                    .map_err(io::Error::other)?;
            emit(&json!({ "applied": applied }))
        }
        Command::RegisterDevice {
            device_id,
            name,
            location,
            api_key,
        } => {
            let registration = DeviceRegistration {
                device_id: DeviceCode::new(device_id).map_err(invalid)?,
                device_name: name,
                location,
                api_key: api_key.map(ApiKey::new).transpose().map_err(invalid)?,
            };
            let pool = connect(&database_url).await?;
            let registered = DeviceRegistry::new(Arc::new(DieselDeviceRepository::new(pool)))
                .register(registration)
                .await
                .map_err(domain)?;
            emit(&json!({
                "device_id": registered.device.device_id.to_string(),
                "status": registered.device.status.as_str(),
                "rotated": registered.rotated,
                "api_key": registered.api_key.expose(),
            }))
        }
        Command::CreateAccount {
            username,
            user_type,
            school_id,
        } => {
            let account = NewAccount {
                username: Username::new(username).map_err(invalid)?,
                user_type: user_type.parse::<UserType>().map_err(invalid)?,
                school_id: school_id.map(SchoolId::new).transpose().map_err(invalid)?,
            };
            let pool = connect(&database_url).await?;
            let profile = accounts(&pool)
                .create_account(account)
                .await
                .map_err(domain)?;
            emit(&profile_json(&profile))
        }
        Command::SuggestId { scheme, year } => {
            let pool = connect(&database_url).await?;
            let service = SchoolIdService::new(
                Arc::new(DieselSchoolIdRepository::new(pool)),
                Arc::new(DefaultClock),
            );
            let scheme = match (scheme, year) {
                (SchemeArg::Faculty, _) => IdScheme::Faculty,
                (SchemeArg::Student, Some(year)) => IdScheme::Student {
                    year: EnrollmentYear::new(year).map_err(invalid)?,
                },
                (SchemeArg::Student, None) => IdScheme::Student {
                    year: service.current_year(),
                },
            };
            let suggestion = service.suggest(scheme).await.map_err(domain)?;
            emit(&json!({ "suggested": suggestion.to_string() }))
        }
        Command::AssignId {
            username,
            school_id,
        } => {
            let pool = connect(&database_url).await?;
            let profile = accounts(&pool)
                .find_by_username(&username)
                .await
                .map_err(domain)?;
            let service = SchoolIdService::new(
                Arc::new(DieselSchoolIdRepository::new(pool)),
                Arc::new(DefaultClock),
            );
            let assigned = match school_id {
                Some(raw) => service.assign_manual(profile.id, &raw).await,
                None => {
                    let scheme = service.scheme_for(profile.user_type);
                    service.assign_generated(profile.id, scheme).await
                }
            }
            .map_err(domain)?;
            emit(&json!({ "username": username, "school_id": assigned.to_string() }))
        }
        Command::AddReward { name, points } => {
            let points = Points::new(points).map_err(invalid)?;
            let pool = connect(&database_url).await?;
            let item = RedemptionService::new(
                Arc::new(DieselRedemptionRepository::new(pool)),
                ReceiptIssuer::system(),
            )
            .add_reward(&name, points)
            .await
            .map_err(domain)?;
            emit(&json!({
                "reward_item_id": item.id,
                "reward_name": item.reward_name,
                "points_required": item.points_required.value(),
            }))
        }
        Command::Redeem {
            username,
            reward_id,
            quantity,
        } => {
            let pool = connect(&database_url).await?;
            let profile = accounts(&pool)
                .find_by_username(&username)
                .await
                .map_err(domain)?;
            let redemption = RedemptionService::new(
                Arc::new(DieselRedemptionRepository::new(pool)),
                ReceiptIssuer::system(),
            )
            .redeem(RedemptionRequest {
                profile_id: profile.id,
                reward_item_id: reward_id,
                quantity,
            })
            .await
            .map_err(domain)?;
            emit(&json!({
                "receipt_number": redemption.receipt_number.to_string(),
                "redeemed_points": redemption.redeemed_points.value(),
                "remaining_points": redemption.remaining_points.value(),
                "valid_until": redemption.valid_until().to_rfc3339(),
            }))
        }
        Command::AuditLedger => {
            let pool = connect(&database_url).await?;
            let found = LedgerAuditService::new(Arc::new(DieselPointLedger::new(pool)))
                .discrepancies()
                .await
                .map_err(domain)?;
            let rows: Vec<Value> = found
                .iter()
                .map(|d| {
                    json!({
                        "profile_id": d.profile_id,
                        "recorded": d.recorded,
                        "expected": d.expected(),
                        "earned": d.earned,
                        "redeemed": d.redeemed,
                    })
                })
                .collect();
            emit(&json!({ "discrepancies": rows }))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use env_lock::lock_env;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn assign_id_without_school_id_generates() {
        let args = CliArgs::try_parse_from(["ecodrop-admin", "assign-id", "--username", "maria"])
            .expect("valid args");
        assert!(matches!(
            args.command,
            Command::AssignId { school_id: None, .. }
        ));
    }

    #[test]
    fn redeem_defaults_to_one_unit() {
        let args = CliArgs::try_parse_from([
            "ecodrop-admin",
            "--database-url",
            "postgres://localhost/ecodrop",
            "redeem",
            "--username",
            "maria",
            "--reward-id",
            "7",
        ])
        .expect("valid args");
        assert_eq!(
            args.database_url.as_deref(),
            Some("postgres://localhost/ecodrop")
        );
        assert!(matches!(args.command, Command::Redeem { quantity: 1, .. }));
    }

    #[test]
    fn database_url_falls_back_to_environment() {
        let _guard = lock_env([(
            "ECODROP_DATABASE_URL",
            Some("postgres://env@localhost/ecodrop".to_owned()),
        )]);
        let url = resolve_database_url(None).expect("url from environment");
        assert_eq!(url, "postgres://env@localhost/ecodrop");

        let url = resolve_database_url(Some("postgres://flag/ecodrop".to_owned()))
            .expect("explicit url");
        assert_eq!(url, "postgres://flag/ecodrop");
    }

    #[test]
    fn missing_database_url_is_reported() {
        let _guard = lock_env([("ECODROP_DATABASE_URL", None::<String>)]);
        let err = resolve_database_url(None).expect_err("no url configured");
        assert!(err.to_string().contains("ECODROP_DATABASE_URL"));
    }
}

//! EcoDrop server entry-point: loads settings, prepares the database, and
//! serves the device API.

mod server;

use std::io;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use ecodrop::EcoDropSettings;
use ecodrop::inbound::http::health::HealthState;
use ecodrop::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
#[cfg(feature = "metrics")]
use server::make_metrics;
use server::{ServerConfig, create_server};

async fn apply_migrations(database_url: &str) -> io::Result<()> {
    let url = database_url.to_owned();
    tokio::task::spawn_blocking(move || run_pending_migrations(&url))
        .await
        .map_err(|err| io::Error::other(format!("migration task failed: {err}")))?
        .map_err(io::Error::other)?;
    Ok(())
}

async fn build_config(settings: &EcoDropSettings) -> io::Result<ServerConfig> {
    let points_per_bottle = settings
        .points_per_bottle()
        .map_err(|err| io::Error::other(format!("invalid points_per_bottle: {err}")))?;
    let config = ServerConfig::new(settings.bind_addr(), points_per_bottle);

    let config = match settings.database_url.as_deref() {
        Some(url) => {
            if settings.run_migrations {
                apply_migrations(url).await?;
            }
            let pool = DbPool::new(PoolConfig::new(url).with_max_size(settings.pool_max_size()))
                .await
                .map_err(|err| io::Error::other(format!("database pool: {err}")))?;
            config.with_db_pool(pool)
        }
        None => {
            warn!("ECODROP_DATABASE_URL unset; every device key will be rejected");
            config
        }
    };

    #[cfg(feature = "metrics")]
    let config = config.with_metrics(make_metrics());

    Ok(config)
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = EcoDropSettings::load()
        .map_err(|err| io::Error::other(format!("failed to load settings: {err}")))?;
    let config = build_config(&settings).await?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), config)?;
    info!(bind_addr = %settings.bind_addr(), "ecodrop listening");
    let result = server.await;
    health_state.mark_unhealthy();
    result
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use env_lock::lock_env;

    use super::*;

    #[tokio::test]
    async fn missing_database_url_serves_without_a_pool() {
        let settings = {
            let _guard = lock_env([
                ("ECODROP_DATABASE_URL", None::<String>),
                ("ECODROP_BIND_ADDR", Some("127.0.0.1:9191".to_owned())),
                ("ECODROP_POINTS_PER_BOTTLE", Some("3".to_owned())),
            ]);
            EcoDropSettings::load_from_iter([OsString::from("ecodrop")]).expect("settings")
        };

        let config = build_config(&settings).await.expect("config");
        assert!(config.db_pool.is_none());
        assert_eq!(config.points_per_bottle.value(), 3);
        assert_eq!(config.bind_addr.port(), 9191);
    }
}

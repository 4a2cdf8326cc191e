//! Runtime settings loaded via OrthoConfig.
//!
//! Values layer as defaults < config file < `ECODROP_*` environment < CLI.

use std::net::SocketAddr;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{Points, PointsError};

const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8080);
const DEFAULT_POINTS_PER_BOTTLE: u32 = 1;
const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Settings shared by the server and the admin CLI.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ECODROP")]
pub struct EcoDropSettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Listener address for the HTTP server.
    pub bind_addr: Option<SocketAddr>,
    /// Points credited per plastic bottle.
    pub points_per_bottle: Option<u32>,
    /// Upper bound on pooled database connections.
    pub pool_max_size: Option<u32>,
    /// Apply embedded migrations before serving.
    #[ortho_config(default = false)]
    pub run_migrations: bool,
}

impl EcoDropSettings {
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr.unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Per-bottle award, validated against the points ceiling.
    pub fn points_per_bottle(&self) -> Result<Points, PointsError> {
        Points::new(self.points_per_bottle.unwrap_or(DEFAULT_POINTS_PER_BOTTLE))
    }

    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE)
    }
}

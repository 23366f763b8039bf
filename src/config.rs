// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! by the server binary. Configuration is loaded from the environment at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the lending store | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SEED_FILE` | JSON file with pools, contributions and profiles loaded at startup | Optional |
//! | `CHAIN_DATA_API_URL` | Chain-data API root for ERC-20 balances | Moralis v2.2 |
//! | `CHAIN_DATA_API_KEY` | API key sent as `X-API-Key` | Optional |
//! | `RATE_API_URL` | Conversion rate API root | `https://open.er-api.com/v6` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::storage::StoragePaths;
use crate::upstream::{DEFAULT_CHAIN_DATA_API_URL, DEFAULT_RATE_API_URL};

/// Environment variable name for the data directory path.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SEED_FILE_ENV: &str = "SEED_FILE";
pub const CHAIN_DATA_API_URL_ENV: &str = "CHAIN_DATA_API_URL";
pub const CHAIN_DATA_API_KEY_ENV: &str = "CHAIN_DATA_API_KEY";
pub const RATE_API_URL_ENV: &str = "RATE_API_URL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub seed_file: Option<PathBuf>,
    pub chain_data_api_url: String,
    pub chain_data_api_key: Option<String>,
    pub rate_api_url: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: StoragePaths::default().root().to_path_buf(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            seed_file: None,
            chain_data_api_url: DEFAULT_CHAIN_DATA_API_URL.to_string(),
            chain_data_api_key: None,
            rate_api_url: DEFAULT_RATE_API_URL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV,
                value: raw,
            })?,
            None => defaults.port,
        };

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.data_dir),
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port,
            seed_file: get(SEED_FILE_ENV).map(PathBuf::from),
            chain_data_api_url: get(CHAIN_DATA_API_URL_ENV).unwrap_or(defaults.chain_data_api_url),
            chain_data_api_key: get(CHAIN_DATA_API_KEY_ENV),
            rate_api_url: get(RATE_API_URL_ENV).unwrap_or(defaults.rate_api_url),
            log_format: get(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: HOST_ENV,
            value: raw,
        })
    }

    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir)
    }
}

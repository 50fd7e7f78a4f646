//! Typed settings populated from the environment (spec §6), validated
//! eagerly at startup the way the teacher's `config::loader` validates a
//! parsed TOML config — fail fast with a named missing/invalid value
//! rather than discovering it deep inside a running task.

use std::env;
use std::path::PathBuf;

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub proxy_db_path: PathBuf,
    pub geoip_db_path: PathBuf,
    pub geoip_db_download_url: Option<String>,
    pub nodes_init_path: Option<PathBuf>,
    pub try_url: String,
    pub proxy_search_threads: usize,
    pub net_blacklist_path: Option<PathBuf>,
    pub instance_url: Option<String>,
    pub log_level: String,
}

impl Settings {
    /// Reads every variable from the process environment, applying the
    /// defaults from spec §6. The only way this fails is a malformed
    /// `PROXY_SEARCH_THREADS` — every other variable is optional text.
    pub fn from_env() -> Result<Self> {
        let proxy_search_threads = match env::var("PROXY_SEARCH_THREADS") {
            Ok(value) => value
                .parse::<usize>()
                .map_err(|_| RegistryError::Config(format!("PROXY_SEARCH_THREADS must be a positive integer, got '{value}'")))?,
            Err(_) => 100,
        };
        if proxy_search_threads == 0 {
            return Err(RegistryError::Config("PROXY_SEARCH_THREADS must be greater than zero".to_string()));
        }

        Ok(Self {
            proxy_db_path: env::var("PROXY_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("tmp/proxy.db")),
            geoip_db_path: env::var("GEOIP_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("tmp/geoip.db")),
            geoip_db_download_url: env::var("GEOIP_DB_DOWNLOAD_URL").ok(),
            nodes_init_path: env::var("NODES_INIT_PATH").map(PathBuf::from).ok(),
            try_url: env::var("TRY_URL").unwrap_or_else(|_| "http://example.org/".to_string()),
            proxy_search_threads,
            net_blacklist_path: env::var("NET_BLACKLIST").map(PathBuf::from).ok(),
            instance_url: env::var("INSTANCE_URL").ok(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "WARNING".to_string()),
        })
    }
}

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;

use crate::storage::DEFAULT_CACHE_TTL;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DATA_PATH: &str = "data/store.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_path: PathBuf,
    /// Fallback for building public links when the request carries no
    /// forwarding or host headers.
    pub base_url: String,
    pub cache_ttl: Duration,
}

/// Command-line overrides. Anything left out falls back to the environment.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "activity_store", version, about = "Activity provider backend")]
pub struct Cli {
    /// Address to listen on (env: AP_BIND_ADDR)
    #[arg(long)]
    pub bind: Option<String>,

    /// Path of the JSON store file (env: AP_DATA_PATH)
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Public base URL used in generated links (env: AP_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Cache freshness window in milliseconds (env: AP_CACHE_TTL_MS)
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = env_string("AP_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .context("AP_BIND_ADDR must be a valid host:port")?;

        let data_path = PathBuf::from(env_string("AP_DATA_PATH", DEFAULT_DATA_PATH));
        let base_url = env_string("AP_BASE_URL", "").trim().to_string();

        let cache_ttl = match lookup("AP_CACHE_TTL_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse::<u64>()
                    .context("AP_CACHE_TTL_MS must be a whole number of milliseconds")?,
            ),
            None => DEFAULT_CACHE_TTL,
        };

        Ok(Self {
            bind_addr,
            data_path,
            base_url,
            cache_ttl,
        })
    }

    /// Apply command-line values on top of this configuration.
    pub fn merge_cli(mut self, cli: Cli) -> Result<Self> {
        if let Some(bind) = cli.bind {
            self.bind_addr = bind
                .parse::<SocketAddr>()
                .with_context(|| format!("--bind '{}' is not a valid host:port", bind))?;
        }
        if let Some(data_path) = cli.data_path {
            self.data_path = data_path;
        }
        if let Some(base_url) = cli.base_url {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(ttl_ms) = cli.cache_ttl_ms {
            self.cache_ttl = Duration::from_millis(ttl_ms);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(config.data_path, PathBuf::from("data/store.json"));
        assert_eq!(config.base_url, "");
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
    }

    #[test]
    fn test_env_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AP_BIND_ADDR", "0.0.0.0:9000"),
            ("AP_DATA_PATH", "/var/lib/ap/store.json"),
            ("AP_BASE_URL", " https://ap.example "),
            ("AP_CACHE_TTL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.data_path, PathBuf::from("/var/lib/ap/store.json"));
        assert_eq!(config.base_url, "https://ap.example");
        assert_eq!(config.cache_ttl, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("AP_BIND_ADDR", "nowhere")])).unwrap_err();
        assert!(err.to_string().contains("AP_BIND_ADDR"));
        let err = AppConfig::from_lookup(lookup(&[("AP_CACHE_TTL_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("AP_CACHE_TTL_MS"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let cli = Cli::parse_from([
            "activity_store",
            "--bind",
            "127.0.0.1:7000",
            "--cache-ttl-ms",
            "0",
        ]);
        let config = AppConfig::from_lookup(lookup(&[("AP_BIND_ADDR", "0.0.0.0:9000")]))
            .unwrap()
            .merge_cli(cli)
            .unwrap();
        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
    }
}

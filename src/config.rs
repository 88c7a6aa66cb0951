// src/config.rs

use anyhow::{anyhow, bail, Context, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};
use url::Url;

use crate::fetch::RetryPolicy;
use crate::pipeline::PipelineSettings;

pub const DEFAULT_LOG_FILE: &str = "logs/census_pipeline.log";
pub const DEFAULT_VERIFY_LOG_FILE: &str = "logs/verify_data_load.log";
pub const DEFAULT_REPORT_PATH: &str = "reports/data_update_report.json";
pub const DEFAULT_DATABASE: &str = "census.duckdb";

/// Database, report and logging settings. This is all the `verify` binary
/// needs; the loader adds the API settings in [`Config`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database: String,
    pub log_level: String,
    pub log_file: PathBuf,
    pub report_path: PathBuf,
}

impl StorageConfig {
    pub fn from_env(default_log_file: &str) -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), default_log_file)
    }

    /// `LOG_FILE` falls back to `default_log_file`, which differs per binary.
    pub fn from_lookup<F>(lookup: F, default_log_file: &str) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(&lookup, key);
        Ok(Self {
            database: get("DB_CONNECTION_STRING").unwrap_or_else(|| DEFAULT_DATABASE.into()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_file: get("LOG_FILE")
                .unwrap_or_else(|| default_log_file.into())
                .into(),
            report_path: get("REPORT_PATH")
                .unwrap_or_else(|| DEFAULT_REPORT_PATH.into())
                .into(),
        })
    }
}

/// Loader settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub base_url: Url,
    pub api_key: String,
    pub geography: String,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    pub derive_probabilities: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key → value source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(&lookup, key);
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{} is not set", key));

        let base_url = require("BASE_URL")?;
        let base_url =
            Url::parse(&base_url).with_context(|| format!("BASE_URL {:?} is not a URL", base_url))?;

        let max_attempts: u32 = parse_or(&get, "FETCH_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            bail!("FETCH_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            storage: StorageConfig::from_lookup(&lookup, DEFAULT_LOG_FILE)?,
            base_url,
            api_key: require("CENSUS_API_KEY")?,
            geography: get("GEOGRAPHY").unwrap_or_else(|| "state:*".into()),
            max_attempts,
            backoff_base: Duration::from_millis(parse_or(&get, "FETCH_BACKOFF_MS", 1000)?),
            request_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 30)?),
            derive_probabilities: parse_or(&get, "DERIVE_PROBABILITIES", true)?,
        })
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(self.max_attempts, self.backoff_base)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            endpoint: self.base_url.clone(),
            api_key: self.api_key.clone(),
            geography: self.geography.clone(),
            report_path: self.storage.report_path.clone(),
            derive_probabilities: self.derive_probabilities,
        }
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        Config::from_lookup(lookup(pairs))
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("BASE_URL", "https://api.census.gov/data/2022/acs/acs5"),
        ("CENSUS_API_KEY", "abc123"),
    ];

    #[test]
    fn test_defaults() -> Result<()> {
        let c = config(&REQUIRED)?;
        assert_eq!(c.storage.database, DEFAULT_DATABASE);
        assert_eq!(c.storage.log_level, "info");
        assert_eq!(c.storage.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(c.storage.report_path, PathBuf::from(DEFAULT_REPORT_PATH));
        assert_eq!(c.geography, "state:*");
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.backoff_base, Duration::from_secs(1));
        assert!(c.derive_probabilities);
        assert_eq!(c.retry_policy()?, RetryPolicy::default());
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("FETCH_MAX_ATTEMPTS", "5"),
            ("FETCH_BACKOFF_MS", "10"),
            ("DERIVE_PROBABILITIES", "false"),
            ("DB_CONNECTION_STRING", "/tmp/acs.duckdb"),
            ("LOG_LEVEL", " "),
        ]);
        let c = config(&pairs)?;
        assert_eq!(c.max_attempts, 5);
        assert_eq!(c.backoff_base, Duration::from_millis(10));
        assert!(!c.derive_probabilities);
        assert_eq!(c.storage.database, "/tmp/acs.duckdb");
        assert_eq!(c.storage.log_level, "info");
        assert_eq!(c.pipeline_settings().api_key, "abc123");
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[REQUIRED[1]]).is_err());
        assert!(config(&[("BASE_URL", "not a url"), REQUIRED[1]]).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("FETCH_MAX_ATTEMPTS", "0"));
        assert!(config(&pairs).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("FETCH_TIMEOUT_SECS", "soon"));
        let err = config(&pairs).unwrap_err().to_string();
        assert!(err.contains("FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_storage_config_needs_no_api_settings() -> Result<()> {
        let c = StorageConfig::from_lookup(
            lookup(&[("DB_CONNECTION_STRING", "/data/acs.duckdb")]),
            DEFAULT_VERIFY_LOG_FILE,
        )?;
        assert_eq!(c.database, "/data/acs.duckdb");
        assert_eq!(c.log_file, PathBuf::from(DEFAULT_VERIFY_LOG_FILE));
        assert_eq!(c.report_path, PathBuf::from(DEFAULT_REPORT_PATH));
        Ok(())
    }

    #[test]
    fn test_blank_log_file_uses_binary_default() -> Result<()> {
        let c =
            StorageConfig::from_lookup(lookup(&[("LOG_FILE", "  ")]), DEFAULT_VERIFY_LOG_FILE)?;
        assert_eq!(c.log_file, PathBuf::from(DEFAULT_VERIFY_LOG_FILE));

        let c = StorageConfig::from_lookup(
            lookup(&[("LOG_FILE", "/var/log/v.log")]),
            DEFAULT_VERIFY_LOG_FILE,
        )?;
        assert_eq!(c.log_file, PathBuf::from("/var/log/v.log"));
        Ok(())
    }
}

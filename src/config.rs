use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::slug::DEFAULT_SLUG_LENGTH;
use crate::store::{DEFAULT_TTL_SECONDS, StoreOptions};

pub const CONFIG_FILE: &str = ".slugstash.toml";
pub const DATA_DIR_ENV: &str = "SLUGSTASH_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = ".slugstash";
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Root holding `db/` (metadata) and `storage/` (archives)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub default_ttl: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `path` when it exists, then applies environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let config = Self::load_from_file(path)?;
            let abs_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            info!("Using configuration file: {}", abs_path.display());
            config
        } else {
            Self::default()
        };
        Ok(config.apply_env())
    }

    pub fn apply_env(mut self) -> Self {
        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            slug_length: self.slug_length.filter(|len| *len > 0).unwrap_or(DEFAULT_SLUG_LENGTH),
            default_ttl_seconds: self
                .default_ttl
                .map(|ttl| ttl.as_secs())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TTL_SECONDS),
        }
    }

    pub fn generate_config_file(path: &Path, force: bool) -> anyhow::Result<()> {
        if path.exists() && !force {
            anyhow::bail!(
                "Configuration file {} already exists. Use --force to overwrite.",
                path.display()
            );
        }

        fs::write(path, Self::generate_full_config()?)?;

        info!("Configuration file generated: {}", path.display());
        info!("Please edit this file to customize configuration");
        Ok(())
    }

    pub fn generate_full_config() -> anyhow::Result<String> {
        let config = AppConfig {
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            slug_length: Some(DEFAULT_SLUG_LENGTH),
            default_ttl: Some(Duration::from_secs(DEFAULT_TTL_SECONDS)),
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        };
        let toml_content = toml::to_string_pretty(&config)?;
        Ok(format!(
            "# slugstash configuration file\n# All fields are optional, command line arguments override config file values\n\n{}",
            toml_content
        ))
    }
}

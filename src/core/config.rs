use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CbrProviderConfig {
    #[serde(default = "default_cbr_base_url")]
    pub base_url: String,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for CbrProviderConfig {
    fn default() -> Self {
        CbrProviderConfig {
            base_url: default_cbr_base_url(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub cbr: CbrProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConcurrencyConfig {
    /// Maximum number of months fetched at once.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch: usize,
    /// Maximum number of year partitions normalized at once. Defaults to the
    /// available parallelism of the machine.
    pub normalize: Option<usize>,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        ConcurrencyConfig {
            fetch: default_fetch_concurrency(),
            normalize: None,
        }
    }
}

impl ConcurrencyConfig {
    pub fn normalize_workers(&self) -> usize {
        self.normalize
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default = "default_partitions_dir")]
    pub partitions_dir: PathBuf,
    #[serde(default = "default_rates_path")]
    pub rates_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// A currency gets a rate column only when it occurs strictly more often than this.
    #[serde(default = "default_min_currency_count")]
    pub min_currency_count: u64,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

fn default_source() -> PathBuf {
    PathBuf::from("vacancies_dif_currencies.csv")
}

fn default_partitions_dir() -> PathBuf {
    PathBuf::from("years")
}

fn default_rates_path() -> PathBuf {
    PathBuf::from("convert.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("normalized")
}

fn default_base_currency() -> String {
    "RUR".to_string()
}

fn default_min_currency_count() -> u64 {
    5000
}

fn default_cbr_base_url() -> String {
    "http://www.cbr.ru".to_string()
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_fetch_concurrency() -> usize {
    8
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            source: default_source(),
            partitions_dir: default_partitions_dir(),
            rates_path: default_rates_path(),
            output_dir: default_output_dir(),
            base_currency: default_base_currency(),
            min_currency_count: default_min_currency_count(),
            providers: ProvidersConfig::default(),
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or falls back to the
    /// built-in defaults when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "vacnorm", "vacnorm")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::background::BackgroundInput;
use crate::biomart::DEFAULT_MART_URL;
use crate::enrichr::DEFAULT_BASE_URL;
use crate::error::EnrichError;
use crate::retry::RetryPolicies;

pub const DEFAULT_CONFIG_FILE: &str = "kira-enrich.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cutoff: Option<f64>,
    #[serde(default)]
    pub background: Option<BackgroundEntry>,
    #[serde(default)]
    pub outdir: Option<String>,
    #[serde(default)]
    pub no_plot: Option<bool>,
    #[serde(default)]
    pub top_term: Option<usize>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub mart_url: Option<String>,
    #[serde(default)]
    pub courtesy_delay_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<RetryPolicies>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackgroundEntry {
    Count(u64),
    Genes(Vec<String>),
    Spec(String),
}

impl From<BackgroundEntry> for BackgroundInput {
    fn from(entry: BackgroundEntry) -> Self {
        match entry {
            BackgroundEntry::Count(count) => BackgroundInput::Count(count),
            BackgroundEntry::Genes(genes) => BackgroundInput::Genes(genes.into_iter().collect()),
            BackgroundEntry::Spec(spec) => BackgroundInput::Spec(spec),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub organism: String,
    pub description: String,
    pub cutoff: f64,
    pub background: BackgroundInput,
    pub outdir: Option<Utf8PathBuf>,
    pub no_plot: bool,
    pub top_term: usize,
    pub base_url: String,
    pub mart_url: String,
    pub courtesy_delay: Duration,
    pub retries: RetryPolicies,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EnrichError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(EnrichError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|err| EnrichError::Read {
            path: config_path.clone(),
            message: err.to_string(),
        })?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EnrichError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, EnrichError> {
        let cutoff = config.cutoff.unwrap_or(0.05);
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(EnrichError::ConfigParse(format!(
                "cutoff must be in (0, 1], got {cutoff}"
            )));
        }
        let retries = config.retries.unwrap_or_default();
        if retries.fetch.max_attempts == 0 {
            return Err(EnrichError::ConfigParse(
                "retries.fetch.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            organism: config.organism.unwrap_or_else(|| "human".to_string()),
            description: config.description.unwrap_or_default(),
            cutoff,
            background: config.background.map(Into::into).unwrap_or_default(),
            outdir: match config.outdir {
                Some(dir) if dir.trim().is_empty() => None,
                Some(dir) => Some(Utf8PathBuf::from(dir)),
                None => Some(Utf8PathBuf::from("Enrichr")),
            },
            no_plot: config.no_plot.unwrap_or(false),
            top_term: config.top_term.unwrap_or(10),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            mart_url: config
                .mart_url
                .unwrap_or_else(|| DEFAULT_MART_URL.to_string()),
            courtesy_delay: Duration::from_millis(config.courtesy_delay_ms.unwrap_or(1000)),
            retries,
        })
    }
}

//! `load_config`: reads the optional YAML config file and maps it onto the
//! core [`GeneratorConfig`], then injects secrets from the environment.
//!
//! The YAML side is its own set of types ([`CliConfig`] and its sections) so
//! the file schema can differ from the core structs. Secrets are never read
//! from the file: `model.api_key` and the GitHub token come only from
//! `ANTHROPIC_API_KEY` and `GITHUB_TOKEN` (or CLI flags). Every key is
//! optional; anything missing keeps its default.

use anyhow::Result;
use query_gen_core::config::{GeneratorConfig, HttpConfig, ModelConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    pub collection_source: Option<String>,
    pub collection_name: Option<String>,
    pub output_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub modules_to_analyze: Option<Vec<String>>,
    pub extension_version: Option<String>,
    #[serde(default)]
    pub check_mode: bool,
    #[serde(default)]
    pub model: ModelSection,
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpSection,
}

/// `model:` keys. The API key only comes from the environment or `--api-key`.
#[derive(Debug, Default, Deserialize)]
pub struct ModelSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpSection {
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub github_api: Option<String>,
    pub galaxy_api: Option<String>,
}

impl CliConfig {
    /// Overlays the file values on the core defaults.
    pub fn into_generator_config(self) -> GeneratorConfig {
        let defaults = GeneratorConfig::default();
        GeneratorConfig {
            collection_source: self.collection_source.unwrap_or(defaults.collection_source),
            collection_name: self.collection_name,
            output_path: self.output_path.unwrap_or(defaults.output_path),
            report_path: self.report_path,
            modules_to_analyze: self.modules_to_analyze,
            extension_version: self.extension_version.unwrap_or(defaults.extension_version),
            check_mode: self.check_mode,
            model: self.model.into_model_config(defaults.model),
            cache_dir: self.cache_dir,
            http: self.http.into_http_config(defaults.http),
        }
    }
}

impl ModelSection {
    fn into_model_config(self, defaults: ModelConfig) -> ModelConfig {
        ModelConfig {
            api_key: None,
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            model: self.model.unwrap_or(defaults.model),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
        }
    }
}

impl HttpSection {
    fn into_http_config(self, defaults: HttpConfig) -> HttpConfig {
        HttpConfig {
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            github_api: self.github_api.unwrap_or(defaults.github_api),
            galaxy_api: self.galaxy_api.unwrap_or(defaults.galaxy_api),
            github_token: None,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GeneratorConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut config = raw.into_generator_config();
    apply_env_secrets(&mut config);
    Ok(config)
}

/// Fills credentials from the environment. Empty values count as unset.
pub fn apply_env_secrets(config: &mut GeneratorConfig) {
    config.model.api_key = non_empty_env(API_KEY_ENV);
    config.http.github_token = non_empty_env(GITHUB_TOKEN_ENV);
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

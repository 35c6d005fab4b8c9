use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_OUTPUT_PATH: &str = "./event_query.yml";
pub const DEFAULT_EXTENSION_VERSION: &str = "1.0.0";
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_GALAXY_API: &str = "https://galaxy.ansible.com";

/// Everything one generation run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// GitHub URL, Galaxy reference or local directory.
    pub collection_source: String,
    pub collection_name: Option<String>,
    pub output_path: PathBuf,
    /// Defaults to `<output stem>.review.txt` next to the output file.
    pub report_path: Option<PathBuf>,
    pub modules_to_analyze: Option<Vec<String>>,
    pub extension_version: String,
    /// Analyse and render, but write nothing.
    pub check_mode: bool,
    pub model: ModelConfig,
    /// Enables the model reply cache when set.
    pub cache_dir: Option<PathBuf>,
    pub http: HttpConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            collection_source: String::new(),
            collection_name: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            report_path: None,
            modules_to_analyze: None,
            extension_version: DEFAULT_EXTENSION_VERSION.to_string(),
            check_mode: false,
            model: ModelConfig::default(),
            cache_dir: None,
            http: HttpConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn resolved_report_path(&self) -> PathBuf {
        match &self.report_path {
            Some(path) => path.clone(),
            None => default_report_path(&self.output_path),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            collection_source = %self.collection_source,
            output_path = %self.output_path.display(),
            check_mode = self.check_mode,
            model_enabled = self.model.api_key.is_some(),
            "Loaded GeneratorConfig"
        );
        debug!(?self, "GeneratorConfig loaded (full debug)");
    }
}

fn default_report_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "event_query".to_string());
    output_path.with_file_name(format!("{stem}.review.txt"))
}

/// External model settings. The credential never comes from a config file.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Modules per model request.
    pub batch_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            api_key: None,
            endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            max_retries: 3,
            batch_size: 10,
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Settings for the documentation fetchers.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub github_api: String,
    pub galaxy_api: String,
    /// Sent as a bearer token to the GitHub API when set.
    #[serde(skip)]
    pub github_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 20,
            max_retries: 3,
            github_api: DEFAULT_GITHUB_API.to_string(),
            galaxy_api: DEFAULT_GALAXY_API.to_string(),
            github_token: None,
        }
    }
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("github_api", &self.github_api)
            .field("galaxy_api", &self.galaxy_api)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

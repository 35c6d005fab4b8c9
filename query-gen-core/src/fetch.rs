//! [`Fetcher`] implementation covering GitHub, Galaxy and local collections.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::HttpConfig;
use crate::contract::{FetchedCollection, FetchedModule, Fetcher, SourceKind};
use crate::error::{FetchError, SourceError};
use crate::source::CollectionSource;
use crate::{galaxy, github};

/// DefaultFetcher holds one HTTP client and dispatches on the source kind.
pub struct DefaultFetcher {
    client: reqwest::Client,
    http: HttpConfig,
}

impl DefaultFetcher {
    pub fn new(http: HttpConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .map_err(|e| SourceError::Transport {
                service: "http",
                url: String::new(),
                message: format!("could not build HTTP client: {e}"),
            })?;
        Ok(Self { client, http })
    }
}

#[async_trait::async_trait]
impl Fetcher for DefaultFetcher {
    async fn fetch_collection(
        &self,
        source: &CollectionSource,
    ) -> Result<FetchedCollection, SourceError> {
        match source {
            CollectionSource::Github { org, repo } => {
                github::fetch(&self.client, &self.http, org, repo).await
            }
            CollectionSource::Galaxy {
                namespace,
                name,
                version,
            } => galaxy::fetch(&self.client, &self.http, namespace, name, version.as_deref()).await,
            CollectionSource::Local { path } => fetch_local(path),
        }
    }
}

/// Module name for a file in `plugins/modules`, or `None` if it is not a module.
pub(crate) fn module_name_of(file_name: &str) -> Option<String> {
    match file_name.strip_suffix(".py") {
        Some(stem) if !stem.is_empty() && stem != "__init__" => Some(stem.to_string()),
        _ => None,
    }
}

/// Sorts modules by name and rejects an empty collection.
pub(crate) fn sort_and_check(
    mut collection: FetchedCollection,
    described: &str,
) -> Result<FetchedCollection, SourceError> {
    if collection.modules.is_empty() {
        error!(source = %described, "[FETCH][ERROR] No modules found");
        return Err(SourceError::NoModules(described.to_string()));
    }
    collection.modules.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(collection)
}

#[derive(Debug, Deserialize)]
struct GalaxyManifest {
    namespace: String,
    name: String,
}

/// Default collection name of a local checkout: `galaxy.yml` when present, else the basename.
pub fn local_collection_name(path: &Path) -> String {
    let from_manifest = fs::read_to_string(path.join("galaxy.yml"))
        .ok()
        .and_then(|raw| serde_yaml::from_str::<GalaxyManifest>(&raw).ok())
        .map(|m| format!("{}.{}", m.namespace, m.name));
    if let Some(name) = from_manifest {
        return name;
    }
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads `<path>/plugins/modules/*.py`.
pub fn fetch_local(path: &Path) -> Result<FetchedCollection, SourceError> {
    let modules_dir = path.join("plugins").join("modules");
    if !modules_dir.is_dir() {
        error!(path = %path.display(), "[FETCH][ERROR] No plugins/modules directory");
        return Err(SourceError::MissingModulesDir(path.to_path_buf()));
    }
    info!(path = %modules_dir.display(), "[FETCH] Reading local modules");

    let mut modules = Vec::new();
    for entry in fs::read_dir(&modules_dir)? {
        let entry = entry?;
        let file_path = entry.path();
        if !file_path.is_file() {
            continue;
        }
        let Some(name) = module_name_of(&entry.file_name().to_string_lossy()) else {
            continue;
        };
        let content = fs::read_to_string(&file_path).map_err(|e| FetchError::Read {
            path: file_path.display().to_string(),
            message: e.to_string(),
        });
        match &content {
            Ok(text) => debug!(module = %name, bytes = text.len(), "Read module"),
            Err(e) => warn!(module = %name, error = %e, "[FETCH] Could not read module"),
        }
        modules.push(FetchedModule { name, content });
    }

    sort_and_check(
        FetchedCollection {
            collection_name: local_collection_name(path),
            source: SourceKind::Local,
            modules,
        },
        &path.display().to_string(),
    )
}

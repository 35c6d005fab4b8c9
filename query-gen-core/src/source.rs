//! Resolves a user-supplied collection reference into a typed source.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::contract::SourceKind;
use crate::error::SourceError;

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/]+)/([^/?#]+)").expect("static regex")
});

static COLLECTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9_]+)\.([a-z0-9_]+)$").expect("static regex")
});

/// A collection source reference after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollectionSource {
    Github {
        org: String,
        repo: String,
    },
    Galaxy {
        namespace: String,
        name: String,
        version: Option<String>,
    },
    Local {
        path: PathBuf,
    },
}

impl CollectionSource {
    /// Resolve a reference: a GitHub URL, `galaxy:ns.name[:version]`, an existing
    /// directory, or a bare `ns.name` Galaxy collection.
    pub fn parse(reference: &str) -> Result<Self, SourceError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(SourceError::InvalidReference(reference.to_string()));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let caps = GITHUB_URL
                .captures(trimmed)
                .ok_or_else(|| SourceError::InvalidReference(reference.to_string()))?;
            let org = caps[1].to_string();
            let repo = caps[2]
                .trim_end_matches('/')
                .trim_end_matches(".git")
                .to_string();
            if repo.is_empty() {
                return Err(SourceError::InvalidReference(reference.to_string()));
            }
            return Ok(CollectionSource::Github { org, repo });
        }

        if let Some(rest) = trimmed.strip_prefix("galaxy:") {
            let (name, version) = match rest.split_once(':') {
                Some((name, version)) if !version.is_empty() => (name, Some(version.to_string())),
                Some((name, _)) => (name, None),
                None => (rest, None),
            };
            return Self::galaxy(name, version)
                .ok_or_else(|| SourceError::InvalidReference(reference.to_string()));
        }

        let path = Path::new(trimmed);
        if path.is_dir() {
            return Ok(CollectionSource::Local {
                path: path.to_path_buf(),
            });
        }

        Self::galaxy(trimmed, None)
            .ok_or_else(|| SourceError::InvalidReference(reference.to_string()))
    }

    fn galaxy(name: &str, version: Option<String>) -> Option<Self> {
        let caps = COLLECTION_NAME.captures(name)?;
        Some(CollectionSource::Galaxy {
            namespace: caps[1].to_string(),
            name: caps[2].to_string(),
            version,
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            CollectionSource::Github { .. } => SourceKind::Github,
            CollectionSource::Galaxy { .. } => SourceKind::Galaxy,
            CollectionSource::Local { .. } => SourceKind::Local,
        }
    }

    /// Human-readable form used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            CollectionSource::Github { org, repo } => format!("github.com/{org}/{repo}"),
            CollectionSource::Galaxy {
                namespace,
                name,
                version,
            } => match version {
                Some(v) => format!("galaxy {namespace}.{name}:{v}"),
                None => format!("galaxy {namespace}.{name}"),
            },
            CollectionSource::Local { path } => path.display().to_string(),
        }
    }
}

/// Splits `namespace.collection`; a name without a dot is used for both parts.
pub fn split_collection_name(collection_name: &str) -> (&str, &str) {
    match collection_name.split_once('.') {
        Some((namespace, collection)) if !collection.is_empty() => (namespace, collection),
        _ => (collection_name, collection_name),
    }
}

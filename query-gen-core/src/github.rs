//! GitHub contents API fetcher for `plugins/modules`.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::contract::{FetchedCollection, FetchedModule, SourceKind};
use crate::error::{FetchError, SourceError};
use crate::fetch::{module_name_of, sort_and_check};
use crate::http_retry::{send_with_retry, RetryFailure};

const SERVICE: &str = "GitHub";

/// One entry of a contents API directory listing.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub download_url: Option<String>,
}

/// Default collection name for a repository.
pub fn default_collection_name(org: &str, repo: &str) -> String {
    let looks_like_collection = repo
        .split_once('.')
        .is_some_and(|(ns, name)| !ns.is_empty() && !name.is_empty() && !name.contains('.'));
    if looks_like_collection {
        repo.to_string()
    } else {
        format!("{org}.{repo}")
    }
}

/// Keeps module files: `*.py` except `__init__.py`, sorted by name.
pub(crate) fn module_entries(entries: Vec<ContentEntry>) -> Vec<(String, String)> {
    let mut modules: Vec<(String, String)> = entries
        .into_iter()
        .filter(|e| e.kind.is_empty() || e.kind == "file")
        .filter_map(|e| {
            let name = module_name_of(&e.name)?;
            match e.download_url {
                Some(url) => Some((name, url)),
                None => {
                    debug!(file = %e.name, "Skipping entry without download_url");
                    None
                }
            }
        })
        .collect();
    modules.sort();
    modules
}

pub(crate) async fn fetch(
    client: &Client,
    http: &HttpConfig,
    org: &str,
    repo: &str,
) -> Result<FetchedCollection, SourceError> {
    let api_url = format!(
        "{}/repos/{org}/{repo}/contents/plugins/modules",
        http.github_api.trim_end_matches('/')
    );
    info!(url = %api_url, "[FETCH] Listing GitHub modules");

    let response = send_with_retry(
        client,
        |c| authorised(c.get(&api_url), http),
        http.max_retries,
        "github listing",
    )
    .await
    .map_err(|failure| listing_error(&api_url, failure))?;

    let entries: Vec<ContentEntry> =
        response.json().await.map_err(|e| SourceError::Payload {
            service: SERVICE,
            url: api_url.clone(),
            message: e.to_string(),
        })?;
    let listed = module_entries(entries);
    info!(count = listed.len(), "[FETCH] Found GitHub module files");

    let mut modules = Vec::with_capacity(listed.len());
    for (name, url) in listed {
        let content = download(client, http, &url).await;
        match &content {
            Ok(text) => debug!(module = %name, bytes = text.len(), "Downloaded module"),
            Err(e) => warn!(module = %name, error = %e, "[FETCH] Module download failed"),
        }
        modules.push(FetchedModule { name, content });
    }

    sort_and_check(
        FetchedCollection {
            collection_name: default_collection_name(org, repo),
            source: SourceKind::Github,
            modules,
        },
        &format!("github.com/{org}/{repo}"),
    )
}

async fn download(client: &Client, http: &HttpConfig, url: &str) -> Result<String, FetchError> {
    let response = send_with_retry(
        client,
        |c| authorised(c.get(url), http),
        http.max_retries,
        "github download",
    )
    .await
    .map_err(|failure| match failure {
        RetryFailure::Status { status, .. } => FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        },
        other => FetchError::Transport {
            url: url.to_string(),
            message: other.to_string(),
        },
    })?;
    response.text().await.map_err(|e| FetchError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn authorised(request: reqwest::RequestBuilder, http: &HttpConfig) -> reqwest::RequestBuilder {
    let request = request
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "query-gen");
    match &http.github_token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

pub(crate) fn listing_error(url: &str, failure: RetryFailure) -> SourceError {
    listing_error_for(SERVICE, url, failure)
}

pub(crate) fn listing_error_for(
    service: &'static str,
    url: &str,
    failure: RetryFailure,
) -> SourceError {
    match failure {
        RetryFailure::Status { status, .. } => SourceError::Status {
            service,
            status: status.as_u16(),
            url: url.to_string(),
        },
        other => SourceError::Transport {
            service,
            url: url.to_string(),
            message: other.to_string(),
        },
    }
}

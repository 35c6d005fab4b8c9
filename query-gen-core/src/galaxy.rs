//! Galaxy v3 API fetcher. Module docs come from the collection's docs-blob.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::contract::{FetchedCollection, FetchedModule, SourceKind};
use crate::error::SourceError;
use crate::fetch::sort_and_check;
use crate::github::listing_error_for;
use crate::http_retry::send_with_retry;

const SERVICE: &str = "Galaxy";

#[derive(Debug, Deserialize)]
struct CollectionIndex {
    highest_version: Option<VersionRef>,
}

#[derive(Debug, Deserialize)]
struct VersionRef {
    version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocsBlobResponse {
    docs_blob: DocsBlob,
}

#[derive(Debug, Deserialize)]
struct DocsBlob {
    #[serde(default)]
    contents: Vec<ContentDoc>,
}

#[derive(Debug, Deserialize)]
struct ContentDoc {
    content_name: String,
    content_type: String,
    #[serde(default)]
    doc_strings: Option<DocStrings>,
}

#[derive(Debug, Deserialize)]
struct DocStrings {
    #[serde(rename = "return", default)]
    return_doc: Option<serde_yaml::Value>,
}

fn collection_url(http: &HttpConfig, namespace: &str, name: &str) -> String {
    format!(
        "{}/api/v3/plugin/ansible/content/published/collections/index/{namespace}/{name}/",
        http.galaxy_api.trim_end_matches('/')
    )
}

/// Renders docs-blob module entries as module source with a synthetic RETURN block.
pub(crate) fn modules_from_blob(blob: DocsBlobResponse) -> Vec<FetchedModule> {
    blob.docs_blob
        .contents
        .into_iter()
        .filter(|c| c.content_type == "module")
        .map(|c| {
            let return_doc = c
                .doc_strings
                .and_then(|d| d.return_doc)
                .filter(|v| !v.is_null());
            let content = match return_doc {
                Some(doc) => match serde_yaml::to_string(&doc) {
                    Ok(yaml) => format!("RETURN = r'''\n{yaml}'''\n"),
                    Err(e) => {
                        debug!(module = %c.content_name, error = %e, "Could not render RETURN");
                        String::new()
                    }
                },
                None => String::new(),
            };
            FetchedModule {
                name: c.content_name,
                content: Ok(content),
            }
        })
        .collect()
}

/// Galaxy payloads are JSON; parsing them as YAML keeps field declaration order.
async fn get_yaml<T: serde::de::DeserializeOwned>(
    client: &Client,
    http: &HttpConfig,
    url: &str,
) -> Result<T, SourceError> {
    let response = send_with_retry(client, |c| c.get(url), http.max_retries, "galaxy")
        .await
        .map_err(|failure| listing_error_for(SERVICE, url, failure))?;
    let body = response.text().await.map_err(|e| SourceError::Transport {
        service: SERVICE,
        url: url.to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&body).map_err(|e| SourceError::Payload {
        service: SERVICE,
        url: url.to_string(),
        message: e.to_string(),
    })
}

pub(crate) async fn fetch(
    client: &Client,
    http: &HttpConfig,
    namespace: &str,
    name: &str,
    version: Option<&str>,
) -> Result<FetchedCollection, SourceError> {
    let base = collection_url(http, namespace, name);
    let version = match version {
        Some(v) => v.to_string(),
        None => {
            info!(url = %base, "[FETCH] Resolving latest Galaxy version");
            let index: CollectionIndex = get_yaml(client, http, &base).await?;
            index
                .highest_version
                .map(|v| v.version)
                .ok_or_else(|| SourceError::Payload {
                    service: SERVICE,
                    url: base.clone(),
                    message: "collection has no published version".to_string(),
                })?
        }
    };

    let blob_url = format!("{base}versions/{version}/docs-blob/");
    info!(url = %blob_url, %version, "[FETCH] Downloading Galaxy docs-blob");
    let blob: DocsBlobResponse = get_yaml(client, http, &blob_url).await?;
    let modules = modules_from_blob(blob);
    info!(count = modules.len(), "[FETCH] Found Galaxy modules");

    sort_and_check(
        FetchedCollection {
            collection_name: format!("{namespace}.{name}"),
            source: SourceKind::Galaxy,
            modules,
        },
        &format!("galaxy {namespace}.{name}:{version}"),
    )
}

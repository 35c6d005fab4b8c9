//! Error types for every stage of a generation run.
//!
//! Only [`SourceError`] and [`OutputError`] abort a run. Everything else is
//! absorbed per module or per batch and surfaces as a lower confidence tag in
//! the review report.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to resolve or list a collection source. Fatal for the run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid collection source '{0}': expected a GitHub URL, a Galaxy name or a local directory")]
    InvalidReference(String),

    #[error("no plugins/modules directory in {}", .0.display())]
    MissingModulesDir(PathBuf),

    #[error("{service} returned {status} for {url}")]
    Status {
        service: &'static str,
        status: u16,
        url: String,
    },

    #[error("{service} request to {url} failed: {message}")]
    Transport {
        service: &'static str,
        url: String,
        message: String,
    },

    #[error("unexpected {service} payload from {url}: {message}")]
    Payload {
        service: &'static str,
        url: String,
        message: String,
    },

    #[error("no modules found in {0}")]
    NoModules(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to fetch a single module's source. Never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("could not read {path}: {message}")]
    Read { path: String, message: String },
}

/// Failure to turn module documentation into a typed RETURN schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocParseError {
    #[error("no RETURN documentation block")]
    MissingReturn,

    #[error("RETURN documentation is empty")]
    EmptyReturn,

    #[error("RETURN documentation is not a mapping of field definitions")]
    NotAMapping,

    #[error("RETURN documentation is not valid YAML: {0}")]
    Yaml(String),
}

/// Failure of the external model for a batch of modules. Never fatal.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no model credential configured")]
    MissingCredential,

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("model API rate limited the request")]
    RateLimited,

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model request failed: {0}")]
    Transport(String),

    #[error("could not parse model reply: {0}")]
    Reply(String),
}

/// A jq expression that does not parse under the supported grammar.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid jq at offset {offset}: {message}")]
pub struct JqError {
    pub offset: usize,
    pub message: String,
}

/// Failure to render or persist an output artifact. Fatal for the run.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("could not render {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors of a generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Why a module has no usable RETURN schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocProblem {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] DocParseError),
}

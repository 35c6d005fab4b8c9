#![doc = "query-gen-core: core logic for generating Ansible event query files."]

//! Fetches a collection's module documentation, infers where each module's
//! resources live and which field identifies them, and renders the result as
//! an `event_query.yml` with a companion review report.
//!
//! Entry point: [`generate::generate`]. The CLI crate adds argument parsing,
//! config files and logging setup.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod contract;
pub mod docs;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod galaxy;
pub mod generate;
pub mod github;
pub mod http_retry;
pub mod inference;
pub mod jq;
pub mod llm;
pub mod source;

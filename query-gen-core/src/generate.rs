//! Top-level pipeline: resolve → fetch → parse → analyze → render → write.
//!
//! Only source resolution and output writing can fail a run. Every module
//! the fetcher lists (after the optional name filter) ends up in the query
//! file, at worst as a fallback entry.
//!
//! # Callable From
//! - the CLI crate, with a [`DefaultFetcher`](crate::fetch::DefaultFetcher) and the
//!   analyzer from [`select_analyzer`](crate::analyzer::select_analyzer)
//! - integration tests, with `mockall` mocks for either seam

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::GeneratorConfig;
use crate::contract::{Analyzer, Confidence, Fetcher, SourceKind};
use crate::docs::ModuleDoc;
use crate::emit::{write_all_atomic, QueryFile, ReviewReport};
use crate::error::GenerateError;
use crate::source::CollectionSource;

/// Summary of one run, printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// False in check mode or when the query file already had this content.
    pub changed: bool,
    pub query_file_path: PathBuf,
    pub report_path: PathBuf,
    pub modules_analyzed: usize,
    pub queries_generated: usize,
    /// Modules analysed without falling back to the naming convention.
    pub successful_parses: usize,
    pub review_items: usize,
    pub analyzer: String,
    pub collection_info: CollectionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub source: SourceKind,
}

pub async fn generate<F, A>(
    config: &GeneratorConfig,
    fetcher: &F,
    analyzer: &A,
) -> Result<GenerationReport, GenerateError>
where
    F: Fetcher + ?Sized,
    A: Analyzer + ?Sized,
{
    info!(source = %config.collection_source, "[GENERATE] Starting generation run");

    let source = CollectionSource::parse(&config.collection_source).map_err(|e| {
        error!(error = %e, "[GENERATE][ERROR] Invalid collection source");
        e
    })?;
    info!(kind = %source.kind(), source = %source.describe(), "[GENERATE] Resolved collection source");
    let fetched = fetcher.fetch_collection(&source).await.map_err(|e| {
        error!(source = %source.describe(), error = %e, "[GENERATE][ERROR] Fetch failed");
        e
    })?;
    let collection_name = config
        .collection_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| fetched.collection_name.clone());
    info!(
        collection = %collection_name,
        source = %fetched.source,
        modules = fetched.modules.len(),
        "[GENERATE] Fetched collection"
    );

    let mut modules = fetched.modules;
    if let Some(wanted) = config.modules_to_analyze.as_ref().filter(|w| !w.is_empty()) {
        for name in wanted {
            if !modules.iter().any(|m| &m.name == name) {
                warn!(module = %name, "[GENERATE] Requested module not found in collection");
            }
        }
        modules.retain(|m| wanted.contains(&m.name));
        info!(modules = modules.len(), "[GENERATE] Applied module filter");
    }

    let docs: Vec<ModuleDoc> = modules
        .iter()
        .map(|m| ModuleDoc::from_fetched(&collection_name, m))
        .collect();
    for doc in &docs {
        if let Err(problem) = &doc.schema {
            warn!(module = %doc.fqcn, %problem, "[GENERATE] No usable RETURN documentation");
        }
    }

    info!(analyzer = analyzer.name(), modules = docs.len(), "[GENERATE] Analyzing modules");
    let entries = analyzer.analyze(&docs).await;

    let query_file = QueryFile::from_entries(&collection_name, &config.extension_version, &entries);
    let rendered = query_file.render(&config.output_path)?;
    let review = ReviewReport::from_entries(&entries);
    let report_path = config.resolved_report_path();

    let changed = if config.check_mode {
        info!("[GENERATE] Check mode: nothing written");
        false
    } else {
        let unchanged = std::fs::read_to_string(&config.output_path)
            .map(|existing| existing == rendered)
            .unwrap_or(false);
        let review_text = review.render();
        write_all_atomic(&[
            (config.output_path.as_path(), rendered.as_str()),
            (report_path.as_path(), review_text.as_str()),
        ])?;
        info!(
            path = %config.output_path.display(),
            report = %report_path.display(),
            "[GENERATE] Wrote query file and review report"
        );
        !unchanged
    };

    let successful_parses = entries
        .iter()
        .filter(|e| e.confidence != Confidence::Fallback)
        .count();

    Ok(GenerationReport {
        changed,
        query_file_path: config.output_path.clone(),
        report_path,
        modules_analyzed: docs.len(),
        queries_generated: query_file.queries.len(),
        successful_parses,
        review_items: review.len(),
        analyzer: analyzer.name().to_string(),
        collection_info: CollectionInfo {
            name: collection_name,
            source: fetched.source,
        },
    })
}

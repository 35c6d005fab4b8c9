//! CLI glue for query-gen: argument parsing, config resolution and the JSON
//! run summary. All generation logic lives in `query-gen-core`.
//!
//! Precedence for every setting: command-line flag, then config file, then
//! the built-in default.

use crate::load_config::{apply_env_secrets, load_config};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use query_gen_core::analyzer::select_analyzer;
use query_gen_core::config::GeneratorConfig;
use query_gen_core::fetch::DefaultFetcher;
use query_gen_core::generate::generate;
use std::path::PathBuf;

/// CLI for query-gen: build event query files from Ansible collection docs.
#[derive(Parser, Debug)]
#[clap(
    name = "query-gen",
    version,
    about = "Generate event_query.yml for indirect node counting from Ansible collection documentation"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse a collection and write the query file plus a review report
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct GenerateArgs {
    /// Path to a YAML config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// GitHub URL, `galaxy:ns.name[:version]`, `ns.name` or a local collection directory
    #[clap(long)]
    pub source: Option<String>,

    /// Collection name (`namespace.collection`); derived from the source when omitted
    #[clap(long)]
    pub collection_name: Option<String>,

    /// Where to write event_query.yml
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Where to write the review report
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Only analyse this module (repeatable)
    #[clap(long = "module")]
    pub modules: Vec<String>,

    #[clap(long)]
    pub extension_version: Option<String>,

    /// Model API key; without one the rule-based analyzer is used
    #[clap(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Cache model replies in this directory
    #[clap(long)]
    pub cache_dir: Option<PathBuf>,

    /// Analyse and report without writing files
    #[clap(long)]
    pub check: bool,
}

/// Merges the config file (if any) with flag overrides.
pub fn resolve_config(args: &GenerateArgs) -> Result<GeneratorConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = GeneratorConfig::default();
            apply_env_secrets(&mut config);
            config
        }
    };

    if let Some(source) = &args.source {
        config.collection_source = source.clone();
    }
    if let Some(name) = &args.collection_name {
        config.collection_name = Some(name.clone());
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(report) = &args.report {
        config.report_path = Some(report.clone());
    }
    if !args.modules.is_empty() {
        config.modules_to_analyze = Some(args.modules.clone());
    }
    if let Some(version) = &args.extension_version {
        config.extension_version = version.clone();
    }
    if let Some(key) = args.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        config.model.api_key = Some(key.clone());
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if args.check {
        config.check_mode = true;
    }

    if config.collection_source.trim().is_empty() {
        anyhow::bail!("No collection source: pass --source or set collection_source in the config file");
    }
    Ok(config)
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Generate(args) => {
            let config = resolve_config(&args)?;
            config.trace_loaded();
            tracing::info!(command = "generate", "Starting generation");

            let fetcher =
                DefaultFetcher::new(config.http.clone()).context("Failed to set up fetcher")?;
            let analyzer = select_analyzer(&config);

            match generate(&config, &fetcher, analyzer.as_ref()).await {
                Ok(report) => {
                    tracing::info!(command = "generate", ?report, "Generation complete");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "generate", error = %e, "Generation failed");
                    Err(anyhow::Error::new(e).context(format!(
                        "Generation failed for {}",
                        config.collection_source
                    )))
                }
            }
        }
    }
}

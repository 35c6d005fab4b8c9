//! The two [`Analyzer`] strategies and the start-up choice between them.
//!
//! [`RuleBasedAnalyzer`] applies [`crate::inference`] directly and is always
//! available. [`ModelAnalyzer`] asks an external model per batch and falls
//! back to the rules for every module whose reply is missing or invalid.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::ReplyCache;
use crate::config::GeneratorConfig;
use crate::contract::{
    Analyzer, Confidence, ContainerKind, IdentifierQuery, InferenceSignal, ModelClient, QueryEntry,
    ResourceType,
};
use crate::docs::ModuleDoc;
use crate::inference::{
    build_entry, infer_entry, select_container, select_identifier, visible_fields,
};
use crate::jq;
use crate::llm::{build_prompt, parse_reply, AnthropicClient, ModelModuleReply};

/// Deterministic analysis with no external calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedAnalyzer;

#[async_trait]
impl Analyzer for RuleBasedAnalyzer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn analyze(&self, docs: &[ModuleDoc]) -> Vec<QueryEntry> {
        docs.iter().map(infer_entry).collect()
    }
}

/// Model-assisted analysis with per-module fallback to the rules.
pub struct ModelAnalyzer<C: ModelClient> {
    client: C,
    batch_size: usize,
    cache: Option<ReplyCache>,
}

impl<C: ModelClient> ModelAnalyzer<C> {
    pub fn new(client: C, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ReplyCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sends one batch and returns validated entries keyed by position in `docs`.
    async fn analyze_batch(
        &self,
        docs: &[ModuleDoc],
        batch: &[usize],
    ) -> HashMap<usize, QueryEntry> {
        let mut accepted = HashMap::new();
        let batch_docs: Vec<&ModuleDoc> = batch.iter().map(|&i| &docs[i]).collect();
        let prompt = build_prompt(&batch_docs);

        let reply = match self.client.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, modules = batch.len(), "[ANALYZE] Model unavailable for batch; using rules");
                return accepted;
            }
        };
        let items = match parse_reply(&reply) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, modules = batch.len(), "[ANALYZE] Model reply unusable; using rules");
                return accepted;
            }
        };

        for item in items {
            let reply = match item {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error = %e, "[ANALYZE] Skipping malformed reply item");
                    continue;
                }
            };
            let Some(&index) = batch.iter().find(|&&i| docs[i].fqcn == reply.module) else {
                warn!(module = %reply.module, "[ANALYZE] Reply names a module outside the batch");
                continue;
            };
            if accepted.contains_key(&index) {
                debug!(module = %reply.module, "Ignoring duplicate reply item");
                continue;
            }
            match entry_from_reply(&reply, &docs[index]) {
                Ok(entry) => {
                    if let Some(cache) = &self.cache {
                        cache.put(&cache_key(&docs[index]), &reply);
                    }
                    accepted.insert(index, entry);
                }
                Err(reason) => {
                    warn!(module = %reply.module, %reason, "[ANALYZE] Rejected model reply item");
                }
            }
        }
        accepted
    }
}

fn cache_key(doc: &ModuleDoc) -> String {
    ReplyCache::key(&doc.fqcn, doc.return_text.as_deref())
}

#[async_trait]
impl<C: ModelClient> Analyzer for ModelAnalyzer<C> {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn analyze(&self, docs: &[ModuleDoc]) -> Vec<QueryEntry> {
        let mut entries: Vec<Option<QueryEntry>> = vec![None; docs.len()];

        let mut pending = Vec::new();
        for (i, doc) in docs.iter().enumerate() {
            let cached = self
                .cache
                .as_ref()
                .and_then(|cache| cache.get(&cache_key(doc)))
                .and_then(|reply| entry_from_reply(&reply, doc).ok());
            match cached {
                Some(entry) => entries[i] = Some(entry),
                None => pending.push(i),
            }
        }
        if docs.len() > pending.len() {
            info!(cached = docs.len() - pending.len(), "[ANALYZE] Reused cached model replies");
        }

        for batch in pending.chunks(self.batch_size) {
            info!(modules = batch.len(), "[ANALYZE] Requesting model analysis");
            for (index, entry) in self.analyze_batch(docs, batch).await {
                entries[index] = Some(entry);
            }
        }

        let mut fallbacks = 0usize;
        let result: Vec<QueryEntry> = entries
            .into_iter()
            .zip(docs)
            .map(|(entry, doc)| {
                entry.unwrap_or_else(|| {
                    fallbacks += 1;
                    infer_entry(doc)
                })
            })
            .collect();
        if fallbacks > 0 {
            info!(fallbacks, "[ANALYZE] Modules analysed by rules after model fallback");
        }
        result
    }
}

/// Validates one model reply item against the module it describes.
pub fn entry_from_reply(reply: &ModelModuleReply, doc: &ModuleDoc) -> Result<QueryEntry, String> {
    if reply.module != doc.fqcn {
        return Err(format!("reply is for '{}', expected '{}'", reply.module, doc.fqcn));
    }
    let resource_type = ResourceType::from_str(&reply.resource_type)?;
    let container_kind = match reply.container_type.trim().to_ascii_lowercase().as_str() {
        "list" => ContainerKind::List,
        "dict" => ContainerKind::Dict,
        other => return Err(format!("container type '{other}' is neither list nor dict")),
    };
    let container = reply.container.trim();
    if container.is_empty() {
        return Err("empty container".to_string());
    }
    let identifier = reply.identifier.trim();
    if identifier.is_empty() {
        return Err("empty identifier".to_string());
    }
    let expr = jq::parse(&reply.jq_expression).map_err(|e| e.to_string())?;
    if !expr.ends_in_empty() {
        return Err("jq expression does not end in '// empty'".to_string());
    }
    let keys = expr.object_keys();
    if keys != [identifier] {
        return Err(format!("jq emits {keys:?}, identifier is '{identifier}'"));
    }

    if let Ok(schema) = &doc.schema {
        if let Some(field) = schema.field(container) {
            let choice = select_identifier(&visible_fields(field));
            if choice.matched() && choice.emitted_name != identifier {
                return Err(format!(
                    "identifier '{identifier}' skips higher-priority '{}'",
                    choice.emitted_name
                ));
            }
        }

        // A declared list/dict type is authoritative.
        if let Some(decision) = select_container(schema) {
            if decision.confidence == Confidence::High
                && decision.field == container
                && decision.kind != container_kind
            {
                return Err(format!(
                    "'{container}' is declared {}, model said {container_kind}",
                    decision.kind
                ));
            }
        }
    }

    let mut confidence = reply
        .confidence
        .as_deref()
        .and_then(|c| Confidence::from_str(c).ok())
        .unwrap_or(Confidence::Medium);
    let mut note = reply.note.clone().filter(|n| !n.trim().is_empty());
    if doc.schema.is_err() {
        confidence = confidence.max(Confidence::Low);
        note.get_or_insert_with(|| "model guess without RETURN documentation".to_string());
    }

    let description = reply
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Canonical {identifier} of each resource returned by {}", doc.fqcn));

    Ok(build_entry(
        doc,
        resource_type,
        container.to_string(),
        container_kind,
        IdentifierQuery {
            name: identifier.to_string(),
            description,
            jq_expression: reply.jq_expression.trim().to_string(),
        },
        confidence,
        InferenceSignal::Model,
        note,
    ))
}

/// Picks the analyzer once: model-assisted when a credential is configured.
pub fn select_analyzer(config: &GeneratorConfig) -> Box<dyn Analyzer> {
    match AnthropicClient::new(&config.model) {
        Ok(client) => {
            let mut analyzer = ModelAnalyzer::new(client, config.model.batch_size);
            if let Some(dir) = &config.cache_dir {
                analyzer = analyzer.with_cache(ReplyCache::new(dir));
            }
            info!(model = %config.model.model, "[ANALYZE] Using model-assisted analyzer");
            Box::new(analyzer)
        }
        Err(e) => {
            info!(reason = %e, "[ANALYZE] Using rule-based analyzer");
            Box::new(RuleBasedAnalyzer)
        }
    }
}

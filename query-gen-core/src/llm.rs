//! Anthropic messages API client plus the analysis prompt and reply format.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::contract::{ModelClient, ResourceType};
use crate::docs::ModuleDoc;
use crate::error::ModelError;
use crate::http_retry::{send_with_retry, RetryFailure};
use crate::inference::IDENTIFIER_PRIORITY;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
/// RETURN text beyond this many bytes is cut from the prompt.
const MAX_RETURN_BYTES: usize = 6000;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the Anthropic messages endpoint.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl AnthropicClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ModelError::MissingCredential)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(prompt_len = prompt.len(), model = %self.model, "Calling Anthropic API");
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = send_with_retry(
            &self.client,
            |c| {
                c.post(&self.endpoint)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .json(&body)
            },
            self.max_retries,
            "anthropic",
        )
        .await
        .map_err(|failure| match failure {
            RetryFailure::Timeout => ModelError::Timeout(self.timeout_secs),
            RetryFailure::Status { status, .. } if status.as_u16() == 429 => ModelError::RateLimited,
            RetryFailure::Status { status, body } => ModelError::Status {
                status: status.as_u16(),
                body,
            },
            RetryFailure::Transport(message) => ModelError::Transport(message),
        })?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Reply(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect();
        if text.trim().is_empty() {
            warn!("Anthropic reply contained no text");
            return Err(ModelError::Reply("reply contained no text".to_string()));
        }
        Ok(text)
    }
}

/// One module as described by the model, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelModuleReply {
    /// Fully-qualified module name.
    pub module: String,
    pub resource_type: String,
    pub container: String,
    pub container_type: String,
    /// Identifier name as emitted.
    pub identifier: String,
    pub jq_expression: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Builds the analysis request for one batch of modules.
pub fn build_prompt(docs: &[&ModuleDoc]) -> String {
    let vocabulary: Vec<&str> = ResourceType::ALL.iter().map(|t| t.as_str()).collect();
    let priority: Vec<String> = IDENTIFIER_PRIORITY
        .iter()
        .map(|(field, emitted)| {
            if field == emitted {
                field.to_string()
            } else {
                format!("{field} (emit as {emitted})")
            }
        })
        .collect();

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are analysing Ansible module RETURN documentation to build jq queries that \
         extract one canonical identifier per managed resource from the module's return value."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Rules:");
    let _ = writeln!(
        prompt,
        "- container: the top-level RETURN field holding the resources; container_type is \"list\" or \"dict\"."
    );
    let _ = writeln!(
        prompt,
        "- A declared `type: list` or an `elements:` attribute means list. A declared `type: dict` means dict."
    );
    let _ = writeln!(
        prompt,
        "- identifier: the first of these present on the resource: {}.",
        priority.join(", ")
    );
    let _ = writeln!(prompt, "- resource_type: one of {}.", vocabulary.join(", "));
    let _ = writeln!(
        prompt,
        "- jq_expression is rooted at the module's return value. For a list use \
         `.<container>[] | {{<identifier>: .<field>}} // empty`; for a dict use \
         `.<container> | select(. != null) | {{<identifier>: .<field>}} // empty`."
    );
    let _ = writeln!(
        prompt,
        "- confidence: high, medium or low. Add a short note when unsure."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Reply with a single JSON object and nothing else:\n\
         {{\"modules\": [{{\"module\": \"<fqcn>\", \"resource_type\": \"...\", \"container\": \"...\", \
         \"container_type\": \"list|dict\", \"identifier\": \"...\", \"jq_expression\": \"...\", \
         \"description\": \"...\", \"confidence\": \"high|medium|low\", \"note\": null}}]}}"
    );

    for doc in docs {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "### {}", doc.fqcn);
        match &doc.return_text {
            Some(text) => {
                let _ = writeln!(prompt, "RETURN:\n{}", truncate(text, MAX_RETURN_BYTES));
            }
            None => {
                let _ = writeln!(prompt, "RETURN: (not documented)");
            }
        }
    }
    prompt
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Finds the JSON object in a reply that may be wrapped in prose or code fences.
pub fn locate_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Splits a reply into its per-module items.
///
/// Fails only if no `{"modules": [...]}` object can be found. Individual items
/// that do not match [`ModelModuleReply`] are returned as errors so the caller
/// can fall back for just those modules.
pub fn parse_reply(reply: &str) -> Result<Vec<Result<ModelModuleReply, String>>, ModelError> {
    let json = locate_json(reply)
        .ok_or_else(|| ModelError::Reply("no JSON object in reply".to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ModelError::Reply(e.to_string()))?;
    let items = value
        .get("modules")
        .and_then(|m| m.as_array())
        .ok_or_else(|| ModelError::Reply("reply has no \"modules\" array".to_string()))?;
    Ok(items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).map_err(|e| e.to_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FetchedModule;

    #[test]
    fn locates_json_inside_code_fences() {
        let reply = "Here you go:\n```json\n{\"modules\": []}\n```\nDone.";
        assert_eq!(locate_json(reply), Some("{\"modules\": []}"));
        assert_eq!(locate_json("no json here"), None);
    }

    #[test]
    fn malformed_items_do_not_discard_the_rest() {
        let reply = r#"{"modules": [
            {"module": "a.b.vm", "resource_type": "virtual_machine", "container": "instance",
             "container_type": "dict", "identifier": "moid",
             "jq_expression": ".instance | select(. != null) | {moid: .moid} // empty"},
            {"module": "a.b.broken"}
        ]}"#;
        let items = parse_reply(reply).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().module, "a.b.vm");
        assert!(items[1].is_err());
    }

    #[test]
    fn reply_without_modules_array_is_an_error() {
        assert!(matches!(parse_reply("{\"x\": 1}"), Err(ModelError::Reply(_))));
        assert!(matches!(parse_reply("sorry"), Err(ModelError::Reply(_))));
    }

    #[test]
    fn prompt_lists_vocabulary_and_modules() {
        let doc = ModuleDoc::from_fetched(
            "vmware.vmware",
            &FetchedModule {
                name: "guest_info".into(),
                content: Ok("RETURN = r'''\nguests:\n  type: list\n'''".into()),
            },
        );
        let prompt = build_prompt(&[&doc]);
        assert!(prompt.contains("### vmware.vmware.guest_info"));
        assert!(prompt.contains("container_cluster"));
        assert!(prompt.contains("hw_product_uuid (emit as bios_uuid)"));
        assert!(prompt.contains("guests:\n  type: list"));
    }

    #[test]
    fn client_requires_a_credential() {
        let config = ModelConfig::default();
        assert!(matches!(
            AnthropicClient::new(&config),
            Err(ModelError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_model_error() {
        let config = ModelConfig {
            api_key: Some("test-key".into()),
            endpoint: "http://127.0.0.1:1/v1/messages".into(),
            max_retries: 1,
            ..Default::default()
        };
        let client = AnthropicClient::new(&config).unwrap();
        assert!(client.complete("hi").await.is_err());
    }
}

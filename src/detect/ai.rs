//! AI-assisted chapter detection.
//!
//! Sends a bounded prefix of the document to a chat-completions endpoint
//! and asks for a JSON list of structural divisions. The model estimates
//! offsets from a truncated view of the text, so they are never trusted:
//! every candidate is re-located by searching the real text, and candidates
//! that cannot be located are dropped. Any transport, parse, or schema
//! problem demotes the document to the rule-based scanner, with no retry of
//! the AI call for the same document.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use tracing::{debug, warn};

use super::rules::RuleBasedDetector;
use super::{dedup_and_sort, preview_at, ChapterDetector};
use crate::config::AiConfig;
use crate::models::{ChapterDivision, DivisionKind};

/// Characters of document text included in the prompt.
pub const PROMPT_PREFIX_CHARS: usize = 8000;

/// A title's first token must be longer than this to stand alone in a
/// relocation search; short tokens match spuriously.
const MIN_TOKEN_SEARCH_LEN: usize = 3;

const SYSTEM_INSTRUCTION: &str = "Você extrai a estrutura de documentos jurídicos e administrativos \
brasileiros. Responda com um único objeto JSON, sem qualquer texto adicional, no formato \
{\"chapters\":[{\"title\":string,\"kind\":\"CAPITULO\"|\"SECAO\"|\"SUBSECAO\"|\"ARTIGO\"|\"DISPOSITIVO\"|\"FUNDAMENTACAO\"|\"TITULO\"|\"DOCUMENTO\",\
\"level\":inteiro (1 = topo),\"start\":posição aproximada em caracteres,\"preview\":primeiras palavras da divisão}]}. \
Os títulos devem ser copiados literalmente do texto.";

pub struct AiDetector {
    config: AiConfig,
    client: reqwest::Client,
    fallback: RuleBasedDetector,
}

#[derive(Debug, Deserialize)]
struct ChapterPayload {
    chapters: Vec<CandidateDivision>,
}

/// One division as reported by the model. `start` is advisory only.
#[derive(Debug, Deserialize)]
struct CandidateDivision {
    title: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default = "default_level")]
    level: u32,
    #[serde(default)]
    #[allow(dead_code)]
    start: Option<i64>,
    #[serde(default)]
    preview: Option<String>,
}

fn default_level() -> u32 {
    1
}

impl AiDetector {
    pub fn new(config: AiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            fallback: RuleBasedDetector,
        })
    }

    async fn detect_ai(&self, text: &str) -> anyhow::Result<Vec<ChapterDivision>> {
        let api_key = std::env::var(&self.config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", self.config.api_key_env))?;

        let prefix: String = text.chars().take(PROMPT_PREFIX_CHARS).collect();
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTION },
                { "role": "user", "content": format!("Trecho inicial do documento:\n\n{}", prefix) }
            ],
            "temperature": 0,
        });

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            anyhow::bail!("completion API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("completion reply has no message content"))?;

        let payload = parse_payload(content)?;
        if payload.chapters.is_empty() {
            anyhow::bail!("model reported no chapters");
        }

        let located = locate_candidates(text, payload.chapters);
        if located.is_empty() {
            anyhow::bail!("no candidate division could be located in the text");
        }
        Ok(dedup_and_sort(located))
    }
}

#[async_trait]
impl ChapterDetector for AiDetector {
    async fn detect(&self, text: &str, label: &str) -> Vec<ChapterDivision> {
        match self.detect_ai(text).await {
            Ok(divisions) => {
                debug!(
                    document = label,
                    divisions = divisions.len(),
                    "AI structure detection"
                );
                divisions
            }
            Err(err) => {
                warn!(
                    document = label,
                    error = %err,
                    "AI chapter detection failed, falling back to rule-based scan"
                );
                self.fallback.scan(text)
            }
        }
    }
}

/// Parse the model reply, tolerating fenced or prose-wrapped JSON by
/// slicing the outermost object.
fn parse_payload(reply: &str) -> anyhow::Result<ChapterPayload> {
    let start = reply
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("reply contains no JSON object"))?;
    let end = reply
        .rfind('}')
        .ok_or_else(|| anyhow::anyhow!("reply contains no JSON object"))?;
    if end < start {
        anyhow::bail!("reply contains no JSON object");
    }
    Ok(serde_json::from_str(&reply[start..=end])?)
}

fn locate_candidates(text: &str, candidates: Vec<CandidateDivision>) -> Vec<ChapterDivision> {
    let haystack = text.to_lowercase();
    let chars: Vec<char> = text.chars().collect();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let offset = locate_title(&haystack, &candidate.title)?;
            let kind = candidate
                .kind
                .as_deref()
                .and_then(DivisionKind::from_tag)
                .unwrap_or(DivisionKind::Documento);
            Some(ChapterDivision {
                title: candidate.title.trim().to_string(),
                kind,
                level: candidate.level.max(1),
                start_offset: offset,
                preview: candidate
                    .preview
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|| preview_at(&chars, offset)),
            })
        })
        .collect()
}

/// Resolve a model-reported title to a real character offset: verbatim
/// search first, then whitespace-stripped, then punctuation-stripped, then
/// the first token when it is long enough.
fn locate_title(haystack: &str, title: &str) -> Option<usize> {
    let needle = title.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(pos) = haystack.find(&needle) {
        return Some(char_offset(haystack, pos));
    }

    let squeezed: String = needle.split_whitespace().collect();
    if squeezed != needle && !squeezed.is_empty() {
        if let Some(pos) = haystack.find(&squeezed) {
            return Some(char_offset(haystack, pos));
        }
    }

    let stripped: String = needle
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    let stripped = stripped.trim().to_string();
    if stripped != needle && !stripped.is_empty() {
        if let Some(pos) = haystack.find(&stripped) {
            return Some(char_offset(haystack, pos));
        }
    }

    let first = needle.split_whitespace().next()?;
    if first.chars().count() > MIN_TOKEN_SEARCH_LEN {
        if let Some(pos) = haystack.find(first) {
            return Some(char_offset(haystack, pos));
        }
    }

    None
}

fn char_offset(haystack: &str, byte_pos: usize) -> usize {
    haystack[..byte_pos].chars().count()
}

//! Language-Model Client
//!
//! Generation client for the locally-hosted Ollama backend. The enrichment
//! pipeline depends on the [`LlmClient`] trait; [`OllamaClient`] is the
//! production implementation.
//!
//! The section operations are infallible by contract: a transport failure,
//! a non-2xx status, a timeout, or an unusably short reply all resolve to
//! the section's canned fallback string. Only `health_check` surfaces
//! errors to the caller.
//!
//! The backend serves one generation request at a time; callers must not
//! issue concurrent section calls. The queue's single-lane drain plus the
//! orchestrator's inter-section delay enforce this.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::constants::llm as llm_constants;
use crate::types::{Result, Section, WallError};

/// Shared client handle for the orchestrator and composition root.
pub type SharedClient = Arc<dyn LlmClient>;

// =============================================================================
// Client Trait
// =============================================================================

/// Section-text generation for a word.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate one deep-enrichment section. Never fails: every failure
    /// path returns the section's canned fallback.
    async fn request_section(&self, word: &str, section: Section) -> String;

    /// Fast first-call path producing the basic-meaning section before the
    /// user sees anything. Same fallback discipline as `request_section`.
    async fn request_fast(&self, word: &str) -> String;

    /// Client name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the backend is reachable and the model is pulled
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// Reasoning-Markup Stripping
// =============================================================================

static THINK_BLOCK: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));
static THINK_OPEN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?is)<think>.*\z").expect("valid regex"));

/// Strip `<think>...</think>` reasoning blocks from a model reply, including
/// an unterminated opening tag through end-of-string, then trim whitespace.
pub fn strip_reasoning(raw: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(raw, "");
    let stripped = THINK_OPEN.replace_all(&stripped, "");
    stripped.trim().to_string()
}

// =============================================================================
// Ollama Client
// =============================================================================

/// Client for a locally-running Ollama backend.
pub struct OllamaClient {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_base = Self::validate_endpoint(&config.endpoint)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WallError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_base,
            model: config.model.clone(),
            client,
        })
    }

    /// Validate endpoint URL for security (SSRF prevention)
    ///
    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            WallError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(WallError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "::1")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        // Remove trailing slash for consistency
        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    /// Issue one non-streaming generation request and return the raw reply.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        let url = format!("{}/api/generate", self.api_base);

        debug!(model = %self.model, "Sending generation request to Ollama");

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    WallError::LlmApi(format!(
                        "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                        self.api_base
                    ))
                } else {
                    WallError::LlmApi(format!("Ollama request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WallError::LlmApi(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| WallError::LlmApi(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(body.response)
    }

    /// Resolve a raw backend reply to usable section text, substituting the
    /// canned fallback when the cleaned reply is below the content-quality
    /// threshold. This is a content guard, not an error.
    fn resolve(&self, word: &str, section: Section, outcome: Result<String>) -> String {
        match outcome {
            Ok(raw) => {
                let cleaned = strip_reasoning(&raw);
                if cleaned.chars().count() < llm_constants::MIN_RESPONSE_CHARS {
                    debug!(
                        word,
                        section = %section,
                        "Model reply too short ({} chars), using fallback",
                        cleaned.chars().count()
                    );
                    prompts::fallback(word, section)
                } else {
                    cleaned
                }
            }
            Err(e) => {
                warn!(word, section = %section, "Generation failed, using fallback: {}", e);
                prompts::fallback(word, section)
            }
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn request_section(&self, word: &str, section: Section) -> String {
        let prompt = prompts::section_prompt(word, section);
        let outcome = self.generate(&prompt).await;
        self.resolve(word, section, outcome)
    }

    async fn request_fast(&self, word: &str) -> String {
        let prompt = prompts::fast_prompt(word);
        let outcome = self.generate(&prompt).await;
        self.resolve(word, Section::BasicMeaning, outcome)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        let response = self.client.get(&url).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(tags) = resp.json::<TagsResponse>().await {
                    let model_available = tags.models.iter().any(|m| {
                        m.name == self.model
                            || m.name.starts_with(&self.model.replace(":latest", ""))
                    });

                    if model_available {
                        info!("Ollama is available with model: {}", self.model);
                        Ok(true)
                    } else {
                        warn!(
                            "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                            self.model, self.model
                        );
                        Ok(false)
                    }
                } else {
                    info!("Ollama is available");
                    Ok(true)
                }
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}. Start with: ollama serve", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_terminated_think_block() {
        let raw = "<think>internal musing\nmore musing</think>\n\n**含义：** 跑步";
        assert_eq!(strip_reasoning(raw), "**含义：** 跑步");
    }

    #[test]
    fn test_strip_unterminated_think_block() {
        let raw = "**含义：** 跑步\n<think>trailing reasoning that never closes";
        assert_eq!(strip_reasoning(raw), "**含义：** 跑步");
    }

    #[test]
    fn test_strip_multiple_blocks() {
        let raw = "<think>a</think>first<THINK>b</THINK>second";
        assert_eq!(strip_reasoning(raw), "firstsecond");
    }

    #[test]
    fn test_strip_plain_text_untouched() {
        assert_eq!(strip_reasoning("  plain reply  "), "plain reply");
    }

    #[test]
    fn test_resolve_short_reply_falls_back() {
        let client = OllamaClient::new(&LlmConfig::default()).expect("client");
        let text = client.resolve("run", Section::Synonyms, Ok("ok".to_string()));
        assert_eq!(text, prompts::fallback("run", Section::Synonyms));
    }

    #[test]
    fn test_resolve_error_falls_back() {
        let client = OllamaClient::new(&LlmConfig::default()).expect("client");
        let text = client.resolve(
            "run",
            Section::Collocations,
            Err(WallError::LlmApi("boom".to_string())),
        );
        assert_eq!(text, prompts::fallback("run", Section::Collocations));
    }

    #[test]
    fn test_resolve_reply_that_is_only_reasoning_falls_back() {
        let client = OllamaClient::new(&LlmConfig::default()).expect("client");
        let text = client.resolve(
            "run",
            Section::DetailedMeaning,
            Ok("<think>all reasoning, no answer</think>".to_string()),
        );
        assert_eq!(text, prompts::fallback("run", Section::DetailedMeaning));
    }

    #[test]
    fn test_validate_endpoint_rejects_bad_scheme() {
        assert!(OllamaClient::validate_endpoint("ftp://localhost:11434").is_err());
        assert!(OllamaClient::validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_validate_endpoint_strips_trailing_slash() {
        let base = OllamaClient::validate_endpoint("http://localhost:11434/").expect("valid");
        assert_eq!(base, "http://localhost:11434");
    }
}

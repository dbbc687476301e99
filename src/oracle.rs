//! Oracle classifier: the multimodal model boundary.
//!
//! Defines the [`Oracle`] trait and the production [`GeminiOracle`]
//! implementation over the `generateContent` REST endpoint. The oracle maps
//! free text (and images) to structured best-guess selections; its replies
//! are raw text that the resolution stage decodes with strict-first parsing
//! and heuristic fallbacks — nothing here is trusted as ground truth.
//!
//! # Configuration
//!
//! The API key comes from the `SCOUT_ORACLE_KEY` environment variable only.
//! A missing key is an explicit unconfigured error at construction time.
//!
//! # Retry Strategy
//!
//! Transient failures use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (exponent capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::time::Duration;
use tracing::debug;

use crate::config::OracleConfig;

/// Environment variable holding the classifier API key.
pub const KEY_ENV: &str = "SCOUT_ORACLE_KEY";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// The external classifier used by every resolution stage.
///
/// All four calls may fail (timeout, malformed reply, quota); callers treat
/// any failure as "no usable guess" and run the stage's deterministic
/// fallback instead. Classification replies are returned as raw text so the
/// resolution stage owns parsing end to end.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Guess which course a query refers to.
    async fn classify_course(&self, query: &str, course_names: &[String]) -> Result<String>;

    /// Guess which modules (up to 3) are relevant to a query.
    async fn classify_modules(&self, query: &str, module_names: &[String]) -> Result<String>;

    /// Guess which items (up to 5, by index) best answer a query.
    async fn classify_resources(
        &self,
        query: &str,
        titles: &[String],
        course_name: &str,
        module_name: &str,
    ) -> Result<String>;

    /// Describe the learning concept shown in an image.
    async fn describe_image(&self, image: &[u8], mime_type: &str) -> Result<String>;
}

/// Production classifier over the Gemini `generateContent` API.
pub struct GeminiOracle {
    api_key: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiOracle {
    /// Create a classifier client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `SCOUT_ORACLE_KEY` is not set (unconfigured) or
    /// the HTTP client cannot be built.
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(KEY_ENV).map_err(|_| {
            anyhow::anyhow!(
                "{} environment variable not set — oracle client is unconfigured",
                KEY_ENV
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
            client,
        })
    }

    /// Call `generateContent` with retry/backoff and return the reply text.
    async fn generate(&self, parts: Vec<serde_json::Value>) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [{ "parts": parts }],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&url).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return extract_reply_text(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("oracle API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("oracle API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("oracle call failed after retries")))
    }
}

/// Pull the first candidate's reply text out of a `generateContent` response.
fn extract_reply_text(json: &serde_json::Value) -> Result<String> {
    json.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.pointer("/content/parts/0/text"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow::anyhow!("malformed oracle response: missing reply text"))
}

fn bulleted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("- {}", n))
        .collect::<Vec<_>>()
        .join("\n")
}

fn course_prompt(query: &str, course_names: &[String]) -> String {
    format!(
        "You are an assistant for educational content. A student has the following question:\n\n\
         \"{query}\"\n\n\
         Which of the following courses is the student most likely referring to? Match \
         subject-matter keywords from the question to the course titles; do not default to the \
         first course unless nothing else fits, and if there is no clear match pick the most \
         general course that might cover the topic.\n\n\
         Answer with a single JSON object with the fields:\n\
         - course_name: the most relevant course (must exactly match one of the names below)\n\
         - confidence: a score from 0 to 1\n\
         - reasoning: a brief explanation of the choice\n\n\
         Available courses:\n{courses}",
        query = query,
        courses = bulleted(course_names),
    )
}

fn module_prompt(query: &str, module_names: &[String]) -> String {
    format!(
        "You are an assistant for educational content. A student has the following question:\n\n\
         \"{query}\"\n\n\
         Which of the following modules in the course are most likely to contain resources that \
         answer it?\n\n\
         Answer with a single JSON object with the fields:\n\
         - module_names: an array with the names of the most relevant modules (maximum 3, each \
         exactly matching one of the names below)\n\
         - relevance_explanations: a brief explanation for each selected module\n\n\
         Available modules:\n{modules}",
        query = query,
        modules = bulleted(module_names),
    )
}

fn resource_prompt(query: &str, titles: &[String], course_name: &str, module_name: &str) -> String {
    format!(
        "You are an assistant for educational content. A student has the following question:\n\n\
         \"{query}\"\n\n\
         The question relates to the course \"{course}\", module \"{module}\". Which of the \
         following resources would help the student most?\n\n\
         Answer with a single JSON object with the fields:\n\
         - resource_indices: an array of 0-based indices of the most relevant resources \
         (maximum 5)\n\
         - relevance_scores: an array of scores from 0 to 1, one per selected resource\n\
         - reasoning: a brief explanation of why these resources are relevant\n\n\
         Available resources:\n{resources}",
        query = query,
        course = course_name,
        module = module_name,
        resources = bulleted(titles),
    )
}

const IMAGE_PROMPT: &str = "This is an educational image. Identify the main learning concept or \
    topic it illustrates, the subject area it belongs to, and any key terminology visible. \
    Respond with a detailed query that could be used to find learning resources about this topic.";

#[async_trait]
impl Oracle for GeminiOracle {
    async fn classify_course(&self, query: &str, course_names: &[String]) -> Result<String> {
        debug!(candidates = course_names.len(), "classifying course");
        let prompt = course_prompt(query, course_names);
        self.generate(vec![serde_json::json!({ "text": prompt })])
            .await
    }

    async fn classify_modules(&self, query: &str, module_names: &[String]) -> Result<String> {
        debug!(candidates = module_names.len(), "classifying modules");
        let prompt = module_prompt(query, module_names);
        self.generate(vec![serde_json::json!({ "text": prompt })])
            .await
    }

    async fn classify_resources(
        &self,
        query: &str,
        titles: &[String],
        course_name: &str,
        module_name: &str,
    ) -> Result<String> {
        debug!(candidates = titles.len(), module = module_name, "classifying resources");
        let prompt = resource_prompt(query, titles, course_name, module_name);
        self.generate(vec![serde_json::json!({ "text": prompt })])
            .await
    }

    async fn describe_image(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let parts = vec![
            serde_json::json!({ "text": IMAGE_PROMPT }),
            serde_json::json!({
                "inline_data": {
                    "mime_type": mime_type,
                    "data": BASE64.encode(image),
                }
            }),
        ];
        self.generate(parts).await
    }
}

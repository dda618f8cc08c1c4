use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::course::Course;

// ── Wire types ────────────────────────────────────────────────────────────────

/// The generator's response envelope. `content` is either the rejection
/// sentinel or a JSON course document embedded as a string — it must be
/// parsed a second time.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: String,
}

/// Reserved sentinel the generator returns instead of course JSON when it
/// rejects the prompt as invalid.
pub const INVALID_CONTENT: &str = "Not Valid Content";

// ── Client ────────────────────────────────────────────────────────────────────

pub struct GenerateClient {
    http: reqwest::Client,
    pub endpoint: String,
    api_key: Option<String>,
}

impl GenerateClient {
    /// Build a client with a whole-request timeout. The timeout is the only
    /// retry/latency policy there is — each generation is a single attempt.
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, endpoint, api_key: None })
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    /// Generate a course for a free-text prompt. One POST, one attempt.
    /// Transport errors, non-2xx statuses, the rejection sentinel, and
    /// malformed course JSON all surface as plain errors — callers only
    /// care about success vs failure and the message.
    pub async fn generate(&self, prompt: &str) -> Result<Course> {
        let url = format!("{}/generate-course", self.endpoint.trim_end_matches('/'));

        let mut req = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "text": prompt }));

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status, text));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .context("Malformed response from the generator")?;

        parse_course(&body.content)
    }
}

// ── Payload parsing ───────────────────────────────────────────────────────────

/// Parse the embedded course document out of the response `content` string.
pub fn parse_course(raw: &str) -> Result<Course> {
    if raw.trim() == INVALID_CONTENT {
        return Err(anyhow!(INVALID_CONTENT));
    }
    serde_json::from_str(raw).context("Generator returned unparseable course JSON")
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_models::{Focus, SearchResult};

/// Results embedded in the prompt.
pub const MAX_PROMPT_RESULTS: usize = 8;

/// Sent as a header so the key never appears in URLs or error messages.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

const PLACEHOLDER_MARKERS: &[&str] = &["your_", "your-", "_here", "changeme", "placeholder"];

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer not configured: {0}")]
    Configuration(String),
    #[error("summarizer request failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        query: &str,
        results: &[SearchResult],
        focus: Focus,
    ) -> Result<String, SummarizeError>;
}

pub fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    key.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| key.contains(m))
}

fn focus_instructions(focus: Focus) -> &'static str {
    match focus {
        Focus::General => {
            "Write in a clear, accessible tone for a general audience. Lead with the direct answer, then supporting detail."
        }
        Focus::Academic => {
            "Use a formal, scholarly tone. Reference methodology and evidence where available and cite every claim."
        }
        Focus::News => {
            "Emphasize the most recent developments. Mention dates and timelines explicitly and distinguish confirmed facts from reports."
        }
        Focus::Technical => {
            "Go into technical depth. Include code snippets, commands or configuration where they help, and note versions or caveats."
        }
    }
}

pub fn build_prompt(query: &str, results: &[SearchResult], focus: Focus) -> String {
    let sources = results
        .iter()
        .take(MAX_PROMPT_RESULTS)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {}\nURL: {}\nSnippet: {}",
                i + 1,
                r.title,
                r.url,
                r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a research assistant answering a user's question from web search results.\n\n\
         Question: \"{query}\"\n\
         Focus mode: {focus}\n\n\
         Search results:\n{sources}\n\n\
         Instructions:\n\
         - Give a comprehensive answer to the question using the search results above.\n\
         - Cite sources inline using their bracketed numbers, e.g. [1].\n\
         - {}\n\
         - If the results do not contain enough information, say so.\n\
         - Keep the answer under 1000 words and format it in Markdown.",
        focus_instructions(focus)
    )
}

// =============================================================================
// Gemini-compatible generateContent
// =============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct GeminiSummarizer {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiSummarizer {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    fn api_key(&self) -> Result<&str, SummarizeError> {
        match self.api_key.as_deref() {
            None => Err(SummarizeError::Configuration(
                "GEMINI_API_KEY is not set".to_string(),
            )),
            Some(key) if is_placeholder_key(key) => Err(SummarizeError::Configuration(
                "GEMINI_API_KEY is a placeholder value".to_string(),
            )),
            Some(key) => Ok(key),
        }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        query: &str,
        results: &[SearchResult],
        focus: Focus,
    ) -> Result<String, SummarizeError> {
        let key = self.api_key()?;
        let prompt = build_prompt(query, results, focus);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let req = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
        };

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, key)
            .json(&req)
            .send()
            .await
            .map_err(|e| SummarizeError::Upstream(e.without_url().to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Upstream(format!(
                "generateContent returned {status}: {body}"
            )));
        }

        let body: GenerateResponse = resp.json().await.map_err(|e| {
            SummarizeError::Upstream(format!("unexpected response body: {}", e.without_url()))
        })?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                SummarizeError::Upstream("response has no candidate text".to_string())
            })
    }
}

//! Instant-answer web search client.
//!
//! Provider failures are never propagated: a transport error, a bad status,
//! an undecodable body, or a poor-quality answer all fall through to
//! [`fallback_links::generate`].

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::data_models::{Focus, ResultType, SearchResult};
use crate::fallback_links;

pub const SNIPPET_MAX_CHARS: usize = 450;
const TITLE_MAX_CHARS: usize = 100;
const MAX_RELATED_TOPICS: usize = 3;
const MAX_WEB_RESULTS: usize = 5;

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Never fails; callers must tolerate an empty list.
    async fn search(&self, query: &str, focus: Focus) -> Vec<SearchResult>;
}

#[derive(Debug, Error)]
pub enum WebSearchError {
    #[error("search provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search provider returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Good,
    Poor,
}

/// More than one result, or a single result that is not the synthetic fallback.
pub fn assess_quality(results: &[SearchResult]) -> Quality {
    match results {
        [] => Quality::Poor,
        [only] if only.kind == ResultType::Fallback => Quality::Poor,
        _ => Quality::Good,
    }
}

pub fn site_filter(focus: Focus) -> Option<&'static str> {
    match focus {
        Focus::General => None,
        Focus::Academic => Some("(site:edu OR site:ac.uk OR site:ac.jp OR site:arxiv.org)"),
        Focus::News => Some("(site:reuters.com OR site:apnews.com OR site:bbc.com)"),
        Focus::Technical => {
            Some("(site:stackoverflow.com OR site:github.com OR site:developer.mozilla.org)")
        }
    }
}

pub fn filtered_query(query: &str, focus: Focus) -> String {
    match site_filter(focus) {
        Some(filter) => format!("{} {}", query.trim(), filter),
        None => query.trim().to_string(),
    }
}

/// Cuts `text` to at most `max` characters plus `"..."`.
///
/// Prefers the last space inside the final 20% of the window so words are not
/// split; cuts hard at `max` when there is none.
pub fn truncate_snippet(text: &str, max: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max) else {
        return text.to_string();
    };
    let window = &text[..cut];
    let min_space_chars = max * 4 / 5;

    let end = window
        .char_indices()
        .rev()
        .find(|(_, c)| *c == ' ')
        .map(|(byte, _)| byte)
        .filter(|byte| window[..*byte].chars().count() >= min_space_chars)
        .unwrap_or(cut);

    format!("{}...", window[..end].trim_end())
}

// =============================================================================
// Provider response
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InstantAnswerResponse {
    #[serde(rename = "Heading")]
    pub heading: String,
    #[serde(rename = "AbstractText")]
    pub abstract_text: String,
    #[serde(rename = "AbstractURL")]
    pub abstract_url: String,
    #[serde(rename = "AbstractSource")]
    pub abstract_source: String,
    /// A string for most answers, an object for a few answer types.
    #[serde(rename = "Answer")]
    pub answer: serde_json::Value,
    #[serde(rename = "AnswerType")]
    pub answer_type: String,
    #[serde(rename = "Definition")]
    pub definition: String,
    #[serde(rename = "DefinitionURL")]
    pub definition_url: String,
    #[serde(rename = "DefinitionSource")]
    pub definition_source: String,
    #[serde(rename = "RelatedTopics")]
    pub related_topics: Vec<RelatedTopic>,
    #[serde(rename = "Results")]
    pub results: Vec<TopicEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RelatedTopic {
    Group {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Topics")]
        topics: Vec<TopicEntry>,
    },
    Topic(TopicEntry),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TopicEntry {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "FirstURL")]
    pub first_url: String,
}

/// One usable piece of an instant-answer response, by origin.
#[derive(Debug, Clone, PartialEq)]
pub enum InstantAnswerItem {
    Abstract {
        heading: String,
        text: String,
        url: String,
        source: String,
    },
    Answer {
        text: String,
        answer_type: String,
    },
    Definition {
        text: String,
        url: String,
        source: String,
    },
    RelatedTopic {
        text: String,
        url: String,
    },
    WebResult {
        text: String,
        url: String,
    },
}

impl InstantAnswerItem {
    pub fn into_search_result(self, query: &str) -> SearchResult {
        match self {
            InstantAnswerItem::Abstract {
                heading,
                text,
                url,
                source,
            } => {
                let title = match (heading.is_empty(), source.is_empty()) {
                    (false, false) => format!("{heading} - {source}"),
                    (false, true) => heading,
                    (true, false) => format!("{query} - {source}"),
                    (true, true) => query.to_string(),
                };
                SearchResult::new(
                    truncate_title(&title),
                    url,
                    truncate_snippet(&text, SNIPPET_MAX_CHARS),
                    ResultType::Abstract,
                )
            }
            InstantAnswerItem::Answer { text, answer_type } => {
                let title = if answer_type.is_empty() {
                    "Instant answer".to_string()
                } else {
                    format!("Instant answer ({answer_type})")
                };
                SearchResult::new(
                    title,
                    fallback_links::primary_search_url(query),
                    truncate_snippet(&text, SNIPPET_MAX_CHARS),
                    ResultType::Answer,
                )
            }
            InstantAnswerItem::Definition { text, url, source } => {
                let title = if source.is_empty() {
                    format!("Definition of {query}")
                } else {
                    format!("Definition - {source}")
                };
                SearchResult::new(
                    truncate_title(&title),
                    url,
                    truncate_snippet(&text, SNIPPET_MAX_CHARS),
                    ResultType::Definition,
                )
            }
            InstantAnswerItem::RelatedTopic { text, url } => SearchResult::new(
                topic_title(&text),
                url,
                truncate_snippet(&text, SNIPPET_MAX_CHARS),
                ResultType::RelatedTopic,
            ),
            InstantAnswerItem::WebResult { text, url } => SearchResult::new(
                topic_title(&text),
                url,
                truncate_snippet(&text, SNIPPET_MAX_CHARS),
                ResultType::Result,
            ),
        }
    }
}

/// Usable items in preference order: abstract, answer, definition, up to 3
/// related topics (groups flattened), up to 5 generic results.
pub fn extract_items(response: InstantAnswerResponse) -> Vec<InstantAnswerItem> {
    let mut items = vec![];

    if !response.abstract_text.trim().is_empty() && !response.abstract_url.is_empty() {
        items.push(InstantAnswerItem::Abstract {
            heading: response.heading,
            text: response.abstract_text,
            url: response.abstract_url,
            source: response.abstract_source,
        });
    }

    let answer = match &response.answer {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Object(o) => o
            .get("data")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .trim()
            .to_string(),
        _ => String::new(),
    };
    if !answer.is_empty() {
        items.push(InstantAnswerItem::Answer {
            text: answer,
            answer_type: response.answer_type,
        });
    }

    if !response.definition.trim().is_empty() {
        items.push(InstantAnswerItem::Definition {
            text: response.definition,
            url: response.definition_url,
            source: response.definition_source,
        });
    }

    items.extend(
        response
            .related_topics
            .into_iter()
            .flat_map(|topic| match topic {
                RelatedTopic::Group { topics, .. } => topics,
                RelatedTopic::Topic(entry) => vec![entry],
            })
            .filter(|entry| !entry.text.trim().is_empty() && !entry.first_url.is_empty())
            .take(MAX_RELATED_TOPICS)
            .map(|entry| InstantAnswerItem::RelatedTopic {
                text: entry.text,
                url: entry.first_url,
            }),
    );

    items.extend(
        response
            .results
            .into_iter()
            .filter(|entry| !entry.text.trim().is_empty() && !entry.first_url.is_empty())
            .take(MAX_WEB_RESULTS)
            .map(|entry| InstantAnswerItem::WebResult {
                text: entry.text,
                url: entry.first_url,
            }),
    );

    items
}

/// Maps a decoded response to results; an empty extraction yields the single
/// synthetic fallback link.
pub fn to_search_results(response: InstantAnswerResponse, query: &str) -> Vec<SearchResult> {
    let results: Vec<SearchResult> = extract_items(response)
        .into_iter()
        .map(|item| item.into_search_result(query))
        .collect();
    if results.is_empty() {
        vec![fallback_links::view_all_results(query)]
    } else {
        results
    }
}

fn topic_title(text: &str) -> String {
    let head = text.split(" - ").next().unwrap_or(text);
    truncate_title(head)
}

fn truncate_title(title: &str) -> String {
    truncate_snippet(title, TITLE_MAX_CHARS)
}

// =============================================================================
// Client
// =============================================================================

pub struct DuckDuckGoClient {
    http: reqwest::Client,
    api_url: String,
}

impl DuckDuckGoClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    pub async fn instant_answer(
        &self,
        query: &str,
        focus: Focus,
    ) -> Result<Vec<SearchResult>, WebSearchError> {
        let q = filtered_query(query, focus);
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("q", q.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
                ("no_redirect", "1"),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(WebSearchError::Status(res.status()));
        }

        let body: InstantAnswerResponse = res.json().await?;
        Ok(to_search_results(body, query.trim()))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoClient {
    async fn search(&self, query: &str, focus: Focus) -> Vec<SearchResult> {
        match self.instant_answer(query, focus).await {
            Ok(results) if assess_quality(&results) == Quality::Good => {
                tracing::info!(count = results.len(), %focus, "instant answer accepted");
                results
            }
            Ok(results) => {
                tracing::info!(
                    count = results.len(),
                    %focus,
                    "instant answer too thin, using fallback links"
                );
                fallback_links::generate(query, focus)
            }
            Err(e) => {
                tracing::warn!(error = %e, %focus, "instant answer failed, using fallback links");
                fallback_links::generate(query, focus)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> InstantAnswerResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_truncate_snippet_600_chars() {
        let text = "lorem ipsum dolor sit amet ".repeat(23);
        let text = &text[..600];
        let out = truncate_snippet(text, 450);

        assert!(out.chars().count() <= 453);
        assert!(out.ends_with("..."));
        let body = out.trim_end_matches("...");
        // cut landed on a word boundary of the original
        assert_eq!(text.as_bytes()[body.len()], b' ');
        assert!(body.chars().count() >= 360);
    }

    #[test]
    fn test_truncate_snippet_without_spaces_cuts_hard() {
        let text = "x".repeat(600);
        let out = truncate_snippet(&text, 450);
        assert_eq!(out.chars().count(), 453);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_snippet_ignores_early_spaces() {
        // only space is at char 10, far outside the last 20% of the window
        let text = format!("short word {}", "y".repeat(590));
        let out = truncate_snippet(&text, 450);
        assert_eq!(out.chars().count(), 453);
    }

    #[test]
    fn test_truncate_snippet_short_and_multibyte() {
        assert_eq!(truncate_snippet("  hello  ", 450), "hello");
        let text = "ü".repeat(500);
        let out = truncate_snippet(&text, 450);
        assert_eq!(out.chars().count(), 453);
    }

    #[test]
    fn test_quality_classification() {
        let fallback = SearchResult::new("f", "https://duckduckgo.com", "", ResultType::Fallback);
        let abstract_ = SearchResult::new("a", "https://example.com", "", ResultType::Abstract);
        assert_eq!(assess_quality(&[]), Quality::Poor);
        assert_eq!(assess_quality(&[fallback.clone()]), Quality::Poor);
        assert_eq!(assess_quality(&[abstract_.clone()]), Quality::Good);
        assert_eq!(assess_quality(&[fallback, abstract_]), Quality::Good);
    }

    #[test]
    fn test_filtered_query() {
        assert_eq!(filtered_query(" rust ", Focus::General), "rust");
        let academic = filtered_query("protein folding", Focus::Academic);
        assert!(academic.starts_with("protein folding ("));
        assert!(academic.contains("site:edu"));
        assert!(academic.contains("site:ac.uk"));
    }

    #[test]
    fn test_extraction_order_and_limits() {
        let body = response(json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "AbstractSource": "Wikipedia",
            "Answer": "",
            "Definition": "rust: a reddish-brown oxide",
            "DefinitionURL": "https://www.merriam-webster.com/dictionary/rust",
            "DefinitionSource": "Merriam-Webster",
            "RelatedTopics": [
                {"Text": "Cargo - package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Tools", "Topics": [
                    {"Text": "Clippy - linter", "FirstURL": "https://duckduckgo.com/Clippy"},
                    {"Text": "Rustfmt - formatter", "FirstURL": "https://duckduckgo.com/Rustfmt"},
                    {"Text": "Miri - interpreter", "FirstURL": "https://duckduckgo.com/Miri"}
                ]}
            ],
            "Results": [
                {"Text": "Official site", "FirstURL": "https://www.rust-lang.org/"}
            ]
        }));

        let results = to_search_results(body, "rust");
        let kinds: Vec<ResultType> = results.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ResultType::Abstract,
                ResultType::Definition,
                ResultType::RelatedTopic,
                ResultType::RelatedTopic,
                ResultType::RelatedTopic,
                ResultType::Result,
            ]
        );
        assert_eq!(results[0].title, "Rust (programming language) - Wikipedia");
        assert_eq!(results[0].domain, "en.wikipedia.org");
        assert_eq!(results[2].title, "Cargo");
        assert_eq!(results[4].title, "Rustfmt");
        assert_eq!(results[5].domain, "rust-lang.org");
    }

    #[test]
    fn test_answer_extraction() {
        let body = response(json!({
            "Answer": "42",
            "AnswerType": "calc",
        }));
        let results = to_search_results(body, "6 * 7");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, ResultType::Answer);
        assert_eq!(results[0].snippet, "42");
        assert_eq!(assess_quality(&results), Quality::Good);
    }

    #[test]
    fn test_empty_response_yields_fallback_result() {
        let results = to_search_results(response(json!({})), "climate change");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, ResultType::Fallback);
        assert_eq!(assess_quality(&results), Quality::Poor);
    }

    #[test]
    fn test_long_abstract_is_truncated() {
        let body = response(json!({
            "Heading": "Topic",
            "AbstractText": "word ".repeat(200),
            "AbstractURL": "https://example.com/topic",
        }));
        let results = to_search_results(body, "topic");
        assert!(results[0].snippet.chars().count() <= SNIPPET_MAX_CHARS + 3);
        assert!(results[0].snippet.ends_with("..."));
    }
}

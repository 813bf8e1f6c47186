use std::fmt;
use std::str::FromStr;

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};
use url::Url;

pub const MAX_QUERY_CHARS: usize = 500;
pub const MAX_ANSWER_CHARS: usize = 10_000;
pub const MAX_COLLECTION_NAME_CHARS: usize = 100;
pub const MAX_COLLECTION_DESCRIPTION_CHARS: usize = 500;
pub const DEFAULT_COLLECTION_COLOR: &str = "#3B82F6";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Focus {
    #[default]
    General,
    Academic,
    News,
    Technical,
}

impl Focus {
    pub const ALL: [Focus; 4] = [Focus::General, Focus::Academic, Focus::News, Focus::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::General => "general",
            Focus::Academic => "academic",
            Focus::News => "news",
            Focus::Technical => "technical",
        }
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Focus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Focus::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| {
                format!("Invalid focus '{s}', expected one of: general, academic, news, technical")
            })
    }
}

/// Where a [`SearchResult`] came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Abstract,
    Answer,
    Definition,
    RelatedTopic,
    Result,
    /// Link back to the provider's own results page.
    Search,
    Specific,
    Curated,
    Fallback,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: ResultType,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        kind: ResultType,
    ) -> SearchResult {
        let url = url.into();
        SearchResult {
            title: title.into(),
            domain: domain_of(&url),
            url,
            snippet: snippet.into(),
            kind,
        }
    }
}

/// Host of `url` without a leading `www.`; empty when the URL does not parse.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SearchMetadata {
    pub processing_time_ms: u64,
    pub tokens_used_estimate: u64,
    pub source_count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: String,
    pub query: String,
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub focus: Focus,
    pub conversation_id: Option<String>,
    pub metadata: SearchMetadata,
    pub is_bookmarked: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl SearchRecord {
    /// `metadata.source_count` is always derived from `sources`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        query: String,
        answer: String,
        sources: Vec<SearchResult>,
        focus: Focus,
        conversation_id: Option<String>,
        processing_time_ms: u64,
        tokens_used_estimate: u64,
    ) -> SearchRecord {
        let now = DateTime::now();
        SearchRecord {
            id: ObjectId::new(),
            user_id,
            query,
            answer: truncate_chars(answer, MAX_ANSWER_CHARS),
            metadata: SearchMetadata {
                processing_time_ms,
                tokens_used_estimate,
                source_count: sources.len() as u64,
            },
            sources,
            focus,
            conversation_id,
            is_bookmarked: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub search_ids: Vec<ObjectId>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub color: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Collection {
    pub fn new(user_id: String, name: String) -> Collection {
        let now = DateTime::now();
        Collection {
            id: ObjectId::new(),
            user_id,
            name,
            description: None,
            search_ids: vec![],
            tags: vec![],
            is_public: false,
            color: DEFAULT_COLLECTION_COLOR.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_parsing() {
        assert_eq!("news".parse::<Focus>(), Ok(Focus::News));
        assert_eq!("technical".parse::<Focus>(), Ok(Focus::Technical));
        assert!("invalid-value".parse::<Focus>().is_err());
        assert!("News".parse::<Focus>().is_err());
        assert_eq!(Focus::default(), Focus::General);
    }

    #[test]
    fn test_focus_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Focus::Academic).unwrap(), "\"academic\"");
        let parsed: Focus = serde_json::from_str("\"technical\"").unwrap();
        assert_eq!(parsed, Focus::Technical);
    }

    #[test]
    fn test_search_result_domain() {
        let r = SearchResult::new(
            "t",
            "https://www.reuters.com/site-search/?query=x",
            "",
            ResultType::Curated,
        );
        assert_eq!(r.domain, "reuters.com");
        let r = SearchResult::new("t", "not a url", "", ResultType::Fallback);
        assert_eq!(r.domain, "");
    }

    #[test]
    fn test_search_result_type_field_name() {
        let r = SearchResult::new("t", "https://example.com", "s", ResultType::RelatedTopic);
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["type"], "related_topic");
        assert_eq!(value["domain"], "example.com");
    }

    #[test]
    fn test_record_source_count_matches_sources() {
        let sources = vec![
            SearchResult::new("a", "https://a.com", "", ResultType::Result),
            SearchResult::new("b", "https://b.com", "", ResultType::Result),
        ];
        let record = SearchRecord::new(
            "user-1".into(),
            "query".into(),
            "answer".into(),
            sources,
            Focus::General,
            None,
            12,
            1,
        );
        assert_eq!(record.metadata.source_count, record.sources.len() as u64);
        assert!(!record.is_bookmarked);
    }

    #[test]
    fn test_record_answer_is_capped() {
        let answer = "é".repeat(MAX_ANSWER_CHARS + 50);
        let record = SearchRecord::new(
            "user-1".into(),
            "q".into(),
            answer,
            vec![],
            Focus::General,
            None,
            0,
            0,
        );
        assert_eq!(record.answer.chars().count(), MAX_ANSWER_CHARS);
        assert_eq!(record.metadata.source_count, 0);
    }
}

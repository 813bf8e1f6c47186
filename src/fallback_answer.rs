use crate::data_models::{Focus, SearchMetadata, SearchResult};
use crate::fallback_links;

/// Reported when the composed answer is used on its own.
pub const PLACEHOLDER_PROCESSING_MS: u64 = 50;
const LISTED_SOURCES: usize = 5;

#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub metadata: SearchMetadata,
}

fn focus_description(focus: Focus) -> &'static str {
    match focus {
        Focus::General => "a broad overview drawn from general web sources",
        Focus::Academic => "scholarly and research-oriented sources",
        Focus::News => "recent news coverage and current events",
        Focus::Technical => "technical documentation and developer resources",
    }
}

/// Templated answer listing the raw sources. Never fails.
pub fn compose(query: &str, focus: Focus, results: Vec<SearchResult>) -> ComposedAnswer {
    let sources = if results.is_empty() {
        vec![fallback_links::view_all_results(query)]
    } else {
        results
    };

    let count = sources.len();
    let listed = sources
        .iter()
        .take(LISTED_SOURCES)
        .enumerate()
        .map(|(i, s)| {
            if s.snippet.is_empty() {
                format!("{}. [{}]({})", i + 1, s.title, s.url)
            } else {
                format!("{}. [{}]({}) - {}", i + 1, s.title, s.url, s.snippet)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let answer = format!(
        "Here is what I found for \"{query}\" across {count} {noun}.\n\n\
         **Focus Mode: {focus}** - {description}.\n\n\
         **Sources:**\n{listed}\n\n\
         An AI-generated summary is not available right now, so the sources are listed \
         directly. Open them for the full details.",
        noun = if count == 1 { "source" } else { "sources" },
        description = focus_description(focus),
    );

    ComposedAnswer {
        answer,
        metadata: SearchMetadata {
            processing_time_ms: PLACEHOLDER_PROCESSING_MS,
            tokens_used_estimate: 0,
            source_count: count as u64,
        },
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::ResultType;

    #[test]
    fn test_empty_results_get_view_all_link() {
        let composed = compose("tide tables", Focus::General, vec![]);
        assert_eq!(composed.sources.len(), 1);
        assert_eq!(composed.sources[0].kind, ResultType::Fallback);
        assert_eq!(composed.metadata.source_count, 1);
        assert_eq!(composed.metadata.tokens_used_estimate, 0);
        assert_eq!(composed.metadata.processing_time_ms, PLACEHOLDER_PROCESSING_MS);
        assert!(composed.answer.contains("1 source."));
    }

    #[test]
    fn test_template_mentions_focus_and_sources() {
        let results = fallback_links::generate("climate change", Focus::News);
        let composed = compose("climate change", Focus::News, results);
        assert!(composed.answer.contains("Focus Mode: news"));
        assert!(composed.answer.contains("3 sources"));
        assert!(composed.answer.contains("news.google.com"));
        assert_eq!(composed.metadata.source_count, 3);
        assert_eq!(composed.sources.len(), 3);
    }

    #[test]
    fn test_lists_at_most_five_sources() {
        let results: Vec<SearchResult> = (1..=7)
            .map(|i| {
                SearchResult::new(
                    format!("R{i}"),
                    format!("https://example.com/{i}"),
                    "",
                    ResultType::Result,
                )
            })
            .collect();
        let composed = compose("q", Focus::Technical, results);
        assert!(composed.answer.contains("5. [R5]"));
        assert!(!composed.answer.contains("6. [R6]"));
        assert_eq!(composed.sources.len(), 7);
    }
}

//! Search pipeline: web search, then summarization, with a templated answer
//! whenever the summarizer is unavailable or there is nothing to summarize.
//!
//! ```text
//!   Searching ──(no sources)──────────────┐
//!       │                                 ▼
//!       └──(sources)──▶ Summarizing ──(error)──▶ Fallback
//!                           │                     │
//!                           └──(answer)──▶ Done ◀─┘
//! ```
//!
//! Neither external dependency can fail the request; only storage errors
//! propagate.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::data_models::{Focus, SearchRecord, SearchResult};
use crate::fallback_answer;
use crate::store::SearchStore;
use crate::summarizer::Summarizer;
use crate::web_search::WebSearch;

/// A validated search request.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub focus: Focus,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Summarizer,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub tokens_used_estimate: u64,
    pub answered_by: AnswerSource,
}

enum Stage {
    Searching,
    Summarizing(Vec<SearchResult>),
    Fallback(Vec<SearchResult>),
    Done(Outcome),
}

pub struct SearchOrchestrator {
    web_search: Arc<dyn WebSearch>,
    summarizer: Arc<dyn Summarizer>,
    searches: Arc<dyn SearchStore>,
}

impl SearchOrchestrator {
    pub fn new(
        web_search: Arc<dyn WebSearch>,
        summarizer: Arc<dyn Summarizer>,
        searches: Arc<dyn SearchStore>,
    ) -> Self {
        Self {
            web_search,
            summarizer,
            searches,
        }
    }

    /// Runs the stages to completion. Infallible by construction.
    pub async fn answer(&self, query: &str, focus: Focus) -> Outcome {
        let mut stage = Stage::Searching;
        loop {
            stage = match stage {
                Stage::Searching => {
                    let sources = self.web_search.search(query, focus).await;
                    tracing::debug!(count = sources.len(), "search stage finished");
                    if sources.is_empty() {
                        Stage::Fallback(sources)
                    } else {
                        Stage::Summarizing(sources)
                    }
                }
                Stage::Summarizing(sources) => {
                    match self.summarizer.summarize(query, &sources, focus).await {
                        Ok(answer) => {
                            let tokens = answer.chars().count() as u64 / 4;
                            Stage::Done(Outcome {
                                answer,
                                sources,
                                tokens_used_estimate: tokens,
                                answered_by: AnswerSource::Summarizer,
                            })
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "summarizer unavailable, composing fallback answer");
                            Stage::Fallback(sources)
                        }
                    }
                }
                Stage::Fallback(sources) => {
                    let composed = fallback_answer::compose(query, focus, sources);
                    Stage::Done(Outcome {
                        answer: composed.answer,
                        sources: composed.sources,
                        tokens_used_estimate: composed.metadata.tokens_used_estimate,
                        answered_by: AnswerSource::Fallback,
                    })
                }
                Stage::Done(outcome) => return outcome,
            };
        }
    }

    /// Answers `request` for `user_id` and persists the record.
    #[tracing::instrument(skip(self, request), fields(focus = %request.focus))]
    pub async fn run(&self, user_id: &str, request: SearchQuery) -> Result<SearchRecord> {
        let started = Instant::now();
        let outcome = self.answer(&request.query, request.focus).await;

        let record = SearchRecord::new(
            user_id.to_string(),
            request.query,
            outcome.answer,
            outcome.sources,
            request.focus,
            request.conversation_id,
            started.elapsed().as_millis() as u64,
            outcome.tokens_used_estimate,
        );
        self.searches.insert(&record).await?;

        tracing::info!(
            search_id = %record.id,
            sources = record.metadata.source_count,
            elapsed_ms = record.metadata.processing_time_ms,
            answered_by = ?outcome.answered_by,
            "search completed"
        );
        Ok(record)
    }
}


#[cfg(test)]
mod tests {
    use super::test_doubles::*;
    use super::*;
    use crate::data_models::ResultType;
    use crate::memory_store::MemoryStore;

    fn orchestrator(
        search: impl WebSearch + 'static,
        summarizer: impl Summarizer + 'static,
    ) -> (SearchOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            SearchOrchestrator::new(Arc::new(search), Arc::new(summarizer), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_summarized_answer() {
        let (orch, _) = orchestrator(
            FixedSearch(sample_results()),
            FixedSummary("Rust is both an oxide and a language [1][2].".to_string()),
        );
        let outcome = orch.answer("rust", Focus::General).await;
        assert_eq!(outcome.answered_by, AnswerSource::Summarizer);
        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(
            outcome.tokens_used_estimate,
            outcome.answer.chars().count() as u64 / 4
        );
    }

    #[tokio::test]
    async fn test_summarizer_failure_falls_back() {
        let (orch, _) = orchestrator(FixedSearch(sample_results()), FailingSummary);
        let outcome = orch.answer("rust", Focus::Technical).await;
        assert_eq!(outcome.answered_by, AnswerSource::Fallback);
        assert_eq!(outcome.tokens_used_estimate, 0);
        assert_eq!(outcome.sources, sample_results());
        assert!(outcome.answer.contains("Focus Mode: technical"));
    }

    #[tokio::test]
    async fn test_empty_sources_skip_summarizer() {
        // a working summarizer must not be consulted without sources
        let (orch, _) = orchestrator(FixedSearch(vec![]), FixedSummary("unused".to_string()));
        let outcome = orch.answer("anything", Focus::General).await;
        assert_eq!(outcome.answered_by, AnswerSource::Fallback);
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].kind, ResultType::Fallback);
    }

    #[tokio::test]
    async fn test_run_persists_consistent_record() -> Result<()> {
        let (orch, store) = orchestrator(FixedSearch(sample_results()), FailingSummary);
        let record = orch
            .run(
                "alice",
                SearchQuery {
                    query: "rust".to_string(),
                    focus: Focus::News,
                    conversation_id: Some("conv-9".to_string()),
                },
            )
            .await?;

        let stored = SearchStore::find_by_id(store.as_ref(), record.id)
            .await?
            .expect("record persisted");
        assert_eq!(stored.user_id, "alice");
        assert_eq!(stored.focus, Focus::News);
        assert_eq!(stored.conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(stored.sources.len() as u64, stored.metadata.source_count);
        Ok(())
    }
}

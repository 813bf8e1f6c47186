//! Referral links used when the search provider has nothing useful.
//!
//! Two tiers: *specific* links built from keywords found in the query, and a
//! *curated* pair per focus when no keyword matched. Either way the list
//! starts with the "primary search" link back to the provider.

use thiserror::Error;
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::data_models::{Focus, ResultType, SearchResult};

const PRIMARY_SEARCH_URL: &str = "https://duckduckgo.com/";

#[derive(Debug, Error)]
enum LinkError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("cannot append path segment to {0}")]
    Path(String),
}

type LinkResult<T> = Result<T, LinkError>;

/// (query word, display name, Stack Overflow tag, documentation search endpoint and parameter)
type TechKeyword = (&'static str, &'static str, &'static str, Option<(&'static str, &'static str)>);

const TECH_KEYWORDS: &[TechKeyword] = &[
    ("python", "Python", "python", Some(("https://docs.python.org/3/search.html", "q"))),
    ("javascript", "JavaScript", "javascript", Some(("https://developer.mozilla.org/en-US/search", "q"))),
    ("js", "JavaScript", "javascript", Some(("https://developer.mozilla.org/en-US/search", "q"))),
    ("typescript", "TypeScript", "typescript", Some(("https://developer.mozilla.org/en-US/search", "q"))),
    ("html", "HTML", "html", Some(("https://developer.mozilla.org/en-US/search", "q"))),
    ("css", "CSS", "css", Some(("https://developer.mozilla.org/en-US/search", "q"))),
    ("rust", "Rust", "rust", Some(("https://doc.rust-lang.org/std/", "search"))),
    ("go", "Go", "go", Some(("https://pkg.go.dev/search", "q"))),
    ("golang", "Go", "go", Some(("https://pkg.go.dev/search", "q"))),
    ("java", "Java", "java", None),
    ("kotlin", "Kotlin", "kotlin", None),
    ("c++", "C++", "c%2b%2b", None),
    ("c#", "C#", "c%23", None),
    ("ruby", "Ruby", "ruby", None),
    ("php", "PHP", "php", None),
    ("swift", "Swift", "swift", None),
    ("react", "React", "reactjs", None),
    ("vue", "Vue", "vue.js", None),
    ("angular", "Angular", "angular", None),
    ("node", "Node.js", "node.js", None),
    ("nodejs", "Node.js", "node.js", None),
    ("docker", "Docker", "docker", Some(("https://docs.docker.com/search/", "q"))),
    ("kubernetes", "Kubernetes", "kubernetes", Some(("https://kubernetes.io/search/", "q"))),
    ("k8s", "Kubernetes", "kubernetes", Some(("https://kubernetes.io/search/", "q"))),
    ("sql", "SQL", "sql", None),
    ("postgres", "PostgreSQL", "postgresql", None),
    ("postgresql", "PostgreSQL", "postgresql", None),
    ("mongodb", "MongoDB", "mongodb", None),
    ("git", "Git", "git", None),
    ("linux", "Linux", "linux", None),
    ("bash", "Bash", "bash", None),
    ("aws", "AWS", "amazon-web-services", None),
];

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "paper",
    "papers",
    "study",
    "studies",
    "theory",
    "journal",
    "thesis",
    "analysis",
    "algorithm",
    "hypothesis",
    "survey",
    "review",
    "experiment",
    "dataset",
];

const DEFINITION_PREFIXES: &[&str] = &[
    "what is ",
    "what are ",
    "who is ",
    "who was ",
    "define ",
    "meaning of ",
];

const TUTORIAL_MARKERS: &[&str] = &["how to ", "tutorial", "guide", "learn "];

/// Never fails: if a link cannot be built the result degrades to a single
/// generic fallback link.
pub fn generate(query: &str, focus: Focus) -> Vec<SearchResult> {
    let query = query.trim();
    match try_generate(query, focus) {
        Ok(links) => links,
        Err(e) => {
            tracing::warn!(error = %e, %focus, "fallback link generation failed");
            vec![view_all_results(query)]
        }
    }
}

fn try_generate(query: &str, focus: Focus) -> LinkResult<Vec<SearchResult>> {
    let specific = specific_links(query, focus)?;
    let mut links = vec![primary_search(query)?];
    if specific.is_empty() {
        tracing::debug!(%focus, "no keyword match, using curated links");
        links.extend(curated_links(query, focus)?);
    } else {
        links.extend(specific);
    }
    Ok(links)
}

/// Provider results page for `query`, as a plain string.
pub fn primary_search_url(query: &str) -> String {
    format!("{PRIMARY_SEARCH_URL}?q={}", encode(query))
}

/// Synthetic "view all results" link, built without any fallible step.
pub fn view_all_results(query: &str) -> SearchResult {
    SearchResult::new(
        format!("View all results for \"{query}\""),
        primary_search_url(query),
        "Open the full list of web results for this query.",
        ResultType::Fallback,
    )
}

fn primary_search(query: &str) -> LinkResult<SearchResult> {
    Ok(SearchResult::new(
        format!("Search results for \"{query}\""),
        with_params(PRIMARY_SEARCH_URL, &[("q", query)])?,
        "Browse the complete web search results for this query.",
        ResultType::Search,
    ))
}

fn specific_links(query: &str, focus: Focus) -> LinkResult<Vec<SearchResult>> {
    let lowered = query.to_lowercase();
    let mut links = vec![];

    match focus {
        Focus::Technical => {
            if let Some(&(_, name, tag, docs)) = words(&lowered)
                .find_map(|w| TECH_KEYWORDS.iter().find(|(kw, ..)| *kw == w))
            {
                links.push(SearchResult::new(
                    format!("Stack Overflow: {name} questions"),
                    format!("https://stackoverflow.com/questions/tagged/{tag}"),
                    format!("Community questions and answers tagged {name}."),
                    ResultType::Specific,
                ));
                links.push(SearchResult::new(
                    format!("GitHub repositories for \"{query}\""),
                    with_params(
                        "https://github.com/search",
                        &[("q", query), ("type", "repositories")],
                    )?,
                    "Open-source code and projects related to this query.",
                    ResultType::Specific,
                ));
                links.push(SearchResult::new(
                    format!("{name} documentation"),
                    match docs {
                        Some((base, param)) => with_params(base, &[(param, query)])?,
                        None => devdocs(query)?,
                    },
                    format!("Official reference material for {name}."),
                    ResultType::Specific,
                ));
            }
        }
        Focus::Academic => {
            if words(&lowered).any(|w| RESEARCH_KEYWORDS.contains(&w)) {
                links.push(arxiv(query, ResultType::Specific)?);
            }
        }
        Focus::General => {
            let subject = DEFINITION_PREFIXES
                .iter()
                .find_map(|p| lowered.strip_prefix(p).and_then(|_| query.get(p.len()..)))
                .or_else(|| (words(&lowered).count() <= 3).then_some(query));
            if let Some(subject) = subject {
                let subject = subject.trim().trim_end_matches('?').trim();
                if !subject.is_empty() {
                    links.push(SearchResult::new(
                        format!("{subject} - Wikipedia"),
                        wikipedia_article(subject)?,
                        "Encyclopedia article covering this topic.",
                        ResultType::Specific,
                    ));
                }
            }
            if TUTORIAL_MARKERS.iter().any(|m| lowered.contains(m)) {
                links.push(SearchResult::new(
                    format!("Video tutorials: {query}"),
                    with_params(
                        "https://www.youtube.com/results",
                        &[("search_query", query)],
                    )?,
                    "Step-by-step video walkthroughs.",
                    ResultType::Specific,
                ));
            }
        }
        Focus::News => {}
    }

    Ok(links)
}

fn curated_links(query: &str, focus: Focus) -> LinkResult<Vec<SearchResult>> {
    Ok(match focus {
        Focus::News => vec![
            SearchResult::new(
                format!("Google News: {query}"),
                with_params("https://news.google.com/search", &[("q", query)])?,
                "Latest coverage aggregated from news outlets.",
                ResultType::Curated,
            ),
            SearchResult::new(
                format!("Reuters: {query}"),
                with_params("https://www.reuters.com/site-search/", &[("query", query)])?,
                "Wire-service reporting on this topic.",
                ResultType::Curated,
            ),
        ],
        Focus::Academic => vec![
            arxiv(query, ResultType::Curated)?,
            SearchResult::new(
                format!("ResearchGate: {query}"),
                with_params(
                    "https://www.researchgate.net/search/publication",
                    &[("q", query)],
                )?,
                "Publications shared by researchers.",
                ResultType::Curated,
            ),
        ],
        Focus::Technical => vec![
            SearchResult::new(
                format!("Stack Overflow: {query}"),
                with_params("https://stackoverflow.com/search", &[("q", query)])?,
                "Programming questions and answers.",
                ResultType::Curated,
            ),
            SearchResult::new(
                format!("DevDocs: {query}"),
                devdocs(query)?,
                "API documentation across languages and frameworks.",
                ResultType::Curated,
            ),
        ],
        Focus::General => vec![
            SearchResult::new(
                format!("Wikipedia: {query}"),
                with_params("https://en.wikipedia.org/w/index.php", &[("search", query)])?,
                "Encyclopedia articles matching this query.",
                ResultType::Curated,
            ),
            SearchResult::new(
                format!("Video tutorials: {query}"),
                with_params(
                    "https://www.youtube.com/results",
                    &[("search_query", &format!("{query} tutorial"))],
                )?,
                "Video explanations and tutorials.",
                ResultType::Curated,
            ),
        ],
    })
}

fn arxiv(query: &str, kind: ResultType) -> LinkResult<SearchResult> {
    Ok(SearchResult::new(
        format!("arXiv papers: {query}"),
        with_params(
            "https://arxiv.org/search/",
            &[("query", query), ("searchtype", "all")],
        )?,
        "Open-access preprints and research papers.",
        kind,
    ))
}

fn devdocs(query: &str) -> LinkResult<String> {
    let mut url = Url::parse("https://devdocs.io/")?;
    url.set_fragment(Some(&format!("q={query}")));
    Ok(url.into())
}

fn wikipedia_article(subject: &str) -> LinkResult<String> {
    let mut title: String = subject.split_whitespace().collect::<Vec<_>>().join("_");
    if let Some(first) = title.get(..1) {
        title = first.to_uppercase() + &title[1..];
    }
    let mut url = Url::parse("https://en.wikipedia.org/wiki/")?;
    url.path_segments_mut()
        .map_err(|_| LinkError::Path("https://en.wikipedia.org/wiki/".to_string()))?
        .pop_if_empty()
        .push(&title);
    Ok(url.into())
}

fn with_params(base: &str, params: &[(&str, &str)]) -> LinkResult<String> {
    Ok(Url::parse_with_params(base, params)?.into())
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|w| !w.is_empty())
}

fn encode(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(links: &[SearchResult]) -> Vec<&str> {
        links.iter().map(|l| l.url.as_str()).collect()
    }

    #[test]
    fn test_news_curated_links() {
        let links = generate("climate change", Focus::News);
        assert_eq!(
            urls(&links),
            vec![
                "https://duckduckgo.com/?q=climate+change",
                "https://news.google.com/search?q=climate+change",
                "https://www.reuters.com/site-search/?query=climate+change",
            ]
        );
        assert_eq!(links[0].kind, ResultType::Search);
        assert!(links[1..].iter().all(|l| l.kind == ResultType::Curated));
        assert_eq!(links[1].domain, "news.google.com");
        assert_eq!(links[2].domain, "reuters.com");
    }

    #[test]
    fn test_curated_links_are_deterministic() {
        for focus in Focus::ALL {
            let first = generate("ocean currents and weather patterns today", focus);
            let second = generate("ocean currents and weather patterns today", focus);
            assert_eq!(first, second, "focus {focus}");
            assert_eq!(first.len(), 3, "focus {focus}");
        }
    }

    #[test]
    fn test_technical_keyword_links() {
        let links = generate("How do I read a file in Python?", Focus::Technical);
        assert_eq!(links.len(), 4);
        assert_eq!(links[0].kind, ResultType::Search);
        assert_eq!(
            links[1].url,
            "https://stackoverflow.com/questions/tagged/python"
        );
        assert!(links[2].url.starts_with("https://github.com/search?q="));
        assert!(links[2].url.ends_with("&type=repositories"));
        assert!(links[3].url.starts_with("https://docs.python.org/3/search.html?q="));
        assert!(links[1..].iter().all(|l| l.kind == ResultType::Specific));
    }

    #[test]
    fn test_technical_symbols_and_devdocs() {
        let links = generate("c++ smart pointers", Focus::Technical);
        assert_eq!(
            links[1].url,
            "https://stackoverflow.com/questions/tagged/c%2b%2b"
        );
        assert!(links[3].url.starts_with("https://devdocs.io/#q="));

        let links = generate("memory leak in my program", Focus::Technical);
        assert_eq!(links.len(), 3);
        assert!(links[1].url.starts_with("https://stackoverflow.com/search?q="));
        assert_eq!(links[2].domain, "devdocs.io");
    }

    #[test]
    fn test_academic_tiers() {
        let links = generate("recent research on coral bleaching", Focus::Academic);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].kind, ResultType::Specific);
        assert_eq!(links[1].domain, "arxiv.org");

        let links = generate("coral bleaching in the pacific", Focus::Academic);
        assert_eq!(links.len(), 3);
        assert_eq!(links[1].domain, "arxiv.org");
        assert_eq!(links[2].domain, "researchgate.net");
    }

    #[test]
    fn test_general_wikipedia_and_video() {
        let links = generate("What is photosynthesis?", Focus::General);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].url, "https://en.wikipedia.org/wiki/Photosynthesis");

        let links = generate("how to bake sourdough bread at home", Focus::General);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].domain, "youtube.com");
        assert_eq!(links[1].kind, ResultType::Specific);

        let links = generate("climate change", Focus::General);
        assert_eq!(links[1].url, "https://en.wikipedia.org/wiki/Climate_change");
    }

    #[test]
    fn test_view_all_results_link() {
        let link = view_all_results("rust & wasm");
        assert_eq!(link.kind, ResultType::Fallback);
        assert_eq!(link.url, "https://duckduckgo.com/?q=rust+%26+wasm");
        assert_eq!(link.domain, "duckduckgo.com");
    }
}

use std::collections::HashSet;

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::data_models::{
    Collection, Focus, MAX_COLLECTION_DESCRIPTION_CHARS, MAX_COLLECTION_NAME_CHARS,
    MAX_QUERY_CHARS, SearchMetadata, SearchRecord, SearchResult,
};
use crate::error::AppError;
use crate::orchestrator::SearchQuery;
use crate::store::{DEFAULT_PAGE_LIMIT, PageRequest};

pub const MAX_CONVERSATION_ID_CHARS: usize = 100;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 30;

pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| AppError::Validation(format!("Invalid {what} id '{raw}'")))
}

fn rfc3339(dt: DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl SearchRequest {
    pub fn validate(self) -> Result<SearchQuery, AppError> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::Validation("Query cannot be empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::Validation(format!(
                "Query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }

        let focus = match self.focus.as_deref() {
            None => Focus::default(),
            Some(raw) => raw.parse::<Focus>().map_err(AppError::Validation)?,
        };

        let conversation_id = self
            .conversation_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(c) = &conversation_id {
            if c.chars().count() > MAX_CONVERSATION_ID_CHARS {
                return Err(AppError::Validation(format!(
                    "conversationId must be at most {MAX_CONVERSATION_ID_CHARS} characters"
                )));
            }
        }

        Ok(SearchQuery {
            query,
            focus,
            conversation_id,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub bookmarked: Option<bool>,
}

impl HistoryQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub color: Option<String>,
}

/// Every field is optional; absent fields are left untouched.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCollectionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSearchRequest {
    pub search_id: String,
}

pub fn validate_collection_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_COLLECTION_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Collection name must be 1 to {MAX_COLLECTION_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Blank descriptions clear the field.
pub fn validate_description(description: &str) -> Result<Option<String>, AppError> {
    let description = description.trim();
    if description.chars().count() > MAX_COLLECTION_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Description must be at most {MAX_COLLECTION_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(Some(description.to_string()).filter(|d| !d.is_empty()))
}

/// Trims, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(AppError::Validation(format!(
                "Tags must be at most {MAX_TAG_CHARS} characters"
            )));
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    if out.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "A collection can have at most {MAX_TAGS} tags"
        )));
    }
    Ok(out)
}

pub fn validate_color(color: &str) -> Result<String, AppError> {
    let color = color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::Validation(format!(
            "Color must look like #RRGGBB, got '{color}'"
        )));
    }
    Ok(color.to_string())
}

impl CreateCollectionRequest {
    /// Validated collection for `user_id`. Name uniqueness is checked by the caller.
    pub fn into_collection(self, user_id: &str) -> Result<Collection, AppError> {
        let mut collection =
            Collection::new(user_id.to_string(), validate_collection_name(&self.name)?);
        if let Some(d) = self.description {
            collection.description = validate_description(&d)?;
        }
        if let Some(tags) = self.tags {
            collection.tags = normalize_tags(tags)?;
        }
        if let Some(color) = self.color {
            collection.color = validate_color(&color)?;
        }
        collection.is_public = self.is_public.unwrap_or(false);
        Ok(collection)
    }
}

impl UpdateCollectionRequest {
    /// Applies the present fields. Returns whether the name changed.
    pub fn apply(self, collection: &mut Collection) -> Result<bool, AppError> {
        let mut renamed = false;
        if let Some(name) = self.name {
            let name = validate_collection_name(&name)?;
            renamed = name != collection.name;
            collection.name = name;
        }
        if let Some(d) = self.description {
            collection.description = validate_description(&d)?;
        }
        if let Some(tags) = self.tags {
            collection.tags = normalize_tags(tags)?;
        }
        if let Some(color) = self.color {
            collection.color = validate_color(&color)?;
        }
        if let Some(is_public) = self.is_public {
            collection.is_public = is_public;
        }
        collection.updated_at = DateTime::now();
        Ok(renamed)
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataView {
    pub processing_time_ms: u64,
    pub tokens_used_estimate: u64,
    pub source_count: u64,
}

impl From<&SearchMetadata> for MetadataView {
    fn from(m: &SearchMetadata) -> Self {
        Self {
            processing_time_ms: m.processing_time_ms,
            tokens_used_estimate: m.tokens_used_estimate,
            source_count: m.source_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub id: String,
    pub query: String,
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub focus: Focus,
    pub conversation_id: Option<String>,
    pub is_bookmarked: bool,
    pub created_at: String,
    pub updated_at: String,
    pub metadata: MetadataView,
}

impl From<SearchRecord> for SearchView {
    fn from(r: SearchRecord) -> Self {
        Self {
            id: r.id.to_hex(),
            metadata: MetadataView::from(&r.metadata),
            query: r.query,
            answer: r.answer,
            sources: r.sources,
            focus: r.focus,
            conversation_id: r.conversation_id,
            is_bookmarked: r.is_bookmarked,
            created_at: rfc3339(r.created_at),
            updated_at: rfc3339(r.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub color: String,
    pub search_ids: Vec<String>,
    pub search_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Collection> for CollectionView {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id.to_hex(),
            search_count: c.search_ids.len(),
            search_ids: c.search_ids.iter().map(|id| id.to_hex()).collect(),
            name: c.name,
            description: c.description,
            tags: c.tags,
            is_public: c.is_public,
            color: c.color,
            created_at: rfc3339(c.created_at),
            updated_at: rfc3339(c.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchEnvelope {
    pub search: SearchView,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: PageRequest, total: u64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            pages: total.div_ceil(page.limit),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub searches: Vec<SearchView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SearchList {
    pub searches: Vec<SearchView>,
}

#[derive(Debug, Serialize)]
pub struct CollectionEnvelope {
    pub collection: CollectionView,
}

#[derive(Debug, Serialize)]
pub struct CollectionList {
    pub collections: Vec<CollectionView>,
}

#[derive(Debug, Serialize)]
pub struct CollectionDetail {
    pub collection: CollectionView,
    pub searches: Vec<SearchView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_request(query: &str, focus: Option<&str>) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            focus: focus.map(str::to_string),
            conversation_id: None,
        }
    }

    #[test]
    fn test_search_request_validation() {
        let q = search_request("  what is rust  ", None).validate().unwrap();
        assert_eq!(q.query, "what is rust");
        assert_eq!(q.focus, Focus::General);

        assert!(search_request("   ", None).validate().is_err());
        assert!(search_request(&"a".repeat(501), None).validate().is_err());
        assert!(search_request(&"a".repeat(500), None).validate().is_ok());
        assert!(matches!(
            search_request("q", Some("invalid-value")).validate(),
            Err(AppError::Validation(_))
        ));

        let mut req = search_request("q", Some("news"));
        req.conversation_id = Some("c".repeat(101));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_tags_are_normalized() {
        let tags = normalize_tags(vec![
            " rust ".to_string(),
            "".to_string(),
            "rust".to_string(),
            "async".to_string(),
        ])
        .unwrap();
        assert_eq!(tags, vec!["rust", "async"]);

        assert!(normalize_tags(vec!["x".repeat(31)]).is_err());
        let many: Vec<String> = (0..21).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(many).is_err());
    }

    #[test]
    fn test_color_and_name() {
        assert_eq!(validate_color("#a1B2c3").unwrap(), "#a1B2c3");
        assert!(validate_color("a1b2c3").is_err());
        assert!(validate_color("#12345g").is_err());
        assert!(validate_collection_name("  ").is_err());
        assert!(validate_collection_name(&"n".repeat(101)).is_err());
        assert_eq!(validate_description("   ").unwrap(), None);
    }

    #[test]
    fn test_update_reports_rename() {
        let mut c = Collection::new("u".to_string(), "Reading".to_string());
        let renamed = UpdateCollectionRequest {
            name: Some(" Reading ".to_string()),
            is_public: Some(true),
            ..Default::default()
        }
        .apply(&mut c)
        .unwrap();
        assert!(!renamed);
        assert!(c.is_public);

        let renamed = UpdateCollectionRequest {
            name: Some("Later".to_string()),
            ..Default::default()
        }
        .apply(&mut c)
        .unwrap();
        assert!(renamed);
        assert_eq!(c.name, "Later");
    }

    #[test]
    fn test_pagination_pages() {
        assert_eq!(Pagination::new(PageRequest::new(1, 20), 0).pages, 0);
        assert_eq!(Pagination::new(PageRequest::new(1, 20), 41).pages, 3);
        assert_eq!(Pagination::new(PageRequest::new(2, 10), 10).pages, 1);
    }

    #[test]
    fn test_search_view_is_camel_case() {
        let record = SearchRecord::new(
            "u".to_string(),
            "q".to_string(),
            "a".to_string(),
            vec![],
            Focus::News,
            Some("c1".to_string()),
            12,
            3,
        );
        let json = serde_json::to_value(SearchView::from(record)).unwrap();
        assert_eq!(json["conversationId"], "c1");
        assert_eq!(json["isBookmarked"], false);
        assert_eq!(json["focus"], "news");
        assert_eq!(json["metadata"]["processingTimeMs"], 12);
        assert_eq!(json["metadata"]["sourceCount"], 0);
        assert!(json["createdAt"].as_str().unwrap().contains('T'));
    }
}

use axum::{Json, extract::State, http::StatusCode};
use mongodb::bson::oid::ObjectId;
use serde_json::{Value, json};

use crate::auth::AuthUser;
use crate::data_models::{Collection, SearchRecord};
use crate::error::{AppError, Result};
use crate::store::{CollectionStore, DuplicateCollectionName, HistoryFilter, SearchStore};

use super::models::{
    AddSearchRequest, CollectionDetail, CollectionEnvelope, CollectionList, CollectionView,
    CreateCollectionRequest, HistoryQuery, Pagination, SearchEnvelope, SearchList, SearchPage,
    SearchRequest, SearchView, UpdateCollectionRequest, parse_object_id,
};
use super::{ApiJson, ApiPath, ApiQuery, AppState};

async fn owned_search(store: &dyn SearchStore, id: ObjectId, user_id: &str) -> Result<SearchRecord> {
    match store.find_by_id(id).await? {
        None => Err(AppError::NotFound("Search".to_string())),
        Some(r) if r.user_id != user_id => Err(AppError::Forbidden(
            "Search belongs to another user".to_string(),
        )),
        Some(r) => Ok(r),
    }
}

async fn owned_collection(
    store: &dyn CollectionStore,
    id: ObjectId,
    user_id: &str,
) -> Result<Collection> {
    match store.find_by_id(id).await? {
        None => Err(AppError::NotFound("Collection".to_string())),
        Some(c) if c.user_id != user_id => Err(AppError::Forbidden(
            "Collection belongs to another user".to_string(),
        )),
        Some(c) => Ok(c),
    }
}

/// A name collision that slipped past `name_taken` (concurrent writes) is
/// still a client error.
pub(crate) fn collection_write_error(err: anyhow::Error) -> AppError {
    match err.downcast::<DuplicateCollectionName>() {
        Ok(dup) => dup.into(),
        Err(err) => AppError::Internal(err),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Searches
// =============================================================================

pub async fn create_search(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<(StatusCode, Json<SearchEnvelope>)> {
    let query = request.validate()?;
    let record = state.orchestrator.run(&user.user_id, query).await?;
    Ok((
        StatusCode::CREATED,
        Json(SearchEnvelope {
            search: record.into(),
        }),
    ))
}

async fn search_page(
    state: &AppState,
    user_id: &str,
    query: &HistoryQuery,
    filter: HistoryFilter,
) -> Result<Json<SearchPage>> {
    let page = query.page_request();
    let (records, total) = state.searches.list_for_user(user_id, filter, page).await?;
    Ok(Json(SearchPage {
        searches: records.into_iter().map(SearchView::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<SearchPage>> {
    let filter = HistoryFilter {
        bookmarked_only: query.bookmarked.unwrap_or(false),
    };
    search_page(&state, &user.user_id, &query, filter).await
}

pub async fn bookmarks(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<SearchPage>> {
    let filter = HistoryFilter {
        bookmarked_only: true,
    };
    search_page(&state, &user.user_id, &query, filter).await
}

pub async fn clear_history(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>> {
    let deleted = state.searches.delete_for_user(&user.user_id).await?;
    let pulled = state
        .collections
        .remove_search_refs(&user.user_id, &deleted)
        .await?;
    tracing::info!(user = %user.user_id, deleted = deleted.len(), pulled, "history cleared");
    Ok(Json(json!({ "deleted": deleted.len() })))
}

pub async fn conversation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(conversation_id): ApiPath<String>,
) -> Result<Json<SearchList>> {
    let records = state
        .searches
        .list_conversation(&user.user_id, &conversation_id)
        .await?;
    Ok(Json(SearchList {
        searches: records.into_iter().map(SearchView::from).collect(),
    }))
}

pub async fn get_search(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<SearchEnvelope>> {
    let id = parse_object_id(&id, "search")?;
    let record = owned_search(state.searches.as_ref(), id, &user.user_id).await?;
    Ok(Json(SearchEnvelope {
        search: record.into(),
    }))
}

pub async fn toggle_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<SearchEnvelope>> {
    let id = parse_object_id(&id, "search")?;
    let record = owned_search(state.searches.as_ref(), id, &user.user_id).await?;
    state.searches.set_bookmark(id, !record.is_bookmarked).await?;
    let record = state
        .searches
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Search".to_string()))?;
    Ok(Json(SearchEnvelope {
        search: record.into(),
    }))
}

pub async fn delete_search(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id, "search")?;
    owned_search(state.searches.as_ref(), id, &user.user_id).await?;
    state.searches.delete(id).await?;
    state
        .collections
        .remove_search_refs(&user.user_id, &[id])
        .await?;
    Ok(Json(json!({ "deleted": true })))
}

// =============================================================================
// Collections
// =============================================================================

pub async fn list_collections(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CollectionList>> {
    let collections = state.collections.list_for_user(&user.user_id).await?;
    Ok(Json(CollectionList {
        collections: collections.into_iter().map(CollectionView::from).collect(),
    }))
}

pub async fn create_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CollectionEnvelope>)> {
    let collection = request.into_collection(&user.user_id)?;
    if state
        .collections
        .name_taken(&user.user_id, &collection.name, None)
        .await?
    {
        return Err(DuplicateCollectionName(collection.name).into());
    }
    state
        .collections
        .insert(&collection)
        .await
        .map_err(collection_write_error)?;
    Ok((
        StatusCode::CREATED,
        Json(CollectionEnvelope {
            collection: collection.into(),
        }),
    ))
}

pub async fn get_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<CollectionDetail>> {
    let id = parse_object_id(&id, "collection")?;
    let collection = owned_collection(state.collections.as_ref(), id, &user.user_id).await?;
    let searches = state
        .searches
        .find_many(&collection.search_ids)
        .await?
        .into_iter()
        .filter(|r| r.user_id == user.user_id)
        .map(SearchView::from)
        .collect();
    Ok(Json(CollectionDetail {
        collection: collection.into(),
        searches,
    }))
}

pub async fn update_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateCollectionRequest>,
) -> Result<Json<CollectionEnvelope>> {
    let id = parse_object_id(&id, "collection")?;
    let mut collection = owned_collection(state.collections.as_ref(), id, &user.user_id).await?;
    let renamed = request.apply(&mut collection)?;
    if renamed
        && state
            .collections
            .name_taken(&user.user_id, &collection.name, Some(id))
            .await?
    {
        return Err(DuplicateCollectionName(collection.name).into());
    }
    state
        .collections
        .replace(&collection)
        .await
        .map_err(collection_write_error)?;
    Ok(Json(CollectionEnvelope {
        collection: collection.into(),
    }))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Value>> {
    let id = parse_object_id(&id, "collection")?;
    owned_collection(state.collections.as_ref(), id, &user.user_id).await?;
    state.collections.delete(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn reload_collection(state: &AppState, id: ObjectId) -> Result<Json<CollectionEnvelope>> {
    let collection = state
        .collections
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Collection".to_string()))?;
    Ok(Json(CollectionEnvelope {
        collection: collection.into(),
    }))
}

pub async fn add_to_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<AddSearchRequest>,
) -> Result<Json<CollectionEnvelope>> {
    let id = parse_object_id(&id, "collection")?;
    let search_id = parse_object_id(&request.search_id, "search")?;
    owned_collection(state.collections.as_ref(), id, &user.user_id).await?;
    owned_search(state.searches.as_ref(), search_id, &user.user_id).await?;
    state.collections.add_search(id, search_id).await?;
    reload_collection(&state, id).await
}

pub async fn remove_from_collection(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, search_id)): ApiPath<(String, String)>,
) -> Result<Json<CollectionEnvelope>> {
    let id = parse_object_id(&id, "collection")?;
    let search_id = parse_object_id(&search_id, "search")?;
    owned_collection(state.collections.as_ref(), id, &user.user_id).await?;
    state.collections.remove_search(id, search_id).await?;
    reload_collection(&state, id).await
}

use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, FromRequest, FromRequestParts},
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::JwtAuth;
use crate::error::AppError;
use crate::orchestrator::SearchOrchestrator;
use crate::store::{CollectionStore, SearchStore};

pub mod handlers;
pub mod models;


#[derive(Clone, FromRef)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub searches: Arc<dyn SearchStore>,
    pub collections: Arc<dyn CollectionStore>,
    pub auth: Arc<JwtAuth>,
}

/// JSON body whose rejections render as [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search", post(handlers::create_search))
        .route(
            "/api/search/history",
            get(handlers::history).delete(handlers::clear_history),
        )
        .route("/api/search/bookmarks", get(handlers::bookmarks))
        .route(
            "/api/search/conversation/:conversation_id",
            get(handlers::conversation),
        )
        .route(
            "/api/search/:id",
            get(handlers::get_search).delete(handlers::delete_search),
        )
        .route("/api/search/:id/bookmark", patch(handlers::toggle_bookmark))
        .route(
            "/api/collections",
            get(handlers::list_collections).post(handlers::create_collection),
        )
        .route(
            "/api/collections/:id",
            get(handlers::get_collection)
                .put(handlers::update_collection)
                .delete(handlers::delete_collection),
        )
        .route(
            "/api/collections/:id/searches",
            post(handlers::add_to_collection),
        )
        .route(
            "/api/collections/:id/searches/:search_id",
            delete(handlers::remove_from_collection),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

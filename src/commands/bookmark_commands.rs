use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::{respond, respond_done, PathQuery};
use crate::data::query::BookmarkQuery;
use crate::error::AppError;
use crate::models::bookmark::{
    BookmarkPatch, BookmarkUpdate, Collection, FileType, NewBookmark, DEFAULT_CATEGORY,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BookmarksQuery {
    pub collection: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagQuery {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub collection: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookmarkRequest {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub collection: Collection,
    pub category: Option<String>,
}

fn parse_collection(name: &str) -> Result<Collection, AppError> {
    name.parse().map_err(AppError::General)
}

/// Bookmarks of one collection with live stats; stale ones are dropped.
pub async fn get_collection(
    State(state): State<AppState>,
    Query(CollectionQuery { name }): Query<CollectionQuery>,
) -> Response {
    let result = match parse_collection(&name) {
        Ok(collection) => state.mutations.get_collection(collection, &state.user).await,
        Err(e) => Err(e),
    };
    respond(result, StatusCode::OK)
}

pub async fn replace_bookmarks(
    State(state): State<AppState>,
    Json(update): Json<BookmarkUpdate>,
) -> Response {
    respond(state.bookmarks.update(&state.user, update).await, StatusCode::OK)
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Json(request): Json<CreateBookmarkRequest>,
) -> Response {
    let new = NewBookmark {
        path: request.path,
        file_type: request.file_type,
        user: state.user.clone(),
        collection: request.collection,
        category: request
            .category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
    };
    respond(state.bookmarks.create(new).await, StatusCode::OK)
}

pub async fn patch_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<BookmarkPatch>,
) -> Response {
    respond(
        state.bookmarks.patch(&id, &state.user, patch).await,
        StatusCode::OK,
    )
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    Query(TagQuery {
        path,
        collection,
        category,
    }): Query<TagQuery>,
) -> Response {
    let category = category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let result = match parse_collection(&collection) {
        Ok(collection) => {
            state
                .bookmarks
                .remove(&path, collection, &category, &state.user)
                .await
        }
        Err(e) => Err(e),
    };
    respond_done(result, StatusCode::OK)
}

pub async fn remove_bookmark_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    respond_done(
        state.bookmarks.remove_by_id(&id, &state.user).await,
        StatusCode::OK,
    )
}

pub async fn get_path_markers(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    respond(
        state.bookmarks.list_by_path(&path, &state.user).await,
        StatusCode::OK,
    )
}

pub async fn query_bookmarks(
    State(state): State<AppState>,
    Query(BookmarksQuery {
        collection,
        category,
    }): Query<BookmarksQuery>,
) -> Response {
    let mut query = BookmarkQuery::new().user(state.user.as_str());
    if let Some(collection) = collection.filter(|c| !c.is_empty()) {
        match parse_collection(&collection) {
            Ok(collection) => query = query.collection(collection),
            Err(e) => return respond::<()>(Err(e), StatusCode::OK),
        }
    }
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        query = query.category(category);
    }
    respond(state.bookmarks.query(query).await, StatusCode::OK)
}

pub async fn get_categories(State(state): State<AppState>) -> Response {
    respond(
        state.bookmarks.list_categories(&state.user).await,
        StatusCode::OK,
    )
}

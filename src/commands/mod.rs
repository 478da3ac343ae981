//! HTTP adapter: routes, query structs, and the `{success, data,
//! errorMessage}` envelope every endpoint answers with.

pub mod bookmark_commands;
pub mod file_commands;

use std::time::Instant;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Errors become `success: false` with `failure_status`; most endpoints
/// answer 200 either way.
pub(crate) fn respond<T: Serialize>(
    result: Result<T, AppError>,
    failure_status: StatusCode,
) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => failure(failure_status, e.to_string()),
    }
}

pub(crate) fn respond_done(result: Result<(), AppError>, failure_status: StatusCode) -> Response {
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::<()> {
                success: true,
                data: None,
                error_message: None,
            }),
        )
            .into_response(),
        Err(e) => failure(failure_status, e.to_string()),
    }
}

pub(crate) fn failure(status: StatusCode, message: String) -> Response {
    log::warn!("request failed: {message}");
    (status, Json(ApiResponse::<()>::fail(message))).into_response()
}

async fn log_request(request: Request<Body>, next: middleware::Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{method} {uri} -> {} ({} ms)",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    let api = Router::new()
        .route("/file", get(file_commands::download_file))
        .route("/fileList", get(file_commands::list_directory))
        .route(
            "/folder",
            get(file_commands::get_folder).put(file_commands::create_directory),
        )
        .route("/plain", put(file_commands::put_plain))
        .route("/files", put(file_commands::upload_files))
        .route("/copy", post(file_commands::copy_path))
        .route("/move", post(file_commands::move_path))
        .route("/path", axum::routing::delete(file_commands::delete_path))
        .route("/collection", get(bookmark_commands::get_collection))
        .route(
            "/bookmark",
            put(bookmark_commands::replace_bookmarks)
                .post(bookmark_commands::create_bookmark)
                .delete(bookmark_commands::remove_bookmark),
        )
        .route(
            "/bookmark/{id}",
            patch(bookmark_commands::patch_bookmark).delete(bookmark_commands::remove_bookmark_by_id),
        )
        .route("/pathmarkers", get(bookmark_commands::get_path_markers))
        .route("/bookmarks", get(bookmark_commands::query_bookmarks))
        .route("/categories", get(bookmark_commands::get_categories));

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": [1, 2]}));

        let fail = serde_json::to_value(ApiResponse::<()>::fail("nope")).unwrap();
        assert_eq!(
            fail,
            serde_json::json!({"success": false, "errorMessage": "nope"})
        );
    }

    #[tokio::test]
    async fn respond_keeps_200_for_errors_unless_told_otherwise() {
        let response = respond::<()>(
            Err(AppError::NotFound("x".into())),
            StatusCode::OK,
        );
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorMessage"], "Not found: x");

        let response = respond_done(
            Err(AppError::AlreadyExists("x".into())),
            StatusCode::EXPECTATION_FAILED,
        );
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    }

    #[test]
    fn router_builds() {
        let (_dir, state) = AppState::for_tests();
        let _router = router(state);
    }
}

use axum::body::{Body, Bytes};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::{failure, respond, respond_done, PathQuery};
use crate::error::AppError;
use crate::scope_path;
use crate::services::file_service::IncomingFile;
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct CopyQuery {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub rename: bool,
}

pub async fn download_file(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    let file = match state.files.read(&path).await {
        Ok(file) => file,
        Err(e) => return failure(StatusCode::OK, e.to_string()),
    };

    let name = scope_path::basename(&path).replace('"', "'");
    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    let disposition = HeaderValue::from_bytes(format!("attachment; filename=\"{name}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

pub async fn list_directory(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    respond(state.files.list(&path).await, StatusCode::OK)
}

pub async fn get_folder(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    respond(state.files.folder(&path).await, StatusCode::OK)
}

/// Empty body creates the file; otherwise the existing file is overwritten.
pub async fn put_plain(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
    body: Bytes,
) -> Response {
    let result = if body.is_empty() {
        state.files.create_file(&path).await
    } else {
        state.files.write(&path, &body).await
    };
    respond(result, StatusCode::OK)
}

pub async fn create_directory(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    respond(state.files.create_directory(&path).await, StatusCode::OK)
}

/// Writes one multipart field to a temporary file chunk by chunk, so the
/// upload never sits in memory as a whole.
async fn spool_field(
    mut field: Field<'_>,
    original_filename: String,
) -> Result<IncomingFile, AppError> {
    let spooled = tempfile::NamedTempFile::new()?.into_temp_path();
    let mut out = tokio::fs::File::create(&spooled).await?;
    let mut size = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::General(e.to_string()))?
    {
        out.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(IncomingFile {
        original_filename,
        spooled,
        size,
    })
}

async fn read_upload_fields(multipart: &mut Multipart) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::General(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        files.push(spool_field(field, original_filename).await?);
    }
    Ok(files)
}

pub async fn upload_files(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
    mut multipart: Multipart,
) -> Response {
    let files = match read_upload_fields(&mut multipart).await {
        Ok(files) => files,
        Err(e) => return failure(StatusCode::EXPECTATION_FAILED, e.to_string()),
    };
    if files.is_empty() {
        return failure(StatusCode::OK, "No file found".to_string());
    }
    respond(
        state.files.upload_all(&path, files).await,
        StatusCode::EXPECTATION_FAILED,
    )
}

pub async fn copy_path(
    State(state): State<AppState>,
    Query(CopyQuery { source, target }): Query<CopyQuery>,
) -> Response {
    respond(
        state.files.copy(&source, &target).await,
        StatusCode::EXPECTATION_FAILED,
    )
}

pub async fn move_path(
    State(state): State<AppState>,
    Query(MoveQuery {
        source,
        target,
        rename,
    }): Query<MoveQuery>,
) -> Response {
    respond(
        state
            .mutations
            .move_path(&source, &target, rename, &state.user)
            .await,
        StatusCode::EXPECTATION_FAILED,
    )
}

pub async fn delete_path(
    State(state): State<AppState>,
    Query(PathQuery { path }): Query<PathQuery>,
) -> Response {
    respond_done(
        state.mutations.delete_path(&path, &state.user).await,
        StatusCode::EXPECTATION_FAILED,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::body_json;
    use axum::extract::FromRequest;
    use axum::http::Request;

    fn path(p: &str) -> Query<PathQuery> {
        Query(PathQuery {
            path: p.to_string(),
        })
    }

    #[tokio::test]
    async fn test_put_plain_creates_then_overwrites() {
        let (dir, state) = AppState::for_tests();

        let response = put_plain(State(state.clone()), path("notes.txt"), Bytes::new()).await;
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["isFile"], true);
        assert_eq!(body["data"]["size"], 0);

        let response = put_plain(State(state.clone()), path("notes.txt"), Bytes::from("hello")).await;
        let body = body_json(response).await;
        assert_eq!(body["data"]["size"], 5);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "hello");

        let response = put_plain(State(state), path("missing.txt"), Bytes::from("x")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_list_and_folder_endpoints() {
        let (_dir, state) = AppState::for_tests();
        create_directory(State(state.clone()), path("music")).await;
        put_plain(State(state.clone()), path("music/a.mp3"), Bytes::new()).await;

        let body = body_json(list_directory(State(state.clone()), path("")).await).await;
        assert_eq!(body["data"][0]["name"], "music");
        assert_eq!(body["data"][0]["isDirectory"], true);

        let body = body_json(get_folder(State(state.clone()), path("music")).await).await;
        assert_eq!(body["data"]["name"], "music");
        assert_eq!(body["data"]["children"][0]["name"], "a.mp3");
        assert_eq!(body["data"]["children"][0]["parent"], "music");

        let response = list_directory(State(state), path("../")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["errorMessage"].as_str().unwrap().contains("No permission"));
    }

    #[tokio::test]
    async fn test_download_sets_filename() {
        let (dir, state) = AppState::for_tests();
        std::fs::write(dir.path().join("report.txt"), "contents").unwrap();

        let response = download_file(State(state), path("report.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"report.txt\""
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"contents");
    }

    #[tokio::test]
    async fn test_copy_failure_uses_expectation_failed() {
        let (_dir, state) = AppState::for_tests();
        let response = copy_path(
            State(state),
            Query(CopyQuery {
                source: "nope.txt".to_string(),
                target: "".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    }

    #[tokio::test]
    async fn test_move_with_rename_carries_bookmarks() {
        let (_dir, state) = AppState::for_tests();
        put_plain(State(state.clone()), path("a.txt"), Bytes::new()).await;
        state
            .bookmarks
            .create(crate::models::bookmark::NewBookmark {
                path: "a.txt".to_string(),
                file_type: crate::models::bookmark::FileType::File,
                user: state.user.clone(),
                collection: crate::models::bookmark::Collection::Star,
                category: "default".to_string(),
            })
            .await
            .unwrap();

        let response = move_path(
            State(state.clone()),
            Query(MoveQuery {
                source: "a.txt".to_string(),
                target: "b.txt".to_string(),
                rename: true,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.bookmarks.list_by_path("b.txt", &state.user).await.unwrap().len(),
            1
        );

        let response = delete_path(State(state.clone()), path("b.txt")).await;
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));
        assert!(state
            .bookmarks
            .list_by_path("b.txt", &state.user)
            .await
            .unwrap()
            .is_empty());
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let boundary = "X-FILEDOCK-BOUNDARY";
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n"
                )),
            }
            body.push_str(&format!("\r\n{content}\r\n"));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Request::builder()
            .method("PUT")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_files() {
        let (dir, state) = AppState::for_tests();
        let request = multipart_request(&[
            ("file", Some("one.txt"), "1"),
            ("note", None, "ignored"),
            ("file", Some("two.txt"), "22"),
        ]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = upload_files(State(state), path(""), multipart).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
        assert_eq!(std::fs::read_to_string(dir.path().join("one.txt")).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(dir.path().join("two.txt")).unwrap(), "22");
    }

    #[tokio::test]
    async fn test_partial_upload_failure_uses_expectation_failed() {
        let (dir, state) = AppState::for_tests();
        let request = multipart_request(&[
            ("file", Some("kept.txt"), "ok"),
            ("file", Some(".."), "bad"),
        ]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = upload_files(State(state), path(""), multipart).await;
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorMessage"], "Failed to upload some files (1 of 2)");
        assert_eq!(std::fs::read_to_string(dir.path().join("kept.txt")).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_failed_move_and_delete_use_expectation_failed() {
        let (_dir, state) = AppState::for_tests();
        put_plain(State(state.clone()), path("a.txt"), Bytes::new()).await;
        put_plain(State(state.clone()), path("b.txt"), Bytes::new()).await;

        let response = move_path(
            State(state.clone()),
            Query(MoveQuery {
                source: "a.txt".to_string(),
                target: "b.txt".to_string(),
                rename: true,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
        assert!(body_json(response).await["errorMessage"]
            .as_str()
            .unwrap()
            .contains("Already exists"));

        let response = delete_path(State(state.clone()), path("missing.txt")).await;
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
        assert_eq!(body_json(response).await["success"], false);

        let response = delete_path(State(state), path("../a.txt")).await;
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (_dir, state) = AppState::for_tests();
        let request = multipart_request(&[("note", None, "hi")]);
        let multipart = Multipart::from_request(request, &()).await.unwrap();

        let response = upload_files(State(state), path(""), multipart).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorMessage"], "No file found");
    }
}

//! HTTP handlers for board CRUD and attachment download.
//! Multipart file parts are streamed straight to disk; any upload whose board
//! write fails is discarded again.

use crate::{
    errors::AppError,
    models::{
        board::{Attachment, BoardFields, BoardStatus, BoardView},
        user::CurrentUser,
    },
    services::{attachment_service::AttachmentService, board_service::BoardError},
    state::AppState,
};
use axum::{
    Extension, Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// RFC 5987 `attr-char` minus alphanumerics; everything else is escaped.
const FILENAME_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!');

/// Body of `PATCH /boards/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateReq {
    pub status: String,
}

#[derive(Default)]
struct BoardForm {
    title: Option<String>,
    description: Option<String>,
    upload: Option<Attachment>,
}

/// GET `/boards`: boards owned by the caller, oldest first.
pub async fn list_boards(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<BoardView>>, AppError> {
    debug!("user {} listing boards", user.username);
    let boards = state.boards.list_for_owner(&user).await?;
    Ok(Json(boards.into_iter().map(BoardView::from).collect()))
}

/// GET `/boards/{id}`
pub async fn get_board(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BoardView>, AppError> {
    let Path(id) = path?;
    let board = state.boards.get_by_id(id).await?;
    Ok(Json(board.into()))
}

/// POST `/boards`: multipart `title`, `description`, optional `file`.
pub async fn create_board(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (fields, upload) = read_board_form(&state.attachments, multipart?).await?;
    info!(
        "user {} creating board `{}`{}",
        user.username,
        fields.title(),
        if upload.is_some() { " with attachment" } else { "" }
    );

    let board = state
        .attachments
        .create_board(&fields, &user, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(BoardView::from(board))))
}

/// PATCH `/boards/{id}/status`: body `{ "status": "PUBLIC" | "PRIVATE" }`.
pub async fn update_board_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusUpdateReq>, JsonRejection>,
) -> Result<Json<BoardView>, AppError> {
    let Path(id) = path?;
    let Json(req) = payload?;
    let status: BoardStatus = req.status.parse().map_err(AppError::bad_request)?;

    info!("user {} setting board {} to {}", user.username, id, status);
    let board = state.boards.update_status(id, status, &user).await?;
    Ok(Json(board.into()))
}

/// PATCH `/boards/{id}`: multipart update, optionally replacing the file.
pub async fn update_board(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BoardView>, AppError> {
    let Path(id) = path?;
    let (fields, upload) = read_board_form(&state.attachments, multipart?).await?;
    info!("user {} updating board {}", user.username, id);

    let board = state
        .attachments
        .update_board(id, &fields, &user, upload)
        .await?;
    Ok(Json(board.into()))
}

/// DELETE `/boards/{id}`: owner only; removes the stored file too.
pub async fn delete_board(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = path?;
    state.attachments.delete_board(id, &user).await?;
    info!("user {} deleted board {}", user.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/boards/files/{board_id}`: stream the attachment under its
/// original name.
pub async fn download_file(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let Path(board_id) = path?;
    let (att, file, len) = state.attachments.open_download(board_id).await?;
    let disposition = HeaderValue::from_str(&content_disposition(&att.display_name))
        .map_err(|_| AppError::internal("invalid attachment name"))?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

fn content_disposition(display_name: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(display_name, FILENAME_ESCAPE)
    )
}

/// Collect and validate a board form, discarding a stored upload if the
/// form turns out to be unusable.
async fn read_board_form(
    attachments: &AttachmentService,
    mut multipart: Multipart,
) -> Result<(BoardFields, Option<Attachment>), AppError> {
    let mut form = BoardForm::default();

    let outcome = match collect_form(attachments, &mut multipart, &mut form).await {
        Ok(()) => BoardFields::new(form.title.take(), form.description.take())
            .map_err(AppError::bad_request),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(fields) => Ok((fields, form.upload)),
        Err(err) => {
            if let Some(upload) = &form.upload {
                attachments.discard(upload).await;
            }
            Err(err)
        }
    }
}

async fn collect_form(
    attachments: &AttachmentService,
    multipart: &mut Multipart,
    form: &mut BoardForm,
) -> Result<(), AppError> {
    let limit = attachments.max_upload_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| upload_error(err, limit))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => {
                form.title = Some(field.text().await.map_err(|err| upload_error(err, limit))?);
            }
            Some("description") => {
                form.description =
                    Some(field.text().await.map_err(|err| upload_error(err, limit))?);
            }
            Some("file") => {
                // Browsers send an empty, unnamed part when no file was picked.
                let file_name = field.file_name().map(str::to_owned).unwrap_or_default();
                if file_name.is_empty() {
                    continue;
                }
                if form.upload.is_some() {
                    return Err(AppError::bad_request("only one file may be attached"));
                }
                let chunks = field.map(move |chunk| chunk.map_err(|err| upload_error(err, limit)));
                form.upload = Some(attachments.store_upload(&file_name, chunks).await?);
            }
            _ => {}
        }
    }

    Ok(())
}

fn upload_error(err: MultipartError, limit: usize) -> BoardError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        BoardError::PayloadTooLarge(limit)
    } else {
        BoardError::MalformedUpload(err.body_text())
    }
}

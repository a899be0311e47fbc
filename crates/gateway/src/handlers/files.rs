//! File transfer handlers.
//!
//! Each handler translates one REST call into a FileService RPC. Upload
//! and download stay streaming end to end: the multipart body is fed into
//! the upload RPC as it arrives, and download fragments flow into the
//! response body through a bounded chunk pipe, so neither direction ever
//! buffers a whole file in the gateway.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Extension, Multipart, Query, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use ferry_core::{FileInfo, PIPE_DEPTH, TransferError, chunk_pipe};
use ferry_proto::v1::{DownloadFileRequest, ListFilesRequest, RemoveFileRequest, UploadFileRequest};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

/// Multipart field carrying the destination path.
const FIELD_FILE_PATH: &str = "filePath";
/// Multipart field carrying the file content.
const FIELD_FILE: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Prefix to list under; empty lists the namespace root.
    #[serde(rename = "filePath", default)]
    pub file_path: String,
}

/// Body of a remove request. A `userID` field is accepted for
/// compatibility but ignored; the authenticated identity decides.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// POST /api/v1/files/upload
///
/// Multipart upload. `filePath` must precede the `file` part so that the
/// transfer header can be sent before any content. Other text fields
/// (`userID` in particular) are accepted and ignored: the authenticated
/// identity decides the namespace.
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file_path: Option<String> = None;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?;
        let Some(mut field) = field else {
            return Err(ApiError::BadRequest("missing file part".to_string()));
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FIELD_FILE_PATH) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("invalid filePath field: {e}")))?;
                if value.is_empty() {
                    return Err(ApiError::BadRequest("empty filePath".to_string()));
                }
                file_path = Some(value);
            }
            Some(FIELD_FILE) => {
                let Some(file_path) = file_path else {
                    return Err(ApiError::BadRequest(
                        "filePath field must precede the file part".to_string(),
                    ));
                };

                let (tx, rx) = tokio::sync::mpsc::channel(PIPE_DEPTH);
                let mut files = state.files.clone();

                let rpc = async move {
                    files
                        .upload_file(ReceiverStream::new(rx))
                        .await
                        .map_err(ApiError::from)
                };

                let header_user = user.user_id.clone();
                let header_path = file_path.clone();
                // feed owns the sender so the request stream closes once
                // the multipart part is exhausted.
                let feed = async move {
                    let header = UploadFileRequest {
                        user_id: header_user,
                        file_path: header_path,
                        content: Vec::new(),
                    };
                    if tx.send(header).await.is_err() {
                        // RPC side ended; its error is the one to report.
                        return Ok(());
                    }

                    loop {
                        match field.chunk().await {
                            Ok(Some(chunk)) => {
                                let msg = UploadFileRequest {
                                    user_id: String::new(),
                                    file_path: String::new(),
                                    content: chunk.to_vec(),
                                };
                                if tx.send(msg).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Ok(None) => return Ok::<_, ApiError>(()),
                            Err(e) => {
                                return Err(ApiError::BadRequest(format!(
                                    "multipart read failed: {e}"
                                )));
                            }
                        }
                    }
                };

                // A body read error cancels the RPC, which the file server
                // observes as a failed stream and aborts the upload.
                let (response, ()) = tokio::try_join!(rpc, feed)?;

                tracing::info!(
                    user_id = %user.user_id,
                    file_path = %file_path,
                    "upload relayed"
                );
                return Ok(Json(UploadResponse {
                    success: response.into_inner().success,
                    file_path,
                }));
            }
            _ => {
                // Unrecognized fields (userID among them) are drained and
                // ignored.
                let _ = field.bytes().await;
            }
        }
    }
}

/// GET /api/v1/files/download?filePath=...
///
/// The first upstream message is awaited before the response starts, so a
/// missing file becomes a clean 404 instead of a broken 200 body.
pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    if params.file_path.is_empty() {
        return Err(ApiError::BadRequest("empty filePath".to_string()));
    }

    let mut files = state.files.clone();
    let mut stream = files
        .download_file(DownloadFileRequest {
            user_id: user.user_id.clone(),
            file_path: params.file_path.clone(),
        })
        .await
        .map_err(ApiError::from)?
        .into_inner();

    let first = stream.message().await.map_err(ApiError::from)?;

    let (mut writer, reader) = chunk_pipe(PIPE_DEPTH);
    tokio::spawn(async move {
        let mut next = first;
        loop {
            match next {
                Some(msg) => {
                    if msg.success {
                        writer.close();
                        return;
                    }
                    if writer.write(Bytes::from(msg.content)).await.is_err() {
                        // Client hung up; dropping the gRPC stream cancels
                        // the upstream pump.
                        return;
                    }
                }
                None => {
                    writer
                        .abort(TransferError::StreamReceiveFailed(
                            "download ended without completion marker".to_string(),
                        ))
                        .await;
                    return;
                }
            }
            next = match stream.message().await {
                Ok(msg) => msg,
                Err(status) => {
                    writer
                        .abort(TransferError::StreamReceiveFailed(status.to_string()))
                        .await;
                    return;
                }
            };
        }
    });

    let filename: String = params
        .file_path
        .rsplit('/')
        .next()
        .unwrap_or(&params.file_path)
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .filter(|c| *c != '"')
        .collect();

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from_stream(reader))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// GET /api/v1/files/ls?filePath=...
pub async fn ls(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ListResponse>> {
    let mut files = state.files.clone();
    let listed = files
        .list_files(ListFilesRequest {
            user_id: user.user_id.clone(),
            file_path: params.file_path,
        })
        .await
        .map_err(ApiError::from)?
        .into_inner();

    let files = listed
        .files
        .into_iter()
        .map(|f| {
            let last_modified = f
                .last_modified
                .and_then(|ts| {
                    time::OffsetDateTime::from_unix_timestamp(ts.seconds)
                        .map(|dt| dt + time::Duration::nanoseconds(ts.nanos as i64))
                        .ok()
                })
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
            FileInfo {
                name: f.name,
                size: f.size.max(0) as u64,
                last_modified,
            }
        })
        .collect();

    Ok(Json(ListResponse { files }))
}

/// DELETE /api/v1/files/rm with JSON body `{"filePath": ...}`.
pub async fn rm(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(params): Json<RemoveRequest>,
) -> ApiResult<Json<RemoveResponse>> {
    if params.file_path.is_empty() {
        return Err(ApiError::BadRequest("empty filePath".to_string()));
    }

    let mut files = state.files.clone();
    let removed = files
        .remove_file(RemoveFileRequest {
            user_id: user.user_id.clone(),
            file_path: params.file_path.clone(),
        })
        .await
        .map_err(ApiError::from)?
        .into_inner();

    tracing::info!(
        user_id = %user.user_id,
        file_path = %params.file_path,
        "file removed"
    );
    Ok(Json(RemoveResponse {
        success: removed.success,
    }))
}

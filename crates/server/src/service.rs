//! gRPC surface of the file server.

use crate::relay;
use bytes::Bytes;
use ferry_core::{PIPE_DEPTH, TransferError, TransferHeader};
use ferry_proto::v1::file_service_server::FileService;
use ferry_proto::v1::{
    DownloadFileRequest, DownloadFileResponse, FileInfo, ListFilesRequest, ListFilesResponse,
    RegisterUserRequest, RegisterUserResponse, RemoveFileRequest, RemoveFileResponse,
    UploadFileRequest, UploadFileResponse,
};
use ferry_storage::ObjectStore;
use futures::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

/// File relay service backed by an object store.
pub struct FileRelayService {
    storage: Arc<dyn ObjectStore>,
}

impl FileRelayService {
    pub fn new(storage: Arc<dyn ObjectStore>) -> Self {
        Self { storage }
    }
}

/// Map a transfer error onto its gRPC status.
fn status_for(err: TransferError) -> Status {
    match err {
        TransferError::InvalidHeader(_) => Status::invalid_argument(err.to_string()),
        TransferError::ObjectNotFound(_) => Status::not_found(err.to_string()),
        TransferError::Unauthorized(_) => Status::unauthenticated(err.to_string()),
        TransferError::Cancelled(_) => Status::cancelled(err.to_string()),
        TransferError::StreamReceiveFailed(_)
        | TransferError::StreamSendFailed(_)
        | TransferError::ClosedPipe => Status::aborted(err.to_string()),
        TransferError::StorageWriteFailed(_) | TransferError::StorageReadFailed(_) => {
            Status::internal(err.to_string())
        }
    }
}

fn timestamp_from(dt: time::OffsetDateTime) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.unix_timestamp(),
        nanos: dt.nanosecond() as i32,
    }
}

#[tonic::async_trait]
impl FileService for FileRelayService {
    async fn register_user(
        &self,
        request: Request<RegisterUserRequest>,
    ) -> Result<Response<RegisterUserResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() {
            return Err(Status::invalid_argument("empty user_id"));
        }

        self.storage
            .ensure_namespace(&req.user_id)
            .await
            .map_err(|e| status_for(e.into_write_error()))?;

        tracing::info!(user_id = %req.user_id, "user namespace provisioned");
        Ok(Response::new(RegisterUserResponse { success: true }))
    }

    async fn upload_file(
        &self,
        request: Request<Streaming<UploadFileRequest>>,
    ) -> Result<Response<UploadFileResponse>, Status> {
        let mut stream = request.into_inner();

        // First message: header only, no content allowed
        let first = stream
            .message()
            .await
            .map_err(|e| status_for(TransferError::StreamReceiveFailed(e.to_string())))?
            .ok_or_else(|| Status::invalid_argument("upload stream closed before header"))?;

        if !first.content.is_empty() {
            return Err(Status::invalid_argument(
                "first upload message must not carry content",
            ));
        }
        let header =
            TransferHeader::new(first.user_id, first.file_path).map_err(status_for)?;

        let chunks = stream.map(|msg| match msg {
            Ok(msg) => Ok(Bytes::from(msg.content)),
            Err(status) => Err(TransferError::StreamReceiveFailed(status.to_string())),
        });

        let written = relay::upload(self.storage.clone(), &header, chunks)
            .await
            .map_err(status_for)?;

        tracing::info!(
            namespace = %header.namespace,
            path = %header.path,
            bytes = written,
            "upload committed"
        );
        Ok(Response::new(UploadFileResponse { success: true }))
    }

    type DownloadFileStream = ReceiverStream<Result<DownloadFileResponse, Status>>;

    async fn download_file(
        &self,
        request: Request<DownloadFileRequest>,
    ) -> Result<Response<Self::DownloadFileStream>, Status> {
        let req = request.into_inner();
        let header = TransferHeader::new(req.user_id, req.file_path).map_err(status_for)?;

        // Opening the read here makes a missing object fail the call itself
        // instead of surfacing after fragments have been sent.
        let mut reader = relay::download(self.storage.clone(), &header)
            .await
            .map_err(status_for)?;

        let (tx, rx) = tokio::sync::mpsc::channel(PIPE_DEPTH);
        tokio::spawn(async move {
            loop {
                match reader.next().await {
                    Some(Ok(chunk)) => {
                        let msg = DownloadFileResponse {
                            content: chunk.to_vec(),
                            success: false,
                        };
                        if tx.send(Ok(msg)).await.is_err() {
                            // Client went away; dropping the reader stops
                            // the storage pump.
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        let _ = tx.send(Err(status_for(err))).await;
                        return;
                    }
                    None => {
                        let marker = DownloadFileResponse {
                            content: Vec::new(),
                            success: true,
                        };
                        let _ = tx.send(Ok(marker)).await;
                        return;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn list_files(
        &self,
        request: Request<ListFilesRequest>,
    ) -> Result<Response<ListFilesResponse>, Status> {
        let req = request.into_inner();
        if req.user_id.is_empty() {
            return Err(Status::invalid_argument("empty user_id"));
        }

        let files = self
            .storage
            .list(&req.user_id, &req.file_path)
            .await
            .map_err(|e| status_for(e.into_read_error()))?;

        let files = files
            .into_iter()
            .map(|f| FileInfo {
                name: f.name,
                size: f.size as i64,
                last_modified: Some(timestamp_from(f.last_modified)),
            })
            .collect();

        Ok(Response::new(ListFilesResponse { files }))
    }

    async fn remove_file(
        &self,
        request: Request<RemoveFileRequest>,
    ) -> Result<Response<RemoveFileResponse>, Status> {
        let req = request.into_inner();
        let header = TransferHeader::new(req.user_id, req.file_path).map_err(status_for)?;

        self.storage
            .delete(&header.namespace, &header.path)
            .await
            .map_err(|e| status_for(e.into_read_error()))?;

        tracing::info!(
            namespace = %header.namespace,
            path = %header.path,
            "object removed"
        );
        Ok(Response::new(RemoveFileResponse { success: true }))
    }
}

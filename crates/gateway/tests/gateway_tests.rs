// Full-stack tests: a real file relay server and a stub auth service are
// bound to ephemeral ports, the gateway router is served over HTTP, and
// requests go through reqwest like a real client.

use ferry_core::config::GatewayConfig;
use ferry_gateway::{AppState, create_router};
use ferry_proto::auth::v1::auth_service_server::{AuthService, AuthServiceServer};
use ferry_proto::auth::v1::{ValidateTokenRequest, ValidateTokenResponse};
use ferry_proto::v1::file_service_server::FileServiceServer;
use ferry_server::FileRelayService;
use ferry_storage::backends::filesystem::FilesystemBackend;
use rand::RngCore;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

const MIB: usize = 1024 * 1024;

/// Accepts "alice-token" and "bob-token", rejects everything else.
struct StubAuth;

#[tonic::async_trait]
impl AuthService for StubAuth {
    async fn validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        let token = request.into_inner().token;
        let response = match token.as_str() {
            "alice-token" => ValidateTokenResponse {
                valid: true,
                user_id: "alice".to_string(),
            },
            "bob-token" => ValidateTokenResponse {
                valid: true,
                user_id: "bob".to_string(),
            },
            _ => ValidateTokenResponse {
                valid: false,
                user_id: String::new(),
            },
        };
        Ok(Response::new(response))
    }
}

async fn spawn_stack() -> (String, TempDir) {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());
    let service = FileRelayService::new(storage);

    let file_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let file_addr = file_listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(FileServiceServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(file_listener))
            .await
            .unwrap();
    });

    let auth_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let auth_addr = auth_listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(AuthServiceServer::new(StubAuth))
            .serve_with_incoming(TcpListenerStream::new(auth_listener))
            .await
            .unwrap();
    });

    let config = GatewayConfig {
        file_service_url: format!("http://{file_addr}"),
        auth_service_url: format!("http://{auth_addr}"),
        ..GatewayConfig::default()
    };
    let state = AppState::connect_lazy(config).unwrap();

    let http_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(http_listener, create_router(state))
            .await
            .unwrap();
    });

    (format!("http://{http_addr}"), temp)
}

async fn upload(
    client: &reqwest::Client,
    base: &str,
    token: &str,
    file_path: &str,
    data: Vec<u8>,
) -> reqwest::Response {
    let form = reqwest::multipart::Form::new()
        .text("filePath", file_path.to_string())
        .part(
            "file",
            reqwest::multipart::Part::bytes(data).file_name("blob"),
        );
    client
        .post(format!("{base}/api/v1/files/upload"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_needs_no_token() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn file_routes_reject_missing_and_invalid_tokens() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/v1/files/ls"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthorized");

    let resp = client
        .get(format!("{base}/api/v1/files/ls"))
        .bearer_auth("stolen-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn upload_download_roundtrip() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let mut data = vec![0u8; 3 * MIB + 517];
    rand::thread_rng().fill_bytes(&mut data);

    let resp = upload(&client, &base, "alice-token", "reports/q3.bin", data.clone()).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["filePath"], "reports/q3.bin");

    let resp = client
        .get(format!("{base}/api/v1/files/download"))
        .query(&[("filePath", "reports/q3.bin")])
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/octet-stream"
    );
    assert_eq!(
        resp.headers()["content-disposition"].to_str().unwrap(),
        "attachment; filename=\"q3.bin\""
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn empty_file_roundtrip() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = upload(&client, &base, "alice-token", "empty.txt", Vec::new()).await;
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/api/v1/files/download"))
        .query(&[("filePath", "empty.txt")])
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn download_of_missing_file_is_a_clean_404() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/v1/files/download"))
        .query(&[("filePath", "nope.txt")])
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn upload_without_leading_file_path_is_rejected() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    // file part arrives before filePath, so no header can be formed
    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"data".to_vec()).file_name("blob"),
        )
        .text("filePath", "late.txt");
    let resp = client
        .post(format!("{base}/api/v1/files/upload"))
        .bearer_auth("alice-token")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn ls_and_rm_flow() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    for path in ["docs/a.txt", "docs/b.txt", "notes.txt"] {
        let resp = upload(&client, &base, "alice-token", path, b"content".to_vec()).await;
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .get(format!("{base}/api/v1/files/ls"))
        .query(&[("filePath", "docs/")])
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let files = body["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["docs/a.txt", "docs/b.txt"]);
    assert_eq!(files[0]["size"], 7);
    assert!(files[0]["lastModified"].is_string());

    let resp = client
        .delete(format!("{base}/api/v1/files/rm"))
        .json(&serde_json::json!({ "filePath": "docs/a.txt" }))
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    // Removing it again reports not found
    let resp = client
        .delete(format!("{base}/api/v1/files/rm"))
        .json(&serde_json::json!({ "filePath": "docs/a.txt" }))
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{base}/api/v1/files/ls"))
        .query(&[("filePath", "docs/")])
        .bearer_auth("alice-token")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let files = body["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["docs/b.txt"]);
}

#[tokio::test]
async fn users_cannot_read_each_others_files() {
    let (base, _temp) = spawn_stack().await;
    let client = reqwest::Client::new();

    let resp = upload(&client, &base, "alice-token", "secret.txt", b"hers".to_vec()).await;
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/api/v1/files/download"))
        .query(&[("filePath", "secret.txt")])
        .bearer_auth("bob-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

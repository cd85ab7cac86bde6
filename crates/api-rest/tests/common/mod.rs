//! Common test utilities.

use api_rest::{router, AppState};
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use depot_core::CoreConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "depot-test-boundary";

/// A router backed by throwaway storage and staging directories.
pub struct TestServer {
    pub router: Router,
    root: PathBuf,
    _root_dir: TempDir,
    _staging_dir: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_max_file_size(100 * 1024 * 1024)
    }

    pub fn with_max_file_size(max_file_size: u64) -> Self {
        let root_dir = TempDir::new().unwrap();
        let staging_dir = TempDir::new().unwrap();

        let cfg = CoreConfig::new(
            root_dir.path().to_path_buf(),
            staging_dir.path().to_path_buf(),
            "127.0.0.1".into(),
            0,
            max_file_size,
        )
        .unwrap();
        let state = AppState::from_config(Arc::new(cfg)).unwrap();
        let root = state.files().root_directory().to_path_buf();

        Self {
            router: router(state),
            root,
            _root_dir: root_dir,
            _staging_dir: staging_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of directory entries in the storage root.
    pub fn stored_file_count(&self) -> usize {
        std::fs::read_dir(&self.root).unwrap().count()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.send(request).await;
        let status = response.status();
        (status, body_bytes(response).await)
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.send(request).await;
        let status = response.status();
        (status, String::from_utf8(body_bytes(response).await).unwrap())
    }

    /// Posts `parts` as `(field, filename, contents)` multipart parts to `/upload`.
    pub async fn upload(&self, parts: &[(&str, &str, &[u8])]) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let response = self.send(request).await;
        let status = response.status();
        (status, body_bytes(response).await)
    }
}

pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, contents) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

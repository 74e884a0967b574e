//! Shared fixtures for unit tests: a temp directory holding the SQLite file
//! and the upload directory, plus request-building helpers.

use crate::{
    config::AppConfig,
    db,
    models::user::{CurrentUser, Credentials},
    services::board_service::BoardResult,
    state::AppState,
};
use argon2::{Algorithm, Argon2, Params, Version};
use bytes::Bytes;
use futures::{Stream, stream};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "pass1234";

pub struct TestContext {
    pub state: AppState,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_upload_limit(1024 * 1024).await
    }

    pub async fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: format!("sqlite://{}", dir.path().join("board.db").display()),
            upload_dir: dir.path().join("uploads").display().to_string(),
            jwt_secret: "test-secret".into(),
            token_ttl_secs: 3600,
            max_upload_bytes,
        };

        let pool = db::connect(&cfg.database_url).await.expect("connect");
        db::run_migrations(&pool).await.expect("migrate");

        let state = AppState::new(Arc::new(pool), &cfg, cheap_hasher());
        Self { state, _dir: dir }
    }

    /// Register `username` and return it as an authenticated caller.
    pub async fn user(&self, username: &str) -> CurrentUser {
        let credentials = Credentials::new(username, TEST_PASSWORD).expect("credentials");
        self.state
            .credentials
            .register(&credentials)
            .await
            .expect("register");
        self.state
            .credentials
            .find_by_username(username)
            .await
            .expect("lookup")
            .expect("registered user")
            .into()
    }

    /// Sorted names of everything in the upload directory.
    pub fn stored_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.state.attachments.base_path) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Minimal argon2 cost so tests stay fast.
fn cheap_hasher() -> Argon2<'static> {
    let params = Params::new(1024, 1, 1, None).expect("argon2 params");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

pub fn byte_stream(data: &[u8]) -> impl Stream<Item = BoardResult<Bytes>> + use<> {
    stream::iter(vec![Ok(Bytes::copy_from_slice(data))])
}

/// Encode a `multipart/form-data` body; returns (content type, body).
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "----board-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

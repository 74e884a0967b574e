use crate::{
    config::AppConfig,
    services::{
        attachment_service::AttachmentService, board_service::BoardService,
        credential_service::CredentialService, token_service::TokenService,
    },
};
use argon2::Argon2;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub credentials: CredentialService,
    pub tokens: TokenService,
    pub boards: BoardService,
    pub attachments: AttachmentService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig, hasher: Argon2<'static>) -> Self {
        let boards = BoardService::new(db.clone());
        Self {
            credentials: CredentialService::new(db.clone(), hasher),
            tokens: TokenService::new(&cfg.jwt_secret, cfg.token_ttl_secs),
            attachments: AttachmentService::new(
                boards.clone(),
                cfg.upload_dir.clone(),
                cfg.max_upload_bytes,
            ),
            boards,
            db,
        }
    }
}

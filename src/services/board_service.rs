//! src/services/board_service.rs
//!
//! BoardService: board rows in SQLite, always read back joined with the
//! owner's username. Mutations are scoped to the owner; "no such board" and
//! "not yours" are reported identically so existence never leaks to
//! non-owners. This layer never touches the file system: it hands replaced or
//! removed descriptors back to `AttachmentService`, which owns the bytes.

use crate::models::{
    board::{Attachment, Board, BoardFields, BoardRow, BoardStatus},
    user::CurrentUser,
};
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board with id {0} not found")]
    BoardNotFound(i64),
    #[error("File not found for board {0}")]
    AttachmentNotFound(i64),
    #[error("stored attachment path is invalid")]
    InvalidStoragePath,
    #[error("upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    #[error("malformed upload: {0}")]
    MalformedUpload(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;

/// Outcome of a content update.
#[derive(Debug)]
pub struct ContentUpdate {
    /// The board as persisted after the update.
    pub board: Board,

    /// Descriptor that was overwritten by a new attachment, if any.
    pub replaced: Option<Attachment>,
}

const SELECT_BOARD: &str = "SELECT b.id, b.title, b.description, b.status, b.user_id, \
     u.username, b.file_name, b.file_path, b.file_size, b.created_at, b.updated_at \
     FROM boards b JOIN users u ON u.id = b.user_id";

#[derive(FromRow)]
struct DescriptorRow {
    user_id: i64,
    file_name: Option<String>,
    file_path: Option<String>,
    file_size: Option<i64>,
}

impl DescriptorRow {
    fn into_attachment(self) -> Option<Attachment> {
        Attachment::from_columns(self.file_name, self.file_path, self.file_size)
    }
}

#[derive(Clone)]
pub struct BoardService {
    /// Shared SQLite connection pool used for board rows.
    pub db: Arc<SqlitePool>,
}

impl BoardService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// All boards owned by `owner`, in creation order.
    pub async fn list_for_owner(&self, owner: &CurrentUser) -> BoardResult<Vec<Board>> {
        let rows = sqlx::query_as::<_, BoardRow>(&format!(
            "{} WHERE b.user_id = ? ORDER BY b.id ASC",
            SELECT_BOARD
        ))
        .bind(owner.id)
        .fetch_all(&*self.db)
        .await?;

        Ok(rows.into_iter().map(Board::from).collect())
    }

    /// Any board by id, regardless of who owns it.
    pub async fn get_by_id(&self, id: i64) -> BoardResult<Board> {
        sqlx::query_as::<_, BoardRow>(&format!("{} WHERE b.id = ?", SELECT_BOARD))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .map(Board::from)
            .ok_or(BoardError::BoardNotFound(id))
    }

    /// Insert a PUBLIC board owned by `owner`.
    pub async fn create(
        &self,
        fields: &BoardFields,
        owner: &CurrentUser,
        attachment: Option<&Attachment>,
    ) -> BoardResult<Board> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO boards (
                title, description, status, user_id,
                file_name, file_path, file_size, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fields.title())
        .bind(fields.description())
        .bind(BoardStatus::Public)
        .bind(owner.id)
        .bind(attachment.map(|a| a.display_name.as_str()))
        .bind(attachment.map(|a| a.storage_path.as_str()))
        .bind(attachment.map(|a| a.size))
        .bind(now)
        .bind(now)
        .execute(&*self.db)
        .await?;

        let id = result.last_insert_rowid();
        debug!("inserted board {} for user {}", id, owner.username);
        self.get_by_id(id).await
    }

    /// Replace title and description, and the descriptor when `attachment`
    /// is given.
    ///
    /// The ownership check and the write share one `BEGIN IMMEDIATE`
    /// transaction; it holds the write lock from the first read. The returned
    /// `replaced` descriptor is only set when a new attachment overwrote one.
    pub async fn update_content(
        &self,
        id: i64,
        fields: &BoardFields,
        owner: &CurrentUser,
        attachment: Option<&Attachment>,
    ) -> BoardResult<ContentUpdate> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let current = sqlx::query_as::<_, DescriptorRow>(
            "SELECT user_id, file_name, file_path, file_size FROM boards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(row) if row.user_id == owner.id => row,
            _ => return Err(BoardError::BoardNotFound(id)),
        };

        let now = Utc::now();
        let replaced = match attachment {
            Some(new) => {
                sqlx::query(
                    "UPDATE boards SET title = ?, description = ?,
                        file_name = ?, file_path = ?, file_size = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(fields.title())
                .bind(fields.description())
                .bind(&new.display_name)
                .bind(&new.storage_path)
                .bind(new.size)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                current.into_attachment()
            }
            None => {
                sqlx::query(
                    "UPDATE boards SET title = ?, description = ?, updated_at = ? WHERE id = ?",
                )
                .bind(fields.title())
                .bind(fields.description())
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                None
            }
        };

        tx.commit().await?;

        let board = self.get_by_id(id).await?;
        Ok(ContentUpdate { board, replaced })
    }

    /// Set the status of a board owned by `owner`.
    pub async fn update_status(
        &self,
        id: i64,
        status: BoardStatus,
        owner: &CurrentUser,
    ) -> BoardResult<Board> {
        let result = sqlx::query(
            "UPDATE boards SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(owner.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BoardError::BoardNotFound(id));
        }

        self.get_by_id(id).await
    }

    /// Delete a board owned by `owner`, returning the descriptor it carried.
    ///
    /// A single `DELETE ... RETURNING`, so the descriptor read and the row
    /// removal cannot interleave with another writer.
    pub async fn delete(&self, id: i64, owner: &CurrentUser) -> BoardResult<Option<Attachment>> {
        let removed = sqlx::query_as::<_, DescriptorRow>(
            "DELETE FROM boards WHERE id = ? AND user_id = ?
             RETURNING user_id, file_name, file_path, file_size",
        )
        .bind(id)
        .bind(owner.id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BoardError::BoardNotFound(id))?;

        debug!("deleted board {} for user {}", id, owner.username);
        Ok(removed.into_attachment())
    }

    /// Attachment descriptor of a board.
    ///
    /// Returns AttachmentNotFound when the board is missing or has no file.
    pub async fn get_attachment_info(&self, id: i64) -> BoardResult<Attachment> {
        sqlx::query_as::<_, DescriptorRow>(
            "SELECT user_id, file_name, file_path, file_size FROM boards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .and_then(DescriptorRow::into_attachment)
        .ok_or(BoardError::AttachmentNotFound(id))
    }
}

//! src/services/attachment_service.rs
//!
//! AttachmentService: keeps uploaded bytes on local disk consistent with the
//! descriptors `BoardService` stores. Files live flat under `base_path` with
//! generated names; the user-supplied name is only ever metadata.

use crate::models::{
    board::{Attachment, Board, BoardFields},
    user::CurrentUser,
};
use crate::services::board_service::{BoardError, BoardResult, BoardService};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_DISPLAY_NAME_LEN: usize = 255;
const MAX_EXTENSION_LEN: usize = 16;
const FALLBACK_DISPLAY_NAME: &str = "attachment";

#[derive(Clone)]
pub struct AttachmentService {
    boards: BoardService,

    /// Directory holding every stored attachment.
    pub base_path: PathBuf,

    max_upload_bytes: usize,
}

impl AttachmentService {
    pub fn new(boards: BoardService, base_path: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            boards,
            base_path: base_path.into(),
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Stream an upload to disk under a fresh generated name.
    ///
    /// Bytes go to a temp file first, are fsynced, then renamed into place.
    /// The temp file is removed on any error, including the size limit.
    pub async fn store_upload<S>(&self, original_name: &str, stream: S) -> BoardResult<Attachment>
    where
        S: Stream<Item = BoardResult<Bytes>>,
    {
        let display_name = normalize_display_name(original_name);
        let storage_name = generate_storage_name(&display_name);

        fs::create_dir_all(&self.base_path).await?;
        let final_path = self.base_path.join(&storage_name);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut file = File::create(&tmp_path).await?;
        let size = match self.write_stream(&mut file, stream).await {
            Ok(size) => size,
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        info!(
            "file {} saved to {} ({} bytes)",
            display_name, storage_name, size
        );
        Ok(Attachment {
            display_name,
            storage_path: storage_name,
            size: size as i64,
        })
    }

    async fn write_stream<S>(&self, file: &mut File, stream: S) -> BoardResult<usize>
    where
        S: Stream<Item = BoardResult<Bytes>>,
    {
        let mut size = 0usize;
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size += chunk.len();
            if size > self.max_upload_bytes {
                return Err(BoardError::PayloadTooLarge(self.max_upload_bytes));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(size)
    }

    /// Best-effort removal of an upload that never made it into a board row.
    pub async fn discard(&self, upload: &Attachment) {
        if let Err(err) = self.remove_stored(&upload.storage_path).await {
            warn!(
                "failed to discard unused upload {}: {}",
                upload.storage_path, err
            );
        }
    }

    /// Create a board, discarding the upload if the row cannot be written.
    pub async fn create_board(
        &self,
        fields: &BoardFields,
        owner: &CurrentUser,
        upload: Option<Attachment>,
    ) -> BoardResult<Board> {
        match self.boards.create(fields, owner, upload.as_ref()).await {
            Ok(board) => Ok(board),
            Err(err) => {
                if let Some(upload) = &upload {
                    self.discard(upload).await;
                }
                Err(err)
            }
        }
    }

    /// Update a board's content and, with an upload, swap its file.
    ///
    /// The old bytes are removed only after the new descriptor is committed.
    /// A failed update discards the new upload instead.
    pub async fn update_board(
        &self,
        id: i64,
        fields: &BoardFields,
        owner: &CurrentUser,
        upload: Option<Attachment>,
    ) -> BoardResult<Board> {
        let update = match self
            .boards
            .update_content(id, fields, owner, upload.as_ref())
            .await
        {
            Ok(update) => update,
            Err(err) => {
                if let Some(upload) = &upload {
                    self.discard(upload).await;
                }
                return Err(err);
            }
        };

        if let Some(old) = update.replaced {
            self.remove_committed(&old).await?;
            info!("old file deleted: {} for board {}", old.display_name, id);
        }

        Ok(update.board)
    }

    /// Delete a board and, if it had one, its stored file.
    ///
    /// Boards without an attachment never touch the file system.
    pub async fn delete_board(&self, id: i64, owner: &CurrentUser) -> BoardResult<()> {
        let removed = self.boards.delete(id, owner).await?;

        if let Some(att) = removed {
            self.remove_committed(&att).await?;
            info!("file deleted: {} at {}", att.display_name, att.storage_path);
        }

        Ok(())
    }

    /// Open a board's attachment for streaming.
    ///
    /// Returns the descriptor, an open handle and the on-disk length. A
    /// descriptor whose file has vanished is AttachmentNotFound.
    pub async fn open_download(&self, board_id: i64) -> BoardResult<(Attachment, File, u64)> {
        let att = self.boards.get_attachment_info(board_id).await?;
        let path = self.resolve(&att.storage_path)?;

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                warn!("attachment of board {} missing on disk", board_id);
                BoardError::AttachmentNotFound(board_id)
            } else {
                BoardError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();

        Ok((att, file, len))
    }

    /// Remove stored bytes. A file that is already gone counts as removed.
    pub async fn remove_stored(&self, storage_path: &str) -> BoardResult<()> {
        let path = self.resolve(storage_path)?;
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed stored file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", path.display());
            }
            Err(err) => return Err(BoardError::Io(err)),
        }
        Ok(())
    }

    /// Remove the bytes of a descriptor whose row change is already
    /// committed. A descriptor we cannot map into `base_path` (e.g. one
    /// written with a directory prefix) is logged and left alone.
    async fn remove_committed(&self, att: &Attachment) -> BoardResult<()> {
        match self.remove_stored(&att.storage_path).await {
            Err(BoardError::InvalidStoragePath) => {
                warn!(
                    "not removing attachment with unresolvable path {:?}",
                    att.storage_path
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Map a stored name to its location under `base_path`.
    pub fn resolve(&self, storage_path: &str) -> BoardResult<PathBuf> {
        ensure_storage_name_safe(storage_path)?;
        Ok(self.base_path.join(storage_path))
    }
}

/// Stored names are single flat path components we generated ourselves.
fn ensure_storage_name_safe(name: &str) -> BoardResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name
            .bytes()
            .any(|b| b == b'/' || b == b'\\' || b.is_ascii_control())
    {
        return Err(BoardError::InvalidStoragePath);
    }
    Ok(())
}

/// Reduce a client-supplied file name to something safe to display.
///
/// Keeps only the last path component, drops control characters, trims
/// whitespace and caps the length.
pub fn normalize_display_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        FALLBACK_DISPLAY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased extension of `name` if it is short plain ASCII alphanumerics.
fn storage_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `{unix millis}-{random}` plus the original extension when usable.
fn generate_storage_name(display_name: &str) -> String {
    let stem = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );
    match storage_extension(display_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

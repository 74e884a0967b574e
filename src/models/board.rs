//! Represents a board post and its optional attachment descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

/// Visibility flag of a board.
#[derive(sqlx::Type, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BoardStatus {
    #[default]
    Public,
    Private,
}

impl BoardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardStatus::Public => "PUBLIC",
            BoardStatus::Private => "PRIVATE",
        }
    }
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardStatus {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("PUBLIC") {
            Ok(BoardStatus::Public)
        } else if value.eq_ignore_ascii_case("PRIVATE") {
            Ok(BoardStatus::Private)
        } else {
            Err(format!("`{}` is not a valid status (PUBLIC, PRIVATE)", value))
        }
    }
}

/// Metadata for the file attached to a board.
///
/// `storage_path` is the generated name inside the upload directory. It is
/// server-side only and never leaves the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name shown to users and sent on download.
    pub display_name: String,

    /// Generated file name relative to the upload directory.
    pub storage_path: String,

    /// Size in bytes.
    pub size: i64,
}

impl Attachment {
    /// Rebuild a descriptor from nullable columns.
    ///
    /// A descriptor exists only when both name and path are set. Older rows
    /// with no recorded size read as zero bytes.
    pub fn from_columns(
        file_name: Option<String>,
        file_path: Option<String>,
        file_size: Option<i64>,
    ) -> Option<Self> {
        match (file_name, file_path) {
            (Some(display_name), Some(storage_path)) => Some(Self {
                display_name,
                storage_path,
                size: file_size.unwrap_or(0),
            }),
            _ => None,
        }
    }
}

/// Title and description that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardFields {
    title: String,
    description: String,
}

impl BoardFields {
    /// Both fields must contain at least one non-whitespace character.
    pub fn new(
        title: Option<String>,
        description: Option<String>,
    ) -> Result<Self, String> {
        let title = title.unwrap_or_default();
        let description = description.unwrap_or_default();
        if title.trim().is_empty() {
            return Err("title should not be empty".into());
        }
        if description.trim().is_empty() {
            return Err("description should not be empty".into());
        }
        Ok(Self { title, description })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A board row joined with its owner's username.
#[derive(FromRow, Debug)]
pub struct BoardRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: BoardStatus,
    pub user_id: i64,
    pub username: String,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal owner info returned with each board.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Debug)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: BoardStatus,
    pub owner: Owner,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status,
            owner: Owner {
                id: row.user_id,
                username: row.username,
            },
            attachment: Attachment::from_columns(row.file_name, row.file_path, row.file_size),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// JSON shape of a board as sent to clients.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: BoardStatus,
    pub user: Owner,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Board> for BoardView {
    fn from(board: Board) -> Self {
        let (file_name, file_size) = match board.attachment {
            Some(att) => (Some(att.display_name), Some(att.size)),
            None => (None, None),
        };
        Self {
            id: board.id,
            title: board.title,
            description: board.description,
            status: board.status,
            user: board.owner,
            file_name,
            file_size,
            created_at: board.created_at,
            updated_at: board.updated_at,
        }
    }
}

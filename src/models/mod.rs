//! Core data models for the board service.
//!
//! These entities represent users, their boards, and the attachment
//! descriptor embedded in a board row. Row types map to database tables via
//! `sqlx::FromRow`; client-facing shapes serialize as camelCase JSON.

pub mod board;
pub mod user;

pub mod auth_handlers;
pub mod board_handlers;
pub mod health_handlers;

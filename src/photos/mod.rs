use crate::state::AppState;
use axum::Router;

pub mod content_locks;
mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::owner_routes())
        .merge(handlers::public_routes())
}

//! Project export: relational graph → manifest + image blobs → zip.

pub mod aggregate;
pub mod archive;
pub mod handlers;
pub mod services;
pub mod types;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

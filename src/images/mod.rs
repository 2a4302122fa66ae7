pub mod dto;
pub mod fetch;
pub mod handlers;
pub mod naming;
pub mod remote;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

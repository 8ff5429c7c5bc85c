//! API routes for the tracking server.

mod routes;
pub mod worksites;
pub mod ws;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router()
}

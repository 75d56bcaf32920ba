use std::sync::Arc;

use axum::{middleware, routing::get, Router};

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod stdio;

use db::{etfs::EtfStore, users::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub api_token: Option<Arc<str>>,
    pub users: UserStore,
    pub etfs: EtfStore,
}

impl AppState {
    pub fn new(api_token: Option<String>, users: UserStore, etfs: EtfStore) -> Self {
        Self {
            api_token: api_token.map(Arc::<str>::from),
            users,
            etfs,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            http::handlers::MCP_PATH,
            get(http::handlers::sse_stream).post(http::handlers::mcp_endpoint),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

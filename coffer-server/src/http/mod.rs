//! HTTP endpoints for coffer-server.
//!
//! User routes and `/health` are public; every `/api/item` route sits behind
//! [`require_auth`].

mod binary;
mod health;
mod items;
mod logging;
mod users;

use crate::auth::require_auth;
use crate::server::VaultServer;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Extension, Router};
use coffer_types::api::{LIST_PATH, LOGIN_PATH, REGISTER_PATH};
use coffer_types::{CreditCard, LoginPassword, TextData};
use std::sync::Arc;

pub use binary::BinaryUpload;
pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(server: Arc<VaultServer>) -> Router {
    let max_body = server.config().storage.max_item_size;

    let items = Router::new()
        .route(
            "/api/item/login_password",
            post(items::create::<LoginPassword>).put(items::update::<LoginPassword>),
        )
        .route(
            "/api/item/credit_card",
            post(items::create::<CreditCard>).put(items::update::<CreditCard>),
        )
        .route(
            "/api/item/text",
            post(items::create::<TextData>).put(items::update::<TextData>),
        )
        .route("/api/item/binary", post(binary::create).put(binary::update))
        .route("/api/item/binary/:key/download", get(binary::download))
        .route(LIST_PATH, get(items::list))
        .route("/api/item/:key", get(items::get).delete(items::delete))
        .route_layer(middleware::from_fn_with_state(server.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_handler))
        .route(REGISTER_PATH, post(users::register))
        .route(LOGIN_PATH, post(users::login))
        .merge(items)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(middleware::from_fn(logging::log_requests))
        .layer(Extension(server))
}

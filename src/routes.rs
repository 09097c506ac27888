// src/routes.rs
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState, cors_origin: Option<&str>) -> Router {
    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/users/register", post(handlers::register))
        .route("/users/username/{username}", get(handlers::get_user))
        .route("/users/me/polls", get(handlers::my_polls))
        .route("/users/me/votes", get(handlers::my_votes))
        .route("/users/{username}/polls", get(handlers::user_polls))
        .route("/polls", post(handlers::create_poll))
        .route("/polls/public", get(handlers::list_public_polls))
        .route(
            "/polls/{id}",
            get(handlers::get_poll).delete(handlers::delete_poll),
        )
        .route("/polls/{id}/vote", post(handlers::cast_vote))
        .route("/polls/{id}/results", get(handlers::poll_results))
        .route("/polls/{id}/votes", get(handlers::poll_votes));

    let admin = Router::new().route("/polls/{id}", delete(handlers::admin_delete_poll));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors(cors_origin))
        .with_state(state)
}

fn cors(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS_ALLOWED_ORIGIN: {e}");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

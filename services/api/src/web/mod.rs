pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::middleware::require_auth;
use crate::web::state::AppState;

/// Builds the complete application router. Shared by the server binary and
/// the integration tests.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required). Fetching a drawing is public because
    // its id is a shareable URL; the secrecy filter decides what it shows.
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/drawings/{id}", get(rest::fetch_drawing_handler))
        .route("/leaderboard", get(rest::leaderboard_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/drawings", post(rest::submit_drawing_handler))
        .route("/drawings/mine", get(rest::list_my_drawings_handler))
        .route("/drawings/{id}/guess", post(rest::submit_guess_handler))
        .route("/duels", get(rest::list_duels_handler))
        .route("/words", get(rest::prompt_words_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi()))
}

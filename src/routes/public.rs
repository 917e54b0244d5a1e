use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credential: token issuance, first sign-in, and the read-only
/// camp and review catalogue.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(handlers::root))
        // POST /jwt
        // Mints a one-hour access token.
        .route("/jwt", post(handlers::issue_jwt))
        // POST /users
        // Insert-if-absent on first sign-in.
        .route("/users", post(handlers::create_user))
        // GET /camps?search=...&sort=...
        .route("/camps", get(handlers::get_camps))
        // GET /camps/{id}
        // Returns null for an unknown id.
        .route("/camps/{id}", get(handlers::get_camp))
        // GET /top-events
        // The camps with the most participants.
        .route("/top-events", get(handlers::get_top_events))
        .route("/reviews", get(handlers::get_reviews))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Authenticated Router Module
///
/// Routes open to any caller holding a valid token. The router is wrapped in the
/// authentication layer in `create_router`, and every handler also takes `AuthUser`, so
/// the caller's email is always the verified one.
///
/// Per-participant reads (`/requests/{email}`, `/payment-history/{email}`,
/// `/user-stats/{email}`) additionally require the path email to be the caller's own,
/// unless the caller is an admin.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/admin/{email}
        // Lets the client decide whether to show the admin dashboard.
        .route("/users/admin/{email}", get(handlers::check_admin))
        // PATCH /update-user/{email}
        .route("/update-user/{email}", patch(handlers::update_user))
        // --- Registration Lifecycle ---
        // POST /requests
        // Registers the caller for a camp; one request per (email, camp).
        .route("/requests", post(handlers::register_for_camp))
        // GET /requests/{email}
        .route("/requests/{email}", get(handlers::get_participant_requests))
        // DELETE /request-delete/user/{id}?campId=...
        // Self-withdrawal; releases the seat on the camp counter.
        .route(
            "/request-delete/user/{id}",
            delete(handlers::withdraw_own_request),
        )
        // --- Payments ---
        // POST /create-payment-intent
        // Proxies to the payment provider for a client secret.
        .route(
            "/create-payment-intent",
            post(handlers::create_payment_intent),
        )
        // POST /payment
        // Records a completed payment; marks the matching request paid if found.
        .route("/payment", post(handlers::record_payment))
        .route(
            "/payment-history/{email}",
            get(handlers::get_payment_history),
        )
        // --- Reviews & Stats ---
        // POST /reviews
        // Records a review; flags the matching request as reviewed if found.
        .route("/reviews", post(handlers::record_review))
        .route("/user-stats/{email}", get(handlers::get_user_stats))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// Routes restricted to callers whose stored role is "admin". The router is wrapped in
/// the admin layer in `create_router`, and each handler takes `AdminUser` as well.
/// A missing credential is answered with 401; a valid non-admin credential with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /requests
        // Every registration, for the management dashboard.
        .route("/requests", get(handlers::get_all_requests))
        // POST /camps
        .route("/camps", post(handlers::create_camp))
        // PATCH/DELETE /camps/{id}
        .route(
            "/camps/{id}",
            patch(handlers::update_camp).delete(handlers::delete_camp),
        )
        // POST /camps/{id}/reconcile
        // Rebuilds participant_count from the live requests after drift.
        .route("/camps/{id}/reconcile", post(handlers::reconcile_camp))
        // PATCH /request-confirm/{id}
        // pending -> confirmed; idempotent.
        .route("/request-confirm/{id}", patch(handlers::confirm_request))
        // DELETE /request-delete/admin/{id}?campId=...
        // Forced removal of any request; releases the seat on the camp counter.
        .route(
            "/request-delete/admin/{id}",
            delete(handlers::withdraw_request_admin),
        )
}

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization gate: identity verification and role resolution.
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod repository;

// Core consistency engine and its best-effort satellites.
pub mod lifecycle;
pub mod recorder;
pub mod stats;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use gateway::{GatewayState, MockPaymentGateway, StripePaymentGateway};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every routed handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_jwt, handlers::create_user, handlers::get_camps, handlers::get_camp,
        handlers::get_top_events, handlers::get_reviews, handlers::check_admin,
        handlers::update_user, handlers::register_for_camp, handlers::get_participant_requests,
        handlers::withdraw_own_request, handlers::create_payment_intent,
        handlers::record_payment, handlers::get_payment_history, handlers::record_review,
        handlers::get_user_stats, handlers::get_all_requests, handlers::create_camp,
        handlers::update_camp, handlers::delete_camp, handlers::confirm_request,
        handlers::withdraw_request_admin, handlers::reconcile_camp
    ),
    components(
        schemas(
            models::User, models::Camp, models::CampRequest, models::Payment, models::Review,
            models::PaymentStatus, models::ConfirmationStatus, models::ReviewStatus,
            models::CampSort, models::TokenRequest, models::TokenResponse,
            models::CreateUserRequest, models::UpdateUserRequest, models::CreateCampRequest,
            models::UpdateCampRequest, models::RegisterRequest, models::PaymentIntentRequest,
            models::PaymentIntentResponse, models::RecordPaymentRequest,
            models::RecordReviewRequest, models::InsertOutcome, models::Receipt,
            models::DeleteOutcome, models::WithdrawOutcome, models::Reconciliation,
            models::UserStats, models::AdminStatus,
        )
    ),
    tags(
        (name = "camp-registry", description = "Camp registration lifecycle API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of everything handlers need. The store handle is
/// built once in `main` and passed down from here; nothing is held in globals.
#[derive(Clone)]
pub struct AppState {
    /// Document store.
    pub repo: RepositoryState,
    /// Payment-processing collaborator.
    pub gateway: GatewayState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors such as `AuthUser` and `AdminUser` pull only what they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for GatewayState {
    fn from_ref(app_state: &AppState) -> GatewayState {
        app_state.gateway.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request before it reaches any authenticated handler when the bearer
/// token is missing (401) or invalid (401).
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Same as `auth_middleware`, then requires the admin role (403 otherwise).
async fn admin_middleware(_admin_user: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's routing structure, applies scoped and global middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span with method, uri and the `x-request-id` value so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
